pub mod builders;
pub mod instructions;
pub mod relay;
