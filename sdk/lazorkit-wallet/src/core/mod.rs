pub mod connection;
pub mod constants;
pub mod signer;
pub mod sponsor;
pub mod storage;
