//! Connection state machine.
//!
//! `Disconnected -> Connecting -> Connected`, with a transient `Failed(kind)`
//! published before falling back to `Disconnected`. Concurrent `connect()`
//! calls share one credential ceremony.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::{Mutex, RwLock};
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::basic::session::SessionStore;
use crate::config::WalletConfig;
use crate::core::signer::CredentialProvider;
use crate::error::{Result, WalletError};
use crate::types::{ConnectionState, DisconnectMode, WalletSession};
use crate::utils::derive_smart_wallet_address;

type CeremonyFuture = BoxFuture<'static, Result<WalletSession>>;
type Ceremony = Shared<CeremonyFuture>;
type Listener = Box<dyn Fn(&ConnectionState) + Send + Sync>;

/// Owns the process-wide connection state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    provider: Arc<dyn CredentialProvider>,
    store: SessionStore,
    program_id: Pubkey,
    portal_url: String,
    state: watch::Sender<ConnectionState>,
    listeners: RwLock<Vec<Listener>>,
    /// In-flight ceremony, tagged with its id. Held weakly: the ceremony
    /// lives only as long as some `connect()` caller awaits it.
    ceremony: Mutex<Option<(u64, WeakShared<CeremonyFuture>)>>,
    next_ceremony: AtomicU64,
    /// Bumped by `disconnect`; a ceremony started under an older epoch is stale
    epoch: AtomicU64,
}

/// Clears the ceremony slot however the ceremony ends, including when every
/// caller drops its `connect()` future.
struct CeremonyGuard<'a> {
    inner: &'a ControllerInner,
    id: u64,
    epoch: u64,
    settled: bool,
}

impl Drop for CeremonyGuard<'_> {
    fn drop(&mut self) {
        let registered = {
            let mut slot = self.inner.ceremony.lock();
            let registered = matches!(slot.as_ref(), Some((id, _)) if *id == self.id);
            if registered {
                *slot = None;
            }
            registered
        };

        if registered && !self.settled && self.inner.is_current(self.epoch) {
            warn!("connect abandoned before completion");
            self.inner.set_state(ConnectionState::Disconnected);
        }
    }
}

impl ConnectionController {
    pub fn new(
        config: &WalletConfig,
        provider: Arc<dyn CredentialProvider>,
        store: SessionStore,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ControllerInner {
                provider,
                store,
                program_id: config.program_id,
                portal_url: config.credential_portal_endpoint.clone(),
                state,
                listeners: RwLock::new(Vec::new()),
                ceremony: Mutex::new(None),
                next_ceremony: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn session(&self) -> Option<WalletSession> {
        self.inner.state.borrow().session().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Register a callback fired synchronously on every state transition.
    ///
    /// Callbacks must not register further callbacks.
    pub fn on_state_change<F>(&self, listener: F)
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Box::new(listener));
    }

    /// Non-interactive startup load. Sets `Connected` when a valid record exists.
    pub fn restore(&self) -> Option<WalletSession> {
        if let Some(session) = self.session() {
            return Some(session);
        }
        if self.inner.in_flight().is_some() {
            return None;
        }

        match self.inner.store.load() {
            Ok(Some(session)) => {
                info!(wallet = %session.wallet_address(), "restored wallet session");
                self.inner
                    .set_state(ConnectionState::Connected(session.clone()));
                Some(session)
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "session store unreadable, starting disconnected");
                None
            },
        }
    }

    /// Authenticate with the passkey, creating one on first use.
    ///
    /// Returns the current session when already connected, and joins the
    /// outstanding ceremony when one is running.
    pub async fn connect(&self) -> Result<WalletSession> {
        let ceremony = {
            let mut slot = self.inner.ceremony.lock();
            let running = slot.as_ref().and_then(|(_, weak)| weak.upgrade());
            match running {
                Some(ceremony) => {
                    debug!("joining in-flight connect");
                    ceremony
                },
                None => {
                    if let Some(session) = self.session() {
                        return Ok(session);
                    }

                    let id = self.inner.next_ceremony.fetch_add(1, Ordering::SeqCst);
                    let epoch = self.inner.epoch.load(Ordering::SeqCst);
                    let inner = self.inner.clone();
                    let ceremony = async move { inner.run_ceremony(id, epoch).await }
                        .boxed()
                        .shared();
                    *slot = ceremony.downgrade().map(|weak| (id, weak));
                    ceremony
                },
            }
        };

        ceremony.await
    }

    /// Drop to `Disconnected`. Never fails; a purge that cannot clear storage is logged.
    ///
    /// An in-flight connect is superseded: it will not persist or publish its
    /// result, and its callers get `UserCancelled`.
    pub fn disconnect(&self, mode: DisconnectMode) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.ceremony.lock().take();

        if mode.purges() {
            if let Err(e) = self.inner.store.clear() {
                error!(error = %e, "failed to purge stored session");
            }
        }

        self.inner.set_state(ConnectionState::Disconnected);
        debug!(purge = mode.purges(), "disconnected");
    }

    /// Persist a new `last_used_at` for the connected session after it signed something.
    ///
    /// Best effort: a storage failure is logged and the in-memory state is left as is.
    /// Skipped when the session was disconnected in the meantime.
    pub(crate) fn record_use(&self, session: &WalletSession) {
        let still_connected = self
            .session()
            .map_or(false, |current| current.same_identity(session));
        if !still_connected {
            return;
        }
        if let Err(e) = self.inner.store.touch(session) {
            warn!(error = %e, "failed to record session use");
        }
    }
}

impl ControllerInner {
    /// Live ceremony, if any caller still awaits one.
    ///
    /// The upgraded handle must not be dropped while the slot is locked: it
    /// may be the last one, and dropping the ceremony locks the slot.
    fn in_flight(&self) -> Option<Ceremony> {
        let weak = self.ceremony.lock().as_ref().map(|(_, weak)| weak.clone());
        weak.and_then(|weak| weak.upgrade())
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if changed {
            debug!(state = ?next, "connection state changed");
            for listener in self.listeners.read().iter() {
                listener(&next);
            }
        }
    }

    async fn run_ceremony(self: Arc<Self>, id: u64, epoch: u64) -> Result<WalletSession> {
        let mut guard = CeremonyGuard {
            inner: self.as_ref(),
            id,
            epoch,
            settled: false,
        };
        if self.is_current(epoch) {
            self.set_state(ConnectionState::Connecting);
        }

        let authenticated = self.authenticate().await;
        guard.settled = true;
        if !self.is_current(epoch) {
            info!("connect superseded by disconnect");
            return Err(WalletError::UserCancelled);
        }

        let outcome =
            authenticated.and_then(|session| self.store.save(&session).map(|()| session));

        match outcome {
            Ok(session) => {
                info!(wallet = %session.wallet_address(), "wallet connected");
                self.set_state(ConnectionState::Connected(session.clone()));
                Ok(session)
            },
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.set_state(ConnectionState::Failed(e.kind()));
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            },
        }
    }

    /// Prove possession of the stored credential, or register a new one.
    async fn authenticate(&self) -> Result<WalletSession> {
        match self.store.load()? {
            Some(stored) => {
                let challenge: [u8; 32] = rand::random();
                let assertion = self
                    .provider
                    .sign(&self.portal_url, stored.credential_id(), &challenge)
                    .await?;

                if &assertion.credential_id != stored.credential_id() {
                    return Err(WalletError::CredentialUnavailable(format!(
                        "expected credential {}, got {}",
                        stored.credential_id(),
                        assertion.credential_id
                    )));
                }
                Ok(stored.touched(Utc::now()))
            },
            None => {
                let handle = self.provider.create_credential(&self.portal_url).await?;
                let wallet_address =
                    derive_smart_wallet_address(&self.program_id, &handle.public_key)?;
                info!(%wallet_address, "registered new passkey wallet");
                Ok(WalletSession::new(handle.credential_id, wallet_address))
            },
        }
    }
}
