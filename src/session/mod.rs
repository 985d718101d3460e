//! Session Context
//!
//! Holds the current credential and its authorization state, and hands out
//! tickets for remote calls. The context is cloned into whoever needs it;
//! state changes are published through a `watch` channel so the front end
//! can react to login, logout and expiry.
//!
//! Every establish/destroy bumps an epoch. A ticket taken at issue time is
//! only honoured on completion if the epoch still matches, which is how
//! results of calls that outlive their credential get discarded.

pub mod login;
pub mod store;

pub use login::{credential_from_response, login, token_expiry};
pub use store::CredentialStore;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// A login (or stored session load) is in progress.
    Pending,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub identity: String,
    pub token: String,
    /// User object as returned by the login endpoint.
    pub profile: Option<serde_json::Value>,
    /// From the token's `exp` claim when the token is a JWT.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub auth: AuthState,
    pub credential: Option<Credential>,
    pub epoch: u64,
}

/// Permission to issue one remote call, captured at issue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub epoch: u64,
    pub token: String,
}

#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionContext {
    /// Start in `Pending`: the caller is about to load or establish a session.
    pub fn new() -> Self {
        Self::from_state(AuthState::Pending, None)
    }

    pub fn unauthenticated() -> Self {
        Self::from_state(AuthState::Unauthenticated, None)
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self::from_state(AuthState::Authenticated, Some(credential))
    }

    fn from_state(auth: AuthState, credential: Option<Credential>) -> Self {
        let (tx, _rx) = watch::channel(SessionState {
            auth,
            credential,
            epoch: 0,
        });
        Self { state: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Authorization state, treating an expired credential as gone.
    pub fn auth_state(&self) -> AuthState {
        let state = self.state.borrow();
        match (&state.auth, &state.credential) {
            (AuthState::Authenticated, Some(c)) if !c.is_expired() => AuthState::Authenticated,
            (AuthState::Authenticated, _) => AuthState::Unauthenticated,
            (other, _) => *other,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_state() == AuthState::Authenticated
    }

    pub fn credential(&self) -> Option<Credential> {
        if self.is_authenticated() {
            self.state.borrow().credential.clone()
        } else {
            None
        }
    }

    pub fn identity(&self) -> Option<String> {
        self.credential().map(|c| c.identity)
    }

    pub fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    /// Ticket for a remote call, or `AuthRequired` if no valid credential.
    /// An expired credential is destroyed on the way.
    pub fn ticket(&self) -> AppResult<SessionTicket> {
        let expired = {
            let state = self.state.borrow();
            match (&state.auth, &state.credential) {
                (AuthState::Authenticated, Some(c)) if !c.is_expired() => {
                    return Ok(SessionTicket {
                        epoch: state.epoch,
                        token: c.token.clone(),
                    });
                }
                (AuthState::Authenticated, Some(_)) => true,
                _ => false,
            }
        };

        if expired {
            self.expire();
        }
        Err(AppError::AuthRequired)
    }

    /// Whether results of a call issued under `ticket` may still be applied.
    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.is_authenticated() && self.epoch() == ticket.epoch
    }

    pub fn begin_login(&self) {
        self.state.send_modify(|s| {
            if s.auth != AuthState::Authenticated {
                s.auth = AuthState::Pending;
            }
        });
    }

    /// Leave `Pending` after a failed login without touching a live session.
    pub fn fail_login(&self) {
        self.state.send_modify(|s| {
            if s.auth == AuthState::Pending {
                s.auth = AuthState::Unauthenticated;
            }
        });
    }

    /// Leave `Pending` at start-up with the remembered credential, if any.
    pub fn restore(&self, credential: Option<Credential>) {
        match credential {
            Some(credential) => self.establish(credential),
            None => self.fail_login(),
        }
    }

    pub fn establish(&self, credential: Credential) {
        info!(identity = %credential.identity, "Session established");
        self.state.send_modify(|s| {
            s.auth = AuthState::Authenticated;
            s.credential = Some(credential);
            s.epoch += 1;
        });
    }

    pub fn logout(&self) {
        info!("Session closed");
        self.destroy();
    }

    /// Drop a credential the server (or its `exp` claim) no longer accepts.
    pub fn expire(&self) {
        info!("Session expired");
        self.destroy();
    }

    fn destroy(&self) {
        self.state.send_modify(|s| {
            s.auth = AuthState::Unauthenticated;
            s.credential = None;
            s.epoch += 1;
        });
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
