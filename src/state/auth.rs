//! Auth-session state for the current portal user.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `SessionManager` per running application (or per connection in a
//! multi-tenant host). Route guards and identity-aware consumers read its
//! [`AuthState`]; only the manager writes the token store.
//!
//! DESIGN
//! ======
//! `Bootstrapping → Anonymous | Authenticated(user)`. A stored token alone
//! never makes the session authenticated: `init()` confirms it with
//! `/auth/me` exactly once, and `login()` stores the new token only as long as
//! the follow-up identity fetch succeeds.
//!
//! Completed logins and logouts advance a session epoch. A bootstrap or
//! refresh whose identity fetch returns after the epoch moved drops its
//! result, and token discards only remove the token that was actually checked.
//!
//! ERROR HANDLING
//! ==============
//! Bootstrap failures degrade silently to anonymous. Login, registration, and
//! refresh failures are recorded in `AuthState::error` and returned.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{OnceCell, watch};

use crate::net::api::ApiClient;
use crate::net::error::{ApiError, ErrorCode};
use crate::net::types::User;
use crate::token::{TokenStore, TokenStoreError};

// =============================================================================
// STATE
// =============================================================================

/// Where the session currently stands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// The stored token has not been checked yet.
    #[default]
    Bootstrapping,
    Anonymous,
    Authenticated(User),
}

/// Read-only snapshot published to consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub status: SessionStatus,
    /// `true` during bootstrap and while a login or registration is in flight.
    pub loading: bool,
    /// Message from the last failed login, registration, or refresh.
    pub error: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { status: SessionStatus::Bootstrapping, loading: true, error: None }
    }
}

impl AuthState {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match &self.status {
            SessionStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user().is_some()
    }

    /// Guarded views should send the user to login: loading has settled and nobody is signed in.
    #[must_use]
    pub fn should_redirect_unauth(&self) -> bool {
        !self.loading && self.user().is_none()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend call failed; displays exactly the backend's message.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Another login or registration has not finished yet.
    #[error("a sign-in is already in progress")]
    InFlight,

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl AuthError {
    /// The underlying API failure, if this came from a backend call.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Api(e) => e.error_code(),
            Self::InFlight => "E_SIGN_IN_IN_FLIGHT",
            Self::TokenStore(_) => "E_TOKEN_STORE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.retryable(),
            Self::InFlight => true,
            Self::TokenStore(_) => false,
        }
    }
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, AuthError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| AuthError::InFlight)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Owns the authentication lifecycle and the single source of truth for
/// who is logged in.
pub struct SessionManager {
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
    state: watch::Sender<AuthState>,
    bootstrap: OnceCell<()>,
    sign_in: AtomicBool,
    /// Bumped by every completed login and every logout.
    epoch: AtomicU64,
}

impl SessionManager {
    /// Wrap `api`; the token store is the one the client reads from.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let tokens = api.token_store();
        let (state, _) = watch::channel(AuthState::default());
        Self {
            api,
            tokens,
            state,
            bootstrap: OnceCell::new(),
            sign_in: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    /// Client for document and other calls made on behalf of this session.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // -------------------------------------------------------------------------
    // Signals
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    fn publish(&self, update: impl FnOnce(&mut AuthState)) {
        self.state.send_modify(update);
    }

    // -------------------------------------------------------------------------
    // Bootstrap
    // -------------------------------------------------------------------------

    /// Resolve the stored token into a session. Runs once per manager;
    /// concurrent and later callers share that single resolution.
    pub async fn init(&self) -> AuthState {
        self.bootstrap.get_or_init(|| self.resolve_stored_token()).await;
        self.snapshot()
    }

    async fn resolve_stored_token(&self) {
        let epoch = self.current_epoch();
        let token = match self.tokens.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "token store unreadable; starting anonymous");
                None
            }
        };

        let Some(token) = token else {
            self.publish(|s| {
                s.status = SessionStatus::Anonymous;
                s.loading = false;
            });
            return;
        };

        let result = self.api.current_user().await;
        if self.current_epoch() != epoch {
            tracing::debug!("session changed during bootstrap; dropping stored-token result");
            return;
        }

        let sign_in_pending = self.sign_in.load(Ordering::Acquire);
        match result {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "session restored");
                self.publish(|s| {
                    s.status = SessionStatus::Authenticated(user);
                    s.loading = sign_in_pending;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored token rejected; discarding");
                self.discard_token_if_current(&token);
                self.publish(|s| {
                    s.status = SessionStatus::Anonymous;
                    s.loading = sign_in_pending;
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Exchange credentials for a token, then confirm it with `/auth/me`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InFlight`] if another sign-in is running, otherwise
    /// the failure of whichever step failed. The previous session is kept.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let _guard = InFlightGuard::acquire(&self.sign_in)?;
        self.begin();
        let result = self.login_sequence(username, password).await;
        self.finish(result)
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InFlight`] if another sign-in is running, otherwise
    /// the registration error or, if registration succeeded, the login error.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let _guard = InFlightGuard::acquire(&self.sign_in)?;
        self.begin();
        let result = self.register_sequence(username, email, password).await;
        self.finish(result)
    }

    /// Drop the token and identity. Safe to call when already anonymous.
    pub fn logout(&self) {
        self.advance_epoch();
        self.discard_token();
        // Fails while a bootstrap is running; the epoch makes that run drop its result.
        let _ = self.bootstrap.set(());
        let was_logged_in = self.is_logged_in();
        self.publish(|s| {
            s.status = SessionStatus::Anonymous;
            s.loading = false;
            s.error = None;
        });
        if was_logged_in {
            tracing::info!("logged out");
        }
    }

    pub fn clear_error(&self) {
        self.publish(|s| s.error = None);
    }

    /// Re-check the identity of an authenticated session.
    ///
    /// Returns `Ok(None)` when there is no session to check, or when a login or
    /// logout completed while the check was in flight (its result is dropped).
    ///
    /// # Errors
    ///
    /// On auth rejection the session is demoted to anonymous and the token
    /// discarded before the error is returned; other failures leave it intact.
    pub async fn refresh(&self) -> Result<Option<User>, AuthError> {
        if !self.is_logged_in() {
            return Ok(None);
        }

        let epoch = self.current_epoch();
        let checked = self.tokens.load()?;
        let result = self.api.current_user().await;
        if self.current_epoch() != epoch {
            tracing::debug!("session changed during refresh; dropping result");
            return match result {
                Ok(_) => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        match result {
            Ok(user) => {
                self.publish(|s| s.status = SessionStatus::Authenticated(user.clone()));
                Ok(Some(user))
            }
            Err(e) => {
                let message = e.to_string();
                if e.is_auth_rejection() {
                    tracing::warn!(error = %e, "session rejected by backend");
                    if let Some(token) = checked.as_deref() {
                        self.discard_token_if_current(token);
                    }
                    self.publish(|s| {
                        s.status = SessionStatus::Anonymous;
                        s.error = Some(message);
                    });
                } else {
                    self.publish(|s| s.error = Some(message));
                }
                Err(e.into())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn login_sequence(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let grant = self.api.login(username, password).await?;

        let previous = self.tokens.load()?;
        self.tokens.store(&grant.access_token)?;

        match self.api.current_user().await {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "logged in");
                self.advance_epoch();
                self.publish(|s| s.status = SessionStatus::Authenticated(user.clone()));
                let _ = self.bootstrap.set(());
                Ok(user)
            }
            Err(e) => {
                self.restore_token(previous.as_deref());
                Err(e.into())
            }
        }
    }

    async fn register_sequence(&self, username: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let created = self.api.register(username, email, password).await?;
        tracing::info!(user_id = created.id, username = %created.username, "account registered");
        self.login_sequence(username, password).await
    }

    fn begin(&self) {
        self.publish(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish<T>(&self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        let error = result.as_ref().err().map(ToString::to_string);
        self.publish(|s| {
            s.loading = false;
            s.error = error;
        });
        result
    }

    fn restore_token(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(token) => self.tokens.store(token),
            None => self.tokens.clear(),
        };
        if let Err(e) = restored {
            tracing::warn!(error = %e, "failed to roll back token after identity fetch failure");
        }
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Clear storage only if it still holds `checked`; a newer login's token stays.
    fn discard_token_if_current(&self, checked: &str) {
        match self.tokens.load() {
            Ok(Some(stored)) if stored == checked => self.discard_token(),
            Ok(_) => tracing::debug!("stored token replaced since it was checked; keeping it"),
            Err(e) => tracing::warn!(error = %e, "token store unreadable; leaving it untouched"),
        }
    }

    fn discard_token(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::warn!(error = %e, "failed to clear stored token");
        }
    }
}
