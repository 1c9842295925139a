//! Background guard that keeps the session alive.
//!
//! While authenticated, [`AuthGuard`] renews the access credential on a
//! fixed interval, re-validates when the user comes back to the app, and
//! logs out as soon as any API call reports the session unauthorized.
//! Every terminal failure ends in the same place: credentials cleared,
//! status flipped to [`AuthStatus::LoggedOut`], and a
//! [`AuthEvent::LoggedOut`] carrying the login redirect.

use super::client::{RefreshOutcome, TokenRefresher};
use super::credentials::CredentialStore;
use super::error::AuthError;
use super::retry::RetryPolicy;
use super::token::{DEFAULT_EXPIRY_LEEWAY_SECS, TokenValidation, validate_access_token};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval between scheduled renewals (seconds).
pub const DEFAULT_RENEWAL_INTERVAL_SECS: u64 = 12 * 60;

/// Shortest renewal period the loop accepts; smaller values are raised to it.
pub const MIN_RENEWAL_INTERVAL: Duration = Duration::from_millis(1);

/// Where the user is sent after a forced logout.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Tunables for [`AuthGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSettings {
    /// Period of the scheduled renewal.
    pub renewal_interval: Duration,
    /// Login entry point used in logout redirects.
    pub login_path: String,
    /// Access tokens expiring within this many seconds are renewed on re-validation.
    pub expiry_leeway_secs: i64,
    /// Retry policy applied to every renewal.
    pub retry: RetryPolicy,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            renewal_interval: Duration::from_secs(DEFAULT_RENEWAL_INTERVAL_SECS),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            expiry_leeway_secs: DEFAULT_EXPIRY_LEEWAY_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Whether the client currently holds a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated,
    LoggedOut,
}

/// Why the guard ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The refresh endpoint rejected the credential.
    Rejected,
    /// Transient failures outlasted the retry policy.
    RetriesExhausted,
    /// No refresh credential was available.
    MissingCredential,
    /// The refresh endpoint failed with a non-retryable status.
    RequestFailed,
    /// Another API call reported 401/403.
    SignalledUnauthorized,
}

impl LogoutReason {
    fn from_error(error: &AuthError) -> Self {
        match error {
            AuthError::Unauthorized { .. } => Self::Rejected,
            AuthError::MissingCredential => Self::MissingCredential,
            AuthError::RetriesExhausted { .. } => Self::RetriesExhausted,
            AuthError::Network(_) | AuthError::Server { .. } | AuthError::Request { .. } => {
                Self::RequestFailed
            }
        }
    }
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rejected => "credential rejected",
            Self::RetriesExhausted => "refresh retries exhausted",
            Self::MissingCredential => "no refresh credential",
            Self::RequestFailed => "refresh request failed",
            Self::SignalledUnauthorized => "unauthorized response from API",
        };
        f.write_str(s)
    }
}

/// Notifications emitted by the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// The access credential was renewed.
    Renewed { expires_in: Option<f64> },
    /// The session ended; the UI should navigate to `redirect`.
    LoggedOut {
        reason: LogoutReason,
        redirect: String,
        cleared: Vec<String>,
    },
}

/// External triggers delivered to a running guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
    /// The app became visible again after being in the background.
    VisibilityRegained,
    /// Some API call came back 401/403.
    Unauthorized,
}

/// Cloneable sender for [`AuthSignal`]s.
#[derive(Debug, Clone)]
pub struct AuthSignaller {
    tx: mpsc::UnboundedSender<AuthSignal>,
}

impl AuthSignaller {
    /// Returns false if the guard is no longer listening.
    pub fn visibility_regained(&self) -> bool {
        self.tx.send(AuthSignal::VisibilityRegained).is_ok()
    }

    /// Returns false if the guard is no longer listening.
    pub fn unauthorized(&self) -> bool {
        self.tx.send(AuthSignal::Unauthorized).is_ok()
    }

    /// Inspect the status of any API response, raising the unauthorized
    /// signal on 401 or 403. Returns true when the signal was raised.
    pub fn observe_status(&self, status: reqwest::StatusCode) -> bool {
        match status.as_u16() {
            401 | 403 => {
                debug!(status = %status, "API call unauthorized, signalling guard");
                self.unauthorized();
                true
            }
            _ => false,
        }
    }
}

/// Session keeper wrapping a [`TokenRefresher`] and the cookie jar.
pub struct AuthGuard {
    refresher: Arc<dyn TokenRefresher>,
    credentials: CredentialStore,
    settings: GuardSettings,
    status: watch::Sender<AuthStatus>,
    events: mpsc::UnboundedSender<AuthEvent>,
}

impl AuthGuard {
    /// Create a guard. The initial status is authenticated only if the
    /// jar holds at least one session cookie.
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        credentials: CredentialStore,
        settings: GuardSettings,
    ) -> (Self, mpsc::UnboundedReceiver<AuthEvent>) {
        let initial = if credentials.has_tokens() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::LoggedOut
        };
        let (status, _) = watch::channel(initial);
        let (events, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                refresher,
                credentials,
                settings,
                status,
                events,
            },
            event_rx,
        )
    }

    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Renew the access credential under the retry policy.
    ///
    /// Any error returned here has already logged the user out.
    pub async fn renew(&self) -> Result<RefreshOutcome, AuthError> {
        if !self.credentials.has_refresh_token() {
            let error = AuthError::MissingCredential;
            self.force_logout(LogoutReason::from_error(&error));
            return Err(error);
        }

        debug!(refresher = self.refresher.name(), "renewing access credential");
        let result = self
            .settings
            .retry
            .run(|| self.refresher.refresh(&self.credentials))
            .await;

        match result {
            Ok(outcome) => {
                self.emit(AuthEvent::Renewed {
                    expires_in: outcome.expires_in,
                });
                Ok(outcome)
            }
            Err(error) => {
                warn!(code = error.code(), error = %error, "session renewal failed");
                self.force_logout(LogoutReason::from_error(&error));
                Err(error)
            }
        }
    }

    /// Check the session after the app regains focus.
    ///
    /// Renews unless the access token is structurally sound and outside
    /// the expiry leeway. Logs out when no session cookies remain.
    pub async fn revalidate(&self) -> Result<(), AuthError> {
        if !self.credentials.has_tokens() {
            let error = AuthError::MissingCredential;
            self.force_logout(LogoutReason::from_error(&error));
            return Err(error);
        }

        if let Some(token) = self.credentials.access_token() {
            let now = chrono::Utc::now().timestamp();
            let validation = validate_access_token(&token, now, self.settings.expiry_leeway_secs);
            if let TokenValidation::Valid { expires_at } = validation {
                debug!(expires_at, "access token still fresh, skipping renewal");
                return Ok(());
            }
            debug!(?validation, "access token needs renewal");
        }

        self.renew().await.map(|_| ())
    }

    /// Clear credentials and mark the session logged out.
    ///
    /// Returns false if the session was already logged out, in which case
    /// credentials are still cleared but no event is emitted.
    pub fn force_logout(&self, reason: LogoutReason) -> bool {
        let cleared = self.credentials.clear();
        let was_authenticated = self.status.send_replace(AuthStatus::LoggedOut)
            == AuthStatus::Authenticated;
        if !was_authenticated {
            return false;
        }

        info!(
            reason = %reason,
            redirect = %self.settings.login_path,
            "session ended, redirecting to login"
        );
        self.emit(AuthEvent::LoggedOut {
            reason,
            redirect: self.settings.login_path.clone(),
            cleared,
        });
        true
    }

    /// Spawn the guard loop on the current tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> AuthGuardHandle {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let status = self.subscribe();
        let task = tokio::spawn(self.run(signal_rx, cancel.clone()));
        AuthGuardHandle {
            signaller: AuthSignaller { tx: signal_tx },
            status,
            cancel,
            task,
        }
    }

    async fn run(self, mut signals: mpsc::UnboundedReceiver<AuthSignal>, cancel: CancellationToken) {
        let period = self.settings.renewal_interval.max(MIN_RENEWAL_INTERVAL);
        let mut renewal = tokio::time::interval_at(Instant::now() + period, period);
        renewal.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut signals_open = true;

        info!(
            renewal_interval_secs = period.as_secs(),
            authenticated = self.is_authenticated(),
            "auth guard started"
        );

        while self.is_authenticated() {
            let keep_running = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = renewal.tick() => {
                    let work = async {
                        let _ = self.renew().await;
                    };
                    self.drive(work, &mut signals, &mut signals_open, &cancel).await
                }
                signal = signals.recv(), if signals_open => match signal {
                    Some(AuthSignal::VisibilityRegained) => {
                        let work = async {
                            let _ = self.revalidate().await;
                        };
                        self.drive(work, &mut signals, &mut signals_open, &cancel).await
                    }
                    Some(AuthSignal::Unauthorized) => {
                        self.force_logout(LogoutReason::SignalledUnauthorized);
                        true
                    }
                    None => {
                        debug!("all auth signallers dropped");
                        signals_open = false;
                        true
                    }
                },
            };
            if !keep_running {
                info!("auth guard cancelled");
                break;
            }
        }

        info!(status = ?self.status(), "auth guard stopped");
    }

    /// Run an in-flight renewal while still answering cancellation and the
    /// unauthorized signal. Either one drops `work` mid-flight.
    ///
    /// Returns false when the guard was cancelled.
    async fn drive<F>(
        &self,
        work: F,
        signals: &mut mpsc::UnboundedReceiver<AuthSignal>,
        signals_open: &mut bool,
        cancel: &CancellationToken,
    ) -> bool
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(work);
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("renewal abandoned on cancellation");
                    return false;
                }
                signal = signals.recv(), if *signals_open => match signal {
                    Some(AuthSignal::Unauthorized) => {
                        debug!("unauthorized signal preempts renewal");
                        self.force_logout(LogoutReason::SignalledUnauthorized);
                        return true;
                    }
                    Some(AuthSignal::VisibilityRegained) => {
                        debug!("renewal already in flight, ignoring visibility signal");
                    }
                    None => *signals_open = false,
                },
                _ = &mut work => return true,
            }
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

/// Owning handle to a spawned [`AuthGuard`]. Dropping it stops the guard.
pub struct AuthGuardHandle {
    signaller: AuthSignaller,
    status: watch::Receiver<AuthStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AuthGuardHandle {
    /// Sender for visibility and unauthorized signals.
    pub fn signaller(&self) -> AuthSignaller {
        self.signaller.clone()
    }

    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    /// Wait until the session is logged out.
    ///
    /// Also returns if the guard task goes away first.
    pub async fn logged_out(&self) {
        let mut status = self.status.clone();
        let _ = status.wait_for(|s| *s == AuthStatus::LoggedOut).await;
    }

    /// Returns true once the guard loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for AuthGuardHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}
