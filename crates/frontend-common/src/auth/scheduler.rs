//! Proactive token refresh

use super::session::SessionManager;
use super::state::SessionSnapshot;
use crate::config::SessionConfig;
use campus_core::AuthError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background task that renews the access token while a session is active
pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Start the scheduler on the current Tokio runtime
    ///
    /// The task follows the session for its whole lifetime: it idles while
    /// unauthenticated and arms fresh timers for every new session.
    pub fn spawn(session: SessionManager, config: SessionConfig) -> RefreshSchedulerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(session, config, cancel.clone()));
        RefreshSchedulerHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a running scheduler; dropping it stops the task
pub struct RefreshSchedulerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefreshSchedulerHandle {
    /// Stop the scheduler and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Refresh scheduler task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for RefreshSchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(session: SessionManager, config: SessionConfig, cancel: CancellationToken) {
    let mut changes = session.subscribe();
    debug!(
        interval_secs = config.refresh_interval().as_secs(),
        initial_delay_secs = config.initial_refresh_delay().as_secs(),
        "Refresh scheduler started"
    );

    loop {
        let snapshot = changes.borrow_and_update().clone();

        if snapshot.authenticated {
            let force_logout = tokio::select! {
                () = cancel.cancelled() => break,
                force = drive_session(&session, &config, snapshot.epoch, &mut changes) => force,
            };

            // Not inside the per-session select: it ends as soon as logout
            // clears the session, which would drop the remote call
            if force_logout {
                session.logout().await;
            }
        } else {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    debug!("Refresh scheduler stopped");
}

/// Run the timers of one session epoch until that session ends
///
/// Returns `true` when the failure limit was reached and the session must be
/// logged out.
async fn drive_session(
    session: &SessionManager,
    config: &SessionConfig,
    epoch: u64,
    changes: &mut watch::Receiver<SessionSnapshot>,
) -> bool {
    let ended = changes.wait_for(|s| s.epoch != epoch || !s.authenticated);
    let ticks = async {
        let mut failures = 0u32;

        sleep(config.initial_refresh_delay()).await;
        if tick(session, config, &mut failures).await {
            return;
        }

        let period = config.refresh_interval();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tick(session, config, &mut failures).await {
                return;
            }
        }
    };

    // Dropping `ticks` cancels every pending timer of this epoch
    tokio::select! {
        _ = ended => {
            debug!(epoch, "Session ended, refresh timers cancelled");
            false
        }
        () = ticks => true,
    }
}

/// One scheduled refresh; `true` means the failure limit was reached
async fn tick(session: &SessionManager, config: &SessionConfig, failures: &mut u32) -> bool {
    if !session.has_refresh_token() {
        debug!("No refresh token, skipping scheduled refresh");
        return false;
    }

    match session.refresh_session().await {
        Ok(()) => {
            *failures = 0;
            debug!("Scheduled refresh succeeded");
        }
        Err(e @ AuthError::InvalidRefreshToken { .. }) => {
            // The session manager has already cleared the session
            info!(error = %e, "Session expired during scheduled refresh");
        }
        Err(AuthError::SessionChanged) => {
            debug!("Session changed during scheduled refresh");
        }
        Err(e) => {
            *failures += 1;
            warn!(error = %e, failures = *failures, "Scheduled refresh failed, retrying next tick");

            if config
                .max_consecutive_failures
                .is_some_and(|max| *failures >= max)
            {
                warn!(failures = *failures, "Too many failed refreshes, logging out");
                return true;
            }
        }
    }
    false
}
