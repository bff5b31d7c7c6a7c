//! Cancellable deferred actions delivered back to the session task.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DeferredAction, SessionSignal, SessionSignalSender};

/// Schedules [`DeferredAction`]s for one session.
///
/// A timer that fires after its session is gone finds the channel closed
/// and does nothing. [`DeferredTimers::cancel_all`] stops every pending
/// timer, and dropping the scheduler does the same.
pub struct DeferredTimers {
    signals: SessionSignalSender,
    cancel: CancellationToken,
}

impl DeferredTimers {
    pub fn new(signals: SessionSignalSender) -> Self {
        Self {
            signals,
            cancel: CancellationToken::new(),
        }
    }

    pub fn schedule(&self, delay: Duration, action: DeferredAction) {
        let token = self.cancel.child_token();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Deferred {:?} cancelled", action);
                }
                _ = tokio::time::sleep(delay) => {
                    if signals.send(SessionSignal::Deferred(action)).is_err() {
                        debug!("Session ended before deferred {:?} fired", action);
                    }
                }
            }
        });
    }

    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for DeferredTimers {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
