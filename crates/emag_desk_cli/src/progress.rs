//! Progress reporting for sync runs.
//!
//! Two modes:
//! - Interactive (TTY): one indicatif bar per integration and resource
//! - Logging (non-TTY): structured tracing events
//!
//! Status transitions arrive on a separate broadcast channel and are
//! rendered by [`watch_statuses`].

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use emag_desk::sync::{ProgressCallback, StatusTransition, SyncEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    Interactive(InteractiveReporter),
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    pub fn handle(&self, event: SyncEvent) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    pub fn status(&self, transition: &StatusTransition) {
        match self {
            Self::Interactive(r) => r.status(transition),
            Self::Logging(r) => r.status(transition),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render status transitions until the sending side goes away.
pub fn watch_statuses(
    reporter: Arc<ProgressReporter>,
    mut rx: broadcast::Receiver<StatusTransition>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(transition) => reporter.status(&transition),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Status watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emag_desk::SyncStatus;
    use emag_desk::sync::StatusBus;
    use uuid::Uuid;

    fn transition(to: SyncStatus) -> StatusTransition {
        StatusTransition {
            integration_id: Uuid::new_v4(),
            integration: "shop-ro".to_string(),
            from: SyncStatus::Idle,
            to,
            error: None,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn watcher_stops_when_the_bus_is_dropped() {
        let bus = StatusBus::new(4);
        let reporter = Arc::new(ProgressReporter::Logging(LoggingReporter::new()));
        let handle = watch_statuses(reporter, bus.subscribe());

        assert_eq!(bus.publish(transition(SyncStatus::Loading)), 1);
        drop(bus);

        handle.await.expect("watcher exits cleanly");
    }

    #[test]
    fn callback_forwards_events() {
        let reporter = Arc::new(ProgressReporter::Logging(LoggingReporter::new()));
        let callback = reporter.as_callback();
        callback(SyncEvent::Warning {
            message: "slow page".to_string(),
        });
        reporter.finish();
    }
}
