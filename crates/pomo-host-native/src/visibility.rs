//! Visibility source for a terminal client

use pomo_host_api::VisibilityMonitor;
use tokio::sync::watch;
use tracing::debug;

/// Visibility toggled explicitly by the front end (the `hide`/`show`
/// commands in `pomod`)
pub struct ManualVisibility {
    tx: watch::Sender<bool>,
}

impl ManualVisibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx }
    }

    pub fn set_visible(&self, visible: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
        if changed {
            debug!(visible, "Visibility changed");
        }
    }
}

impl VisibilityMonitor for ManualVisibility {
    fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
