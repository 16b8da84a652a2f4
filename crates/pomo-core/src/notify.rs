//! Completion notification dispatch

use chrono::{DateTime, Local};
use pomo_api::{CompletionKind, DeviceType, NotificationContext, PermissionState};
use pomo_host_api::{HostCapabilities, NotificationTransport, SoundCue, SoundPlayer};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Inputs to the dispatch matrix
#[derive(Debug, Clone, Copy)]
pub struct DispatchInputs {
    pub visible: bool,
    pub device: DeviceType,
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
}

/// Which channels a completion goes out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchPlan {
    /// Native push notification
    pub push: bool,

    /// Completion chime, concurrently with push
    pub sound: bool,

    /// Fall back to an in-app modal if push is denied or unsupported.
    /// Only while visible; hidden completions replay from the queue instead.
    pub modal_fallback: bool,

    /// Append to the pending queue for replay when visible again
    pub enqueue: bool,
}

impl DispatchPlan {
    pub fn new(inputs: DispatchInputs, caps: &HostCapabilities) -> Self {
        let notify = inputs.notifications_enabled;
        let handheld = inputs.device.is_handheld();

        let plan = Self {
            push: notify && caps.push_supported,
            sound: inputs.sound_enabled && caps.sound_supported,
            modal_fallback: notify && handheld && inputs.visible,
            enqueue: !inputs.visible && (notify || inputs.sound_enabled),
        };

        debug!(
            device = ?inputs.device,
            visible = inputs.visible,
            push = plan.push,
            sound = plan.sound,
            modal_fallback = plan.modal_fallback,
            enqueue = plan.enqueue,
            "Dispatch planned"
        );
        plan
    }

    pub fn is_noop(&self) -> bool {
        !self.push && !self.sound && !self.modal_fallback && !self.enqueue
    }
}

/// A completion alert ready to deliver
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub context: NotificationContext,
    pub plan: DispatchPlan,
}

impl Dispatch {
    pub fn cue(&self) -> SoundCue {
        match self.context.completion {
            CompletionKind::FocusComplete => SoundCue::FocusComplete,
            CompletionKind::BreakComplete | CompletionKind::LongBreakComplete => {
                SoundCue::BreakComplete
            }
        }
    }
}

/// What actually happened during delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    pub pushed: bool,
    pub sounded: bool,

    /// The caller should show the in-app modal
    pub show_modal: bool,
}

/// Deliver push and sound concurrently
pub async fn deliver(
    dispatch: &Dispatch,
    transport: &dyn NotificationTransport,
    sound: &dyn SoundPlayer,
) -> DeliveryReport {
    let plan = dispatch.plan;
    let ctx = &dispatch.context;

    let push = async {
        if !plan.push {
            return (false, plan.modal_fallback);
        }
        match transport.request_permission().await {
            PermissionState::Granted => match transport.show(&ctx.title, &ctx.body).await {
                Ok(()) => (true, false),
                Err(e) => {
                    warn!(error = %e, "Failed to show notification");
                    (false, plan.modal_fallback)
                }
            },
            state => {
                debug!(?state, "Notification permission not granted");
                (false, plan.modal_fallback)
            }
        }
    };

    let chime = async {
        if !plan.sound {
            return false;
        }
        match sound.play(dispatch.cue()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to play completion sound");
                false
            }
        }
    };

    let ((pushed, show_modal), sounded) = tokio::join!(push, chime);

    info!(
        notification_id = %ctx.id,
        title = %ctx.title,
        pushed,
        sounded,
        show_modal,
        "Completion notification delivered"
    );

    DeliveryReport {
        pushed,
        sounded,
        show_modal,
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    context: NotificationContext,
    queued_at: DateTime<Local>,
    logged_in: bool,
}

/// Completions that happened while hidden, replayed as in-app modals
#[derive(Debug)]
pub struct PendingQueue {
    entries: Vec<PendingEntry>,
    ttl: Duration,
}

impl PendingQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Vec::new(),
            ttl,
        }
    }

    pub fn push(&mut self, context: NotificationContext, now: DateTime<Local>, logged_in: bool) {
        self.entries.push(PendingEntry {
            context,
            queued_at: now,
            logged_in,
        });
    }

    /// Take every entry, keeping those still worth showing: younger than
    /// the TTL, created while logged in, and allowed by current settings
    pub fn drain_replayable(
        &mut self,
        now: DateTime<Local>,
        notifications_enabled: bool,
    ) -> Vec<NotificationContext> {
        let ttl = self.ttl;
        let total = self.entries.len();

        let replay: Vec<NotificationContext> = self
            .entries
            .drain(..)
            .filter(|e| e.logged_in && pomo_util::age(e.queued_at, now) <= ttl)
            .filter(|_| notifications_enabled)
            .map(|e| e.context)
            .collect();

        if total > 0 {
            debug!(total, replayed = replay.len(), "Pending notifications drained");
        }
        replay
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
