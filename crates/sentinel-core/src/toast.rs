// ── Alert toasts ──
//
// Transient notifications for newly accepted alerts. Each toast runs its
// own two-phase lifecycle: visible, then exiting, then gone. The queue is
// pure; the owning task calls `advance` when `next_deadline` elapses.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::model::Alert;

pub const MAX_TOASTS: usize = 5;
pub const DISMISS_AFTER: Duration = Duration::from_millis(5000);
pub const EXIT_DURATION: Duration = Duration::from_millis(300);

/// Lifecycle limits for the toast queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastTiming {
    pub max_toasts: usize,
    pub dismiss_after: Duration,
    pub exit_duration: Duration,
}

impl Default for ToastTiming {
    fn default() -> Self {
        Self {
            max_toasts: MAX_TOASTS,
            dismiss_after: DISMISS_AFTER,
            exit_duration: EXIT_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastPhase {
    Visible { until: Instant },
    Exiting { until: Instant },
}

impl ToastPhase {
    fn deadline(self) -> Instant {
        match self {
            Self::Visible { until } | Self::Exiting { until } => until,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub alert: Arc<Alert>,
    pub phase: ToastPhase,
}

impl Toast {
    pub fn id(&self) -> &str {
        &self.alert.id
    }

    pub fn is_exiting(&self) -> bool {
        matches!(self.phase, ToastPhase::Exiting { .. })
    }
}

/// Observable toast transition, for renderers that print rather than draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "id", rename_all = "snake_case")]
pub enum ToastChange {
    Shown(String),
    Exiting(String),
    Removed(String),
    /// Evicted to respect the cap.
    Dropped(String),
}

#[derive(Debug, Clone, Default)]
pub struct ToastQueue {
    toasts: VecDeque<Toast>,
    timing: ToastTiming,
}

impl ToastQueue {
    pub fn new(timing: ToastTiming) -> Self {
        Self {
            toasts: VecDeque::with_capacity(timing.max_toasts),
            timing,
        }
    }

    /// Show a toast for `alert` unless one with the same id is already
    /// present, visible or exiting.
    pub fn push(&mut self, alert: Arc<Alert>, now: Instant) -> Vec<ToastChange> {
        if self.contains(&alert.id) {
            return Vec::new();
        }

        let mut changes = vec![ToastChange::Shown(alert.id.clone())];
        self.toasts.push_back(Toast {
            alert,
            phase: ToastPhase::Visible {
                until: now + self.timing.dismiss_after,
            },
        });
        while self.toasts.len() > self.timing.max_toasts.max(1) {
            if let Some(old) = self.toasts.pop_front() {
                changes.push(ToastChange::Dropped(old.alert.id.clone()));
            }
        }
        changes
    }

    /// Start the exit of a visible toast early. Returns `false` when the id
    /// is unknown or already exiting.
    pub fn dismiss(&mut self, id: &str, now: Instant) -> bool {
        let exit = self.timing.exit_duration;
        match self.toasts.iter_mut().find(|t| t.id() == id) {
            Some(toast) if !toast.is_exiting() => {
                toast.phase = ToastPhase::Exiting { until: now + exit };
                true
            }
            _ => false,
        }
    }

    /// Run every transition due at or before `now`.
    pub fn advance(&mut self, now: Instant) -> Vec<ToastChange> {
        let exit = self.timing.exit_duration;
        let mut changes = Vec::new();

        for toast in &mut self.toasts {
            if let ToastPhase::Visible { until } = toast.phase {
                if until <= now {
                    // Chain from the scheduled deadline so a late tick does
                    // not stretch the exit.
                    toast.phase = ToastPhase::Exiting {
                        until: until + exit,
                    };
                    changes.push(ToastChange::Exiting(toast.alert.id.clone()));
                }
            }
        }

        self.toasts.retain(|toast| match toast.phase {
            ToastPhase::Exiting { until } if until <= now => {
                changes.push(ToastChange::Removed(toast.alert.id.clone()));
                false
            }
            _ => true,
        });

        changes
    }

    /// Earliest pending transition, if any toast is present.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.toasts.iter().map(|t| t.phase.deadline()).min()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.toasts.iter().any(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn to_vec(&self) -> Vec<Toast> {
        self.toasts.iter().cloned().collect()
    }
}
