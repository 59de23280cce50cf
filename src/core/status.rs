use std::sync::atomic::{AtomicU8, Ordering};

/// Application lifecycle status.
///
/// Moves forward only: `Unknown → Initialized → Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    /// Created, `run` not called yet (or still before the bind stage).
    Unknown,
    /// Bindings are in place; components are being registered and booted.
    Initialized,
    /// Every component started; registration APIs are closed.
    Started,
}

impl Status {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::Unknown,
            1 => Status::Initialized,
            _ => Status::Started,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Initialized => "initialized",
            Status::Started => "started",
        }
    }
}

/// Monotonic status cell shared between the sequencer and API callers.
#[derive(Debug, Default)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advances to `next`; moving backwards is ignored.
    pub(crate) fn advance(&self, next: Status) {
        self.0.fetch_max(next as u8, Ordering::AcqRel);
    }
}
