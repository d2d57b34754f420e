use std::fmt;

/// What the [`EventQueue`](crate::EventQueue) does with a new envelope once it
/// holds `queue_capacity` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverflowPolicy {
    /// Refuse the new envelope with [`Error::QueueFull`](crate::Error::QueueFull).
    #[default]
    Reject,
    /// Evict the oldest non-critical envelope. When every pending envelope is
    /// critical, a critical newcomer evicts the oldest critical one and any
    /// other newcomer is discarded.
    DropOldest,
    /// Silently discard the new envelope.
    DropNewest,
}

impl OverflowPolicy {
    pub fn is_reject(&self) -> bool {
        matches!(self, OverflowPolicy::Reject)
    }

    pub fn is_drop_oldest(&self) -> bool {
        matches!(self, OverflowPolicy::DropOldest)
    }

    pub fn is_drop_newest(&self) -> bool {
        matches!(self, OverflowPolicy::DropNewest)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Reject => write!(f, "Reject"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
        }
    }
}
