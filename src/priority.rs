use std::fmt;

/// Envelope priority. Only `Critical` changes queue placement (head insertion);
/// `High` and `Critical` envelopes are retried after processor failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    #[inline]
    pub fn is_critical(&self) -> bool {
        matches!(self, Priority::Critical)
    }

    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}
