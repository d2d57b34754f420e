use std::{fmt, str::FromStr};

use crate::{Error, EventKind};

/// Which envelopes a subscriber wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subscription {
    /// Every event kind (the `"*"` wildcard).
    All,
    /// A single event kind.
    Kind(EventKind),
}

impl Subscription {
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            Subscription::All => true,
            Subscription::Kind(k) => *k == kind,
        }
    }
}

impl From<EventKind> for Subscription {
    fn from(kind: EventKind) -> Self {
        Subscription::Kind(kind)
    }
}

impl FromStr for Subscription {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(Subscription::All),
            other => other.parse().map(Subscription::Kind),
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscription::All => f.write_str("*"),
            Subscription::Kind(kind) => kind.fmt(f),
        }
    }
}
