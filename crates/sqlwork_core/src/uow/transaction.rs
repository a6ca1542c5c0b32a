//! Transaction identity and unit-of-work lifecycle states.

use std::fmt::{Display, Formatter};

/// Identity of one transaction inside a unit of work.
///
/// Ids increase by one every time the unit of work begins a transaction, so
/// two ids from the same unit of work never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    /// Connection open; a transaction is live unless the last renew failed.
    Active,
    /// Connection released. Terminal.
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseReason {
    Disposed,
    Dropped,
}

impl ReleaseReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Disposed => "dispose",
            Self::Dropped => "dropped_without_dispose",
        }
    }
}
