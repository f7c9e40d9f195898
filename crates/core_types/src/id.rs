//! Session-scoped node identifiers.
//!
//! An [`Id`] is the only thing that survives serialization: the capture side
//! hands one out per observed node, and the replay side keys its reconstructed
//! tree by the same values. Two negative sentinels are reserved and never
//! produced by [`IdGenerator`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node inside one recording session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(i64);

impl Id {
    /// The node has not been assigned an id (or is not tracked).
    pub const UNKNOWN: Id = Id(-1);
    /// The node was deliberately skipped during serialization.
    pub const IGNORED: Id = Id(-2);
    /// First id handed out by a fresh generator; always the document root.
    pub const FIRST: Id = Id(1);

    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> i64 {
        self.0
    }

    /// True for ids produced by a generator, false for the sentinels.
    #[inline]
    pub const fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for Id {
    #[inline]
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Id> for i64 {
    #[inline]
    fn from(id: Id) -> Self {
        id.as_raw()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source. Ids are never reused within a session, including
/// after a mirror reset.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    next: i64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            next: Id::FIRST.0,
        }
    }

    pub fn next_id(&mut self) -> Id {
        let id = Id(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to [`IdGenerator::next_id`] will return.
    pub fn peek(&self) -> Id {
        Id(self.next)
    }
}
