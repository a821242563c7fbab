//! Logical version tags
//!
//! A [`Tag`] is the `(timestamp, writer_id)` pair attached to every stored
//! value. Tags are totally ordered: timestamp first, writer identity second.

use serde::{Deserialize, Serialize};

/// Writer identity of a register that has never been written
pub const NO_WRITER: i64 = -1;

/// Version of a register value
///
/// Field order matters: the derived `Ord` compares `timestamp` first and
/// breaks ties on `writer_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Logical timestamp
    pub timestamp: u64,

    /// Identity of the client that produced the value
    pub writer_id: i64,
}

impl Tag {
    /// Tag of a never-written register
    pub const INITIAL: Tag = Tag {
        timestamp: 0,
        writer_id: NO_WRITER,
    };

    pub fn new(timestamp: u64, writer_id: i64) -> Self {
        Self {
            timestamp,
            writer_id,
        }
    }

    /// The tag a writer uses to supersede this one
    ///
    /// `None` once the timestamp space is exhausted.
    pub fn successor(self, writer_id: i64) -> Option<Self> {
        let timestamp = self.timestamp.checked_add(1)?;
        Some(Self {
            timestamp,
            writer_id,
        })
    }

    /// Whether this tag belongs to a value that was actually written
    pub fn is_written(&self) -> bool {
        self.writer_id != NO_WRITER
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.timestamp, self.writer_id)
    }
}
