//! Register entry
//!
//! A single replica-resident register and its conditional-update rule.

use crate::tag::Tag;

/// One key's state on a replica
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Register {
    /// Current value (empty until first write)
    pub value: String,

    /// Version of `value`; `Tag::INITIAL` until first write
    pub tag: Tag,
}

impl Register {
    /// Create a never-written register
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a write if its tag is strictly greater than the stored one
    ///
    /// Returns whether the register changed.
    pub fn apply(&mut self, value: &str, tag: Tag) -> bool {
        if tag <= self.tag {
            return false;
        }
        self.value.clear();
        self.value.push_str(value);
        self.tag = tag;
        true
    }

    /// Whether any write has ever been applied
    pub fn exists(&self) -> bool {
        self.tag.is_written()
    }
}
