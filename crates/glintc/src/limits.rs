//! Defensive limits for the worklist driver (§5: "the worklist driver
//! must itself be defensive against cyclic or runaway declarations").
//!
//! Shaped after `ouros::resource::ResourceError`: a small enum of
//! exceeded-limit variants with a hand-written `Display`, not a generic
//! "resource exhausted" string.

use std::fmt;

/// Bounds a [`crate::declare::WorklistDriver`] run must respect before it
/// gives up and reports an internal inconsistency (§7, kind 5) rather
/// than looping forever on a malformed or adversarial declaration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Upper bound on how many times the driver may re-drain all five
    /// queues to reach a fixed point (§4.3).
    pub max_worklist_iterations: u32,
    /// Upper bound on `superclass` chain length a single class may have.
    pub max_class_hierarchy_depth: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_worklist_iterations: 64, max_class_hierarchy_depth: 64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitExceeded {
    WorklistIterations(u32),
    ClassHierarchyDepth(u32),
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorklistIterations(max) => {
                write!(f, "worklist did not reach a fixed point within {max} iterations")
            }
            Self::ClassHierarchyDepth(max) => {
                write!(f, "class hierarchy exceeds the maximum depth of {max}")
            }
        }
    }
}

impl std::error::Error for LimitExceeded {}

#[cfg(test)]
mod tests {
    use super::{LimitExceeded, Limits};

    #[test]
    fn defaults_are_finite() {
        let limits = Limits::default();
        assert!(limits.max_worklist_iterations > 0);
        assert!(limits.max_class_hierarchy_depth > 0);
    }

    #[test]
    fn display_mentions_the_bound() {
        let err = LimitExceeded::WorklistIterations(64);
        assert!(err.to_string().contains("64"));
    }
}
