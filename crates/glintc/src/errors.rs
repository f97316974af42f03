//! Crate-wide error plumbing.
//!
//! Nothing in this crate uses exceptions-as-control-flow (see spec §7):
//! a diagnostic is reported through a [`crate::diagnostics::DiagnosticSink`]
//! and the offending subtree is typed `Error` so analysis continues. The
//! only sentinel is [`Reported`], used to unwind out of a single
//! declaration's processing once something fatal enough to abort that one
//! declaration has already been diagnosed.

use std::fmt;

/// Marks that a diagnostic has already been emitted for the current
/// declaration and its processing should stop without emitting another.
///
/// This is never propagated across declarations: the worklist driver
/// catches it at the boundary of a single queue item (§5, "Cancellation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "previously reported error")
    }
}

impl std::error::Error for Reported {}

/// Result alias used by every entry point that may short-circuit on a
/// diagnostic that's already been recorded.
pub type Result<T> = std::result::Result<T, Reported>;
