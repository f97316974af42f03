//! Diagnostic identifiers and the sink boundary (§6.1, §6.3, §7).
//!
//! The core never formats messages itself: `DiagnosticId` plus positional
//! `%s` substitutions are handed to whatever sink the embedder provides
//! (a real reporter, or — in tests — a `Vec`-backed recorder). The sink
//! "must not throw back into the compiler"; in Rust terms that means
//! [`DiagnosticSink::emit`] must not panic, which is on the embedder to
//! guarantee, not something this crate can enforce.

use std::fmt;

/// A source location: an opaque source id plus a byte-offset span.
///
/// The source manager that maps this to `(line, column)` text is external
/// (§6.1); the core only ever carries spans through, never renders them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceSpan {
    pub source_id: u32,
    pub start: u32,
    pub end: u32,
}

impl SourceSpan {
    #[must_use]
    pub const fn new(source_id: u32, start: u32, end: u32) -> Self {
        Self { source_id, start, end }
    }

    /// A span with no useful location, used for synthesized code (`qInit`,
    /// `qDone`) that has no single source position.
    #[must_use]
    pub const fn synthetic() -> Self {
        Self { source_id: u32::MAX, start: 0, end: 0 }
    }
}

/// Selected diagnostic identifiers (§6.3), plus the handful the analyzer
/// and IR builder need that weren't enumerated there (overload ambiguity,
/// type mismatch, malformed return).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DiagnosticId {
    ParserUnexpectedToken,
    ParserStatementExpected,
    ParserExpectedPrimaryExpression,
    ParserExpectedVariableName,
    ScannerInvalidCharacter,
    ScannerInvalidInteger,
    ScannerUnendedStringLiteral,
    SemaDuplicateNamespaceName,
    SemaDuplicateClassName,
    SemaDuplicateGlobalVariableName,
    SemaDuplicateFunctionName,
    SemaDuplicateLocalVariableName,
    SemaUnresolvedClass,
    SemaAmbiguousClass,
    SemaNamespaceNotFound,
    SemaInvalidNamespaceMemberName,
    SemaPreviousDeclaration,
    SemaUnresolvedSymbol,
    SemaAmbiguousSymbol,
    SemaNoImplicitConversion,
    SemaAmbiguousOverload,
    SemaNoMatchingOverload,
    SemaInvalidLValue,
    SemaReturnValueNotExpected,
    SemaReturnValueExpected,
    SemaConstantInitializerCycle,
    InternalInconsistency,
}

impl DiagnosticId {
    /// Fixed message template, `%s` marking positional substitutions —
    /// never rendered by this crate, only carried to the external sink.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::ParserUnexpectedToken => "unexpected token %s",
            Self::ParserStatementExpected => "statement expected",
            Self::ParserExpectedPrimaryExpression => "expected primary expression",
            Self::ParserExpectedVariableName => "expected variable name",
            Self::ScannerInvalidCharacter => "invalid character %s",
            Self::ScannerInvalidInteger => "invalid integer literal %s",
            Self::ScannerUnendedStringLiteral => "unended string literal",
            Self::SemaDuplicateNamespaceName => "duplicate namespace name '%s'",
            Self::SemaDuplicateClassName => "duplicate class name '%s'",
            Self::SemaDuplicateGlobalVariableName => "duplicate global variable name '%s'",
            Self::SemaDuplicateFunctionName => "duplicate function name '%s'",
            Self::SemaDuplicateLocalVariableName => "duplicate local variable name '%s'",
            Self::SemaUnresolvedClass => "unresolved class '%s'",
            Self::SemaAmbiguousClass => "ambiguous class name '%s'",
            Self::SemaNamespaceNotFound => "namespace '%s' not found",
            Self::SemaInvalidNamespaceMemberName => "'%s' is not a valid namespace member name",
            Self::SemaPreviousDeclaration => "previous declaration of '%s' is here",
            Self::SemaUnresolvedSymbol => "unresolved symbol '%s'",
            Self::SemaAmbiguousSymbol => "ambiguous symbol '%s'",
            Self::SemaNoImplicitConversion => "no implicit conversion from %s to %s",
            Self::SemaAmbiguousOverload => "ambiguous overload for '%s'",
            Self::SemaNoMatchingOverload => "no matching overload for '%s'",
            Self::SemaInvalidLValue => "expression is not assignable",
            Self::SemaReturnValueNotExpected => "return value not expected, function returns Nothing",
            Self::SemaReturnValueExpected => "return value expected",
            Self::SemaConstantInitializerCycle => "cyclic constant initializer involving '%s'",
            Self::InternalInconsistency => "internal compiler inconsistency: %s",
        }
    }
}

/// A single reported diagnostic, as handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    pub span: SourceSpan,
    pub args: Vec<String>,
}

/// The external collaborator that accepts reported diagnostics (§6.1).
///
/// A real embedder formats `id.template()` against `args`; this crate
/// never does that itself.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Builder returned by [`report`], committed to the sink on drop unless
/// explicitly finished early via [`DiagnosticBuilder::emit`].
pub struct DiagnosticBuilder<'a> {
    sink: &'a mut dyn DiagnosticSink,
    id: DiagnosticId,
    span: SourceSpan,
    args: Vec<String>,
    committed: bool,
}

impl<'a> DiagnosticBuilder<'a> {
    /// Appends one positional substitution.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Commits the diagnostic now instead of waiting for drop.
    pub fn emit(mut self) {
        self.commit();
    }

    fn commit(&mut self) {
        if !self.committed {
            self.committed = true;
            self.sink.emit(Diagnostic {
                id: self.id,
                span: self.span,
                args: std::mem::take(&mut self.args),
            });
        }
    }
}

impl Drop for DiagnosticBuilder<'_> {
    fn drop(&mut self) {
        self.commit();
    }
}

/// Reports a diagnostic against any [`DiagnosticSink`], returning the
/// builder for positional substitutions (spec §6.1: `report(id, location,
/// args...) -> builder`).
pub fn report<S: DiagnosticSink + ?Sized>(sink: &mut S, id: DiagnosticId, span: SourceSpan) -> DiagnosticBuilder<'_> {
    DiagnosticBuilder { sink, id, span, args: Vec::new(), committed: false }
}

/// An in-memory sink used by tests and by embedders that want to collect
/// diagnostics rather than stream them.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink for CollectingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_id(&self, id: DiagnosticId) -> bool {
        self.diagnostics.iter().any(|d| d.id == id)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectingSink, DiagnosticId, SourceSpan, report};

    #[test]
    fn report_commits_on_drop() {
        let mut sink = CollectingSink::new();
        {
            let _b = report(&mut sink, DiagnosticId::SemaUnresolvedSymbol, SourceSpan::synthetic()).arg("foo");
        }
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.diagnostics[0].args, vec!["foo".to_owned()]);
    }

    #[test]
    fn explicit_emit_does_not_double_commit() {
        let mut sink = CollectingSink::new();
        report(&mut sink, DiagnosticId::SemaUnresolvedSymbol, SourceSpan::synthetic()).emit();
        assert_eq!(sink.count(), 1);
    }
}
