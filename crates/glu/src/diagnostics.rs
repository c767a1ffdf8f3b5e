//! Diagnostic accumulation (spec §7 "Error Handling Design").
//!
//! Compiler-user-facing problems never unwind the pipeline: Sema keeps
//! going so multiple errors can be reported per invocation, and GIL
//! generation is skipped only if at least one error (not warning) was
//! emitted (spec §7, "Propagation policy"). The `DiagnosticSink` is the
//! concrete collaborator; rendering/formatting is entirely the caller's
//! business (spec §6), so this module only carries structured data.

use crate::source::SourceLocation;

/// The closed set of diagnostic kinds named in spec §7. Each variant caries
/// exactly the context described in that table's "When" column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    TypeMismatch { expected: String, found: String },
    AmbiguousOverload { name: String, candidates: Vec<String> },
    UndeclaredName { name: String },
    InvalidConversion { from: String, to: String, explicit: bool },
    MemberNotFound { struct_name: String, member: String },
    InvalidLiteralForTarget { literal: String, target: String },
    DuplicateDeclaration { name: String },
    ImmutableAssignment { name: String },
    InvalidAttributeTarget { attribute: String },
    UnreferencedVariable { name: String },
    UnreachableCode,
    ReturnTypeMismatch { expected: String, found: String },
    StructFieldCount { struct_name: String, provided: usize, required: usize, total: usize },
}

impl DiagnosticKind {
    /// Diagnostics named in spec §8 scenario 6 and the "Unreferenced
    /// variable"/"Unreachable code" rows of §7 are warnings; everything
    /// else is an error.
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnreferencedVariable { .. } | DiagnosticKind::UnreachableCode => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// A plain note attached to a primary diagnostic (spec §7: ambiguous
/// overloads attach "per-candidate notes citing each function's
/// signature").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub location: SourceLocation,
    pub message: String,
}

impl Note {
    pub fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Note { location, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: SourceLocation,
    pub kind: DiagnosticKind,
    pub message: String,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(location: SourceLocation, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic { severity: kind.default_severity(), location, kind, message: message.into(), notes: Vec::new() }
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Accumulates diagnostics for a compilation pass. Matches spec §6's
/// "Diagnostic manager" collaborator contract: `(severity, location,
/// message)` triples plus ordered notes.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        log::trace!("diagnostic emitted: {:?} at {}", diagnostic.kind, diagnostic.location);
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut sink = DiagnosticSink::new();
        sink.emit(Diagnostic::new(
            SourceLocation::DETACHED,
            DiagnosticKind::UnreachableCode,
            "unreachable code",
        ));
        assert!(!sink.has_errors());

        sink.emit(Diagnostic::new(
            SourceLocation::DETACHED,
            DiagnosticKind::UndeclaredName { name: "x".into() },
            "undeclared name `x`",
        ));
        assert!(sink.has_errors());
    }
}
