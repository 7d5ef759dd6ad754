//! The error sink and trace sink contracts.
//!
//! Definition and type errors are *not* `anyhow::Error`s: they are recoverable,
//! reported once through a [`Diagnostics`] sink, and propagate as `None` through the emitter so
//! sibling expressions still get a chance to compile. Only internal invariant violations use
//! `anyhow` (re-exported at the crate root).

/// One of the defined error codes a function-body compile may report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Code {
    /// Duplicate local or parameter name.
    W140,
    /// Invalid storage cast.
    W141,
    /// Unresolved identifier.
    W142,
    /// Non-intrinsic type where an intrinsic type is required.
    W143,
    /// Non-intrinsic operand.
    W144,
    /// Integer-only operator used on a float operand, or vice versa.
    W145,
    /// Address-of applied to a non-addressable expression.
    W146,
    /// Member access misuse (not a struct, or unknown field).
    W147,
    /// Item access on a non-array.
    W149,
    /// Float-only built-in invoked on an integer argument.
    W150,
    /// Integer-only built-in invoked on a float argument.
    W151,
    /// Dereference of a non-pointer.
    W152,
}

/// Which of spec.md §7's two *recoverable* error kinds a [`Code`] belongs to.
///
/// *Internal invariant* failures (the third kind spec.md §7 names) are never a `Code` at all --
/// they abort compilation as an `anyhow::Error` instead (see the module header comment) -- so
/// this enum only distinguishes the two kinds that recover by reporting and propagating `None`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    /// A duplicate name or an identifier that could not be resolved at all.
    Definition,
    /// A resolved expression whose type does not satisfy the operation applied to it.
    Type,
}

impl Code {
    /// The recoverable-error kind this code belongs to, per spec.md §7.
    pub fn severity(self) -> Severity {
        match self {
            Self::W140 | Self::W142 => Severity::Definition,
            Self::W141
            | Self::W143
            | Self::W144
            | Self::W145
            | Self::W146
            | Self::W147
            | Self::W149
            | Self::W150
            | Self::W151
            | Self::W152 => Severity::Type,
        }
    }

    /// A short human-readable description, used by [`Diagnostics`] implementations that render
    /// text (the in-memory test double included in this crate formats messages this way).
    pub fn description(self) -> &'static str {
        match self {
            Self::W140 => "duplicate local or parameter",
            Self::W141 => "invalid storage cast",
            Self::W142 => "unresolved identifier",
            Self::W143 => "non-intrinsic where intrinsic required",
            Self::W144 => "non-intrinsic operand",
            Self::W145 => "integer-only operator on float (or vice versa)",
            Self::W146 => "address-of on non-addressable expression",
            Self::W147 => "member-access misuse",
            Self::W149 => "item-access on non-array",
            Self::W150 => "float-only built-in on integer",
            Self::W151 => "integer-only built-in on float",
            Self::W152 => "dereference on non-pointer",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "W{}", self.numeric())
    }
}

impl Code {
    fn numeric(self) -> u32 {
        match self {
            Self::W140 => 140,
            Self::W141 => 141,
            Self::W142 => 142,
            Self::W143 => 143,
            Self::W144 => 144,
            Self::W145 => 145,
            Self::W146 => 146,
            Self::W147 => 147,
            Self::W149 => 149,
            Self::W150 => 150,
            Self::W151 => 151,
            Self::W152 => 152,
        }
    }
}

/// A location in the source expression tree an error is attributed to.
///
/// A plain opaque index rather than a byte offset or line/column pair, since source locations
/// are attached to nodes by the parser, an external collaborator, and this crate never needs
/// to interpret them, only forward them to the sink.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct NodeId(pub u32);

/// Append-only error sink.
///
/// Implementations must not panic and must not fail; a diagnostic that cannot be recorded is
/// simply dropped; compilation's recoverability does not depend on the sink succeeding.
pub trait Diagnostics {
    fn report(&mut self, code: Code, node: Option<NodeId>);
}

/// A [`Diagnostics`] implementation that records every report, useful for tests and for
/// embedding in a batch compile driver: captures generated diagnostics into an in-memory `Vec`
/// rather than writing to an external sink.
///
/// Each entry carries the [`Severity`] alongside the [`Code`] it was derived from, so a test or
/// driver can distinguish the two recoverable error kinds without recomputing `code.severity()`
/// itself.
#[derive(Debug, Default)]
pub struct VecDiagnostics {
    pub reports: Vec<(Code, Severity, Option<NodeId>)>,
}

impl VecDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.reports.is_empty()
    }
}

impl Diagnostics for VecDiagnostics {
    fn report(&mut self, code: Code, node: Option<NodeId>) {
        self.reports.push((code, code.severity(), node));
    }
}

/// Which phase emitted a [`Trace`] event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceCategory {
    /// Before/after expression simplification.
    PExpr,
    /// On local declaration.
    Local,
    /// Post-optimization, per instruction.
    Inject,
}

/// Optional diagnostic stream receiving `(category, depth, payload)` triples.
pub trait Trace {
    fn event(&mut self, category: TraceCategory, depth: u32, payload: &dyn std::fmt::Display);
}

/// The default, zero-cost [`Trace`] implementation used when no tracing is requested: a no-op
/// default path for when the tracing feature is absent.
#[derive(Debug, Default)]
pub struct NullTrace;

impl Trace for NullTrace {
    fn event(&mut self, _category: TraceCategory, _depth: u32, _payload: &dyn std::fmt::Display) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_and_unresolved_identifier_are_definition_errors() {
        assert_eq!(Code::W140.severity(), Severity::Definition);
        assert_eq!(Code::W142.severity(), Severity::Definition);
    }

    #[test]
    fn every_other_code_is_a_type_error() {
        for code in [
            Code::W141,
            Code::W143,
            Code::W144,
            Code::W145,
            Code::W146,
            Code::W147,
            Code::W149,
            Code::W150,
            Code::W151,
            Code::W152,
        ] {
            assert_eq!(code.severity(), Severity::Type);
        }
    }

    #[test]
    fn vec_diagnostics_records_the_derived_severity() {
        let mut diagnostics = VecDiagnostics::new();
        diagnostics.report(Code::W142, None);
        assert_eq!(diagnostics.reports, vec![(Code::W142, Severity::Definition, None)]);
    }
}
