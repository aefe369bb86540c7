//! Non-fatal findings collected while compiling.

use std::fmt;

use tracing::warn;

/// What a warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub enum WarningKind {
    /// Questionable but legal design (event-less transition, source that will not trigger, ...).
    DesignSmell,
    /// A state or transition was disabled because something it depends on is disabled.
    CascadingDisable,
    /// An event group had no base and one was assigned.
    AutoAssignedBase,
    /// An unqualified event was rewritten to its `Group.event` form.
    AutoQualifiedEvent,
    /// A structured callback carries literal code.
    EmbeddedCode,
    /// A value contains `;` that may be a comment or a statement separator.
    AmbiguousSeparator,
    /// Section headers in the raw text don't match the sections collected.
    SectionCountMismatch,
    /// An optional section or key is missing.
    MissingOptional,
    /// Override functions never referenced by the design.
    OrphanedOverride,
    /// An option was accepted but has no effect.
    IgnoredOption,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "diagram", derive(serde::Serialize))]
pub struct Warning {
    /// Running count, starting at 1.
    pub number: usize,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning {}: {}", self.number, self.message)
    }
}

/// Accumulates warnings in the order they were raised and streams them to the log.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let number = self.warnings.len() + 1;
        let message = message.into();
        warn!(number, ?kind, "{message}");
        self.warnings.push(Warning {
            number,
            kind,
            message,
        });
    }

    pub fn count(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn count_of(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_numbered_in_order() {
        let mut diag = Diagnostics::new();
        diag.warn(WarningKind::DesignSmell, "first");
        diag.warn(WarningKind::AutoAssignedBase, "second");

        assert_eq!(diag.count(), 2);
        assert_eq!(diag.warnings()[0].number, 1);
        assert_eq!(diag.warnings()[1].number, 2);
        assert_eq!(diag.count_of(WarningKind::AutoAssignedBase), 1);
        assert_eq!(diag.warnings()[1].to_string(), "warning 2: second");
    }
}
