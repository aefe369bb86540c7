//! Error types for the design compiler.
//!
//! Every fatal condition the pipeline can hit is a [`CompileError`] variant. The variants are
//! grouped into the coarse [`ErrorCategory`] taxonomy through [`CompileError::category`], which
//! is what callers and tests usually match on.

use std::path::PathBuf;

/// Coarse classification of fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unreadable or unwritable file.
    Io,
    /// Malformed design file: missing section, missing key, bad value or syntax.
    MissingSection,
    MissingKey,
    /// Unknown state, event, port or callback.
    UnresolvedReference,
    /// Two event groups claim overlapping id ranges.
    RangeCollision,
    /// An event name matches more than one group.
    AmbiguousReference,
    /// The statechart shape is inconsistent (missing starts, incompatible hierarchy, ...).
    StructuralInconsistency,
    /// Embedded code, override file or initializer that cannot be turned into Rust.
    Generation,
}

/// Fatal errors raised while compiling a design file.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}: missing section [{section}]")]
    MissingSection { file: String, section: String },

    #[error("{file}: section [{section}] is missing key '{key}'")]
    MissingKey {
        file: String,
        section: String,
        key: String,
    },

    #[error("[{section}] {key} = '{value}' is invalid, expected {expected}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        expected: String,
    },

    #[error("[{section}] '{value}' is not a valid Rust identifier")]
    InvalidIdentifier { section: String, value: String },

    #[error("duplicate {kind} '{name}'")]
    DuplicateDefinition { kind: &'static str, name: String },

    #[error("{context}: cannot resolve {kind} '{reference}'")]
    UnresolvedReference {
        context: String,
        kind: &'static str,
        reference: String,
    },

    #[error(
        "event range collision: {first} [{first_base}, {first_end}) overlaps {second} [{second_base}, {second_end})"
    )]
    RangeCollision {
        first: String,
        first_base: u32,
        first_end: u32,
        second: String,
        second_base: u32,
        second_end: u32,
    },

    #[error("event group {group} has base 0, event ids must start at 1 or above")]
    ZeroEventBase { group: String },

    #[error("{context}: event '{event}' is defined in several groups: {}", groups.join(", "))]
    AmbiguousReference {
        context: String,
        event: String,
        groups: Vec<String>,
    },

    #[error("no Start transition into any of [{}]", candidates.join(", "))]
    MissingStartTransition { candidates: Vec<String> },

    #[error(
        "{transition}: reused end event {event} from state {state} prevents the end transition"
    )]
    ReusedEndEvent {
        transition: String,
        event: String,
        state: String,
    },

    #[error(
        "{transition}: missing event causes {start} -> {end} to fire on the end transition"
    )]
    MissingEvent {
        transition: String,
        start: String,
        end: String,
    },

    #[error("state {state} is its own ancestor")]
    ParentCycle { state: String },

    #[error("{transition}: {start} and {end} share no hierarchical ancestor")]
    NoCommonAncestor {
        transition: String,
        start: String,
        end: String,
    },

    #[error("{transition}: only one end state is permitted, {state} is not a top-level state")]
    NestedEndTransition { transition: String, state: String },

    #[error("{transition}: events cannot be declared inside a transition ('{event}')")]
    EventDeclaration { transition: String, event: String },

    #[error("{callback}: embedded code '{code}' rejected: {reason}")]
    EmbeddedCode {
        callback: String,
        code: String,
        reason: String,
    },

    #[error("callback '{name}' is used both as a guard and as an action")]
    CallbackKindConflict { name: String },

    #[error("invalid initializer: {message}")]
    InvalidInitializer { message: String },

    #[error("cannot parse override file {}: {message}", path.display())]
    OverrideParse { path: PathBuf, message: String },

    #[error("generated code is not valid Rust: {message}")]
    Render { message: String },
}

impl CompileError {
    /// Maps the error onto the coarse taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::Io,
            Self::MissingSection { .. } => ErrorCategory::MissingSection,
            Self::Syntax { .. }
            | Self::MissingKey { .. }
            | Self::InvalidValue { .. }
            | Self::InvalidIdentifier { .. }
            | Self::DuplicateDefinition { .. } => ErrorCategory::MissingKey,
            Self::UnresolvedReference { .. } => ErrorCategory::UnresolvedReference,
            Self::RangeCollision { .. } | Self::ZeroEventBase { .. } => {
                ErrorCategory::RangeCollision
            }
            Self::AmbiguousReference { .. } => ErrorCategory::AmbiguousReference,
            Self::MissingStartTransition { .. }
            | Self::ReusedEndEvent { .. }
            | Self::MissingEvent { .. }
            | Self::NoCommonAncestor { .. }
            | Self::ParentCycle { .. }
            | Self::NestedEndTransition { .. }
            | Self::EventDeclaration { .. }
            | Self::CallbackKindConflict { .. } => ErrorCategory::StructuralInconsistency,
            Self::EmbeddedCode { .. }
            | Self::InvalidInitializer { .. }
            | Self::OverrideParse { .. }
            | Self::Render { .. } => ErrorCategory::Generation,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
