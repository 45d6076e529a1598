/// Diagnostics emitted while resolving a Surface
///
/// Nothing here is fatal: every diagnostic describes a binding that was
/// ignored, defaulted or nulled so drawing could continue.

use std::fmt;
use crate::graph::NodeId;

/// Family of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Invalid declaration, the binding falls back to a default
    Configuration,
    /// Reference that cannot be resolved, the binding is null
    Resolution,
    /// Texture loading problem
    Loader,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    UnknownUniform,
    WrongUniformShape,
    MissingUniform,
    InvalidTextureOption,
    InvalidBlendMode,
    UnknownProgram,
    AliasCycle,
    PassCycle,
    EmptyAlias,
    DanglingReference,
    InvalidAliasTarget,
    BackbufferWithoutBackbuffering,
    UnclaimedDescriptor,
    LoadFailed,
}

impl DiagnosticKind {
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            DiagnosticKind::UnknownUniform
            | DiagnosticKind::WrongUniformShape
            | DiagnosticKind::MissingUniform
            | DiagnosticKind::InvalidTextureOption
            | DiagnosticKind::InvalidBlendMode
            | DiagnosticKind::UnknownProgram => DiagnosticCategory::Configuration,
            DiagnosticKind::AliasCycle
            | DiagnosticKind::PassCycle
            | DiagnosticKind::EmptyAlias
            | DiagnosticKind::DanglingReference
            | DiagnosticKind::InvalidAliasTarget
            | DiagnosticKind::BackbufferWithoutBackbuffering => DiagnosticCategory::Resolution,
            DiagnosticKind::UnclaimedDescriptor
            | DiagnosticKind::LoadFailed => DiagnosticCategory::Loader,
        }
    }
}

/// A reported problem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Node the problem belongs to, `None` for problems spanning several nodes (cycles)
    pub node: Option<NodeId>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, node: Option<NodeId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "[{:?}] {}: {}", self.kind, node, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}
