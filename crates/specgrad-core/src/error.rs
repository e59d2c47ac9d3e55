//! Error types for the specification-to-loss bridge.
//!
//! One crate-level enum covers the whole pipeline: artifact decoding,
//! closure construction, and differentiable evaluation. Variants carry the
//! offending symbol or shapes so callers can decide recovery without
//! parsing message strings.
//!
//! Propagation policy: evaluation errors abort the current closure call and
//! are never retried or substituted internally. Binding mismatches
//! (`UnboundResource`, `UnboundVariable`, `UnknownFunction`) are raised at
//! closure-build time whenever the tree makes them visible ahead of
//! evaluation.

use thiserror::Error;

use crate::artifact::ResourceKind;

/// Result alias used across the crate.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Unified error type for artifact loading, closure construction, and
/// evaluation.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The artifact document could not be read or decoded.
    ///
    /// # When This Occurs
    ///
    /// - The file is missing or unreadable
    /// - The JSON is syntactically invalid
    /// - A node is missing a required field or carries an unknown tag
    /// - A network is referenced as a bare value instead of being applied
    #[error("malformed artifact: {detail}")]
    MalformedArtifact {
        /// What was wrong with the document.
        detail: String,
    },

    /// The requested target function is absent from the artifact.
    #[error("unknown function '{name}' (artifact defines {available:?})")]
    UnknownFunction {
        /// The function that was requested.
        name: String,
        /// Functions the artifact actually defines, sorted.
        available: Vec<String>,
    },

    /// A resource reference has no binding of the matching kind.
    #[error("unbound {kind} resource '{name}'")]
    UnboundResource {
        /// The symbolic name declared by the specification.
        name: String,
        /// The kind of binding that was expected.
        kind: ResourceKind,
    },

    /// A variable is neither quantifier-bound nor covered by a sampler.
    #[error("unbound variable '{name}': not quantifier-bound and no registered sampler")]
    UnboundVariable {
        /// The variable name.
        name: String,
    },

    /// A `div` denominator evaluated to exactly zero in at least one element.
    ///
    /// The division is not performed; no inf/nan is substituted.
    #[error("division by zero evaluating {expr}")]
    DivisionByZero {
        /// Rendering of the offending division node.
        expr: String,
    },

    /// Operand shapes are not broadcast-compatible for the operator.
    #[error("shape mismatch for '{op}': {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        /// Operator that rejected the operands.
        op: String,
        /// Dims of the left operand.
        lhs: Vec<usize>,
        /// Dims of the right operand.
        rhs: Vec<usize>,
    },

    /// A bound network's forward pass failed.
    #[error("network '{name}' forward pass failed: {message}")]
    Network { name: String, message: String },

    /// A bound dataset accessor failed to produce a value.
    #[error("dataset '{name}' fetch failed: {message}")]
    Dataset { name: String, message: String },

    /// A registered sampler failed to produce a value.
    #[error("sampler for '{name}' failed: {message}")]
    Sampler { name: String, message: String },

    /// A tensor operation failed for a reason other than operand shapes,
    /// e.g. a dtype mismatch between a network output and a literal.
    #[error("tensor operation '{op}' failed: {message}")]
    Tensor { op: String, message: String },

    /// A relaxation or sampler configuration value failed validation.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },
}
