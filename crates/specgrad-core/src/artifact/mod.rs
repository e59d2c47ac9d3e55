//! Compiled specification artifacts: node model and JSON parsing.

mod node;
mod parse;

pub use node::{BinaryOpKind, ExprNode, QuantifierKind, ResourceKind, UnaryOpKind};
pub use parse::Artifact;
