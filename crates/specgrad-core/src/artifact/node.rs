//! Expression tree nodes.
//!
//! The compiled artifact encodes each specification function as a tree of
//! these nodes. The node set is closed: the evaluator matches on it
//! exhaustively, so adding an operator means extending the enum and the
//! evaluator's case list together, with the compiler checking completeness.
//!
//! JSON encoding is internally tagged on `"tag"`:
//!
//! ```json
//! {"tag": "quantifier", "kind": "forall", "variable": "x",
//!  "body": {"tag": "binary_op", "op": "gt",
//!           "left": {"tag": "network_apply", "network": "mnist",
//!                    "argument": {"tag": "variable_ref", "name": "x"}},
//!           "right": {"tag": "literal", "value": 0.5}}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unary operator tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOpKind {
    /// Arithmetic negation `-x`.
    Negate,
    /// Fuzzy complement `1 - p`.
    LogicalNot,
}

impl fmt::Display for UnaryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOpKind::Negate => write!(f, "neg"),
            UnaryOpKind::LogicalNot => write!(f, "not"),
        }
    }
}

/// Binary operator tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Implies,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOpKind {
    /// True for connectives over `[0, 1]` truth values.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Implies)
    }

    /// True for comparison operators (relaxed to smooth margins).
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

impl fmt::Display for BinaryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOpKind::Add => "add",
            BinaryOpKind::Sub => "sub",
            BinaryOpKind::Mul => "mul",
            BinaryOpKind::Div => "div",
            BinaryOpKind::And => "and",
            BinaryOpKind::Or => "or",
            BinaryOpKind::Implies => "implies",
            BinaryOpKind::Eq => "eq",
            BinaryOpKind::Lt => "lt",
            BinaryOpKind::Le => "le",
            BinaryOpKind::Gt => "gt",
            BinaryOpKind::Ge => "ge",
        };
        write!(f, "{name}")
    }
}

/// Quantifier tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantifierKind {
    /// Universal quantification, approximated by sample aggregation.
    #[serde(rename = "forall")]
    ForAll,
    /// Existential quantification, approximated by soft-max aggregation.
    Exists,
}

impl fmt::Display for QuantifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantifierKind::ForAll => write!(f, "forall"),
            QuantifierKind::Exists => write!(f, "exists"),
        }
    }
}

/// Kinds of named resources a specification can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A trained (or in-training) network callable.
    Network,
    /// An indexable/iterable value source.
    Dataset,
    /// A scalar or tensor constant.
    Parameter,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Dataset => write!(f, "dataset"),
            ResourceKind::Parameter => write!(f, "parameter"),
        }
    }
}

/// One node of a compiled specification expression tree.
///
/// Trees are immutable after parsing and may be evaluated repeatedly and
/// concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ExprNode {
    /// Numeric constant.
    Literal { value: f64 },

    /// Reference to a quantifier-bound (or sampler-backed free) variable.
    VariableRef { name: String },

    /// Reference to a named resource declared by the specification.
    ResourceRef { name: String, kind: ResourceKind },

    /// Forward pass of a bound network on an evaluated argument.
    NetworkApply {
        network: String,
        argument: Box<ExprNode>,
    },

    /// Unary operator application.
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<ExprNode>,
    },

    /// Binary operator application.
    BinaryOp {
        op: BinaryOpKind,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },

    /// Quantified subexpression; `variable` is fresh-sampled per evaluation.
    Quantifier {
        kind: QuantifierKind,
        variable: String,
        body: Box<ExprNode>,
    },
}

impl fmt::Display for ExprNode {
    /// Compact s-expression rendering, used in error context and logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Literal { value } => write!(f, "{value}"),
            ExprNode::VariableRef { name } => write!(f, "{name}"),
            ExprNode::ResourceRef { name, .. } => write!(f, "{name}"),
            ExprNode::NetworkApply { network, argument } => {
                write!(f, "({network} {argument})")
            }
            ExprNode::UnaryOp { op, operand } => write!(f, "({op} {operand})"),
            ExprNode::BinaryOp { op, left, right } => {
                write!(f, "({op} {left} {right})")
            }
            ExprNode::Quantifier {
                kind,
                variable,
                body,
            } => write!(f, "({kind} {variable} {body})"),
        }
    }
}
