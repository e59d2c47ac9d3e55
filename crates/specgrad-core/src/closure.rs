//! Loss closures: the public entry point of the bridge.
//!
//! A closure pairs one function's expression tree with the caller's
//! bindings and relaxation settings. It is built once per training run
//! (or per loss term), invoked once per training step, and never mutated.

use std::path::Path;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use tracing::debug;

use crate::artifact::{Artifact, ExprNode, ResourceKind};
use crate::config::RelaxationConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::eval::{Environment, Evaluator};
use crate::resources::{ResourceTable, TrainingMode};
use crate::sampling::SamplerRegistry;

/// A zero-argument differentiable loss over one specification function.
///
/// Each [`evaluate`](Self::evaluate) call builds a fresh root environment
/// and freshly samples every quantified variable, so the losses of
/// successive training steps approximate an expectation over the
/// quantifier domains. Calls hold no mutable state; concurrent
/// invocations are safe whenever the bound networks tolerate concurrent
/// forward passes.
#[derive(Debug)]
pub struct LossClosure {
    function: String,
    tree: Arc<ExprNode>,
    resources: Arc<ResourceTable>,
    samplers: Arc<SamplerRegistry>,
    config: RelaxationConfig,
    device: Device,
    mode: TrainingMode,
}

impl LossClosure {
    /// Builds a closure over `function` from an already-parsed artifact.
    ///
    /// Validates the configuration and walks the tree once so that every
    /// binding mismatch detectable ahead of evaluation fails here rather
    /// than mid-training: unresolved resources, variables with neither an
    /// enclosing quantifier nor a sampler, quantifiers without samplers,
    /// and networks referenced as bare values.
    pub fn build(
        artifact: &Artifact,
        function: &str,
        resources: Arc<ResourceTable>,
        samplers: Arc<SamplerRegistry>,
        config: RelaxationConfig,
        device: Device,
    ) -> BridgeResult<Self> {
        config.validate()?;
        let tree = Arc::clone(artifact.function(function)?);
        let mut bound = Vec::new();
        validate_tree(&tree, &resources, &samplers, &mut bound)?;
        debug!(
            function = %function,
            quantifier_samples = config.quantifier_samples,
            "built loss closure"
        );
        Ok(Self {
            function: function.to_string(),
            tree,
            resources,
            samplers,
            config,
            device,
            mode: TrainingMode::default(),
        })
    }

    /// Loads the artifact file at `path`, then builds as [`build`](Self::build).
    pub fn from_path(
        path: impl AsRef<Path>,
        function: &str,
        resources: Arc<ResourceTable>,
        samplers: Arc<SamplerRegistry>,
        config: RelaxationConfig,
        device: Device,
    ) -> BridgeResult<Self> {
        let artifact = Artifact::from_path(path)?;
        Self::build(&artifact, function, resources, samplers, config, device)
    }

    /// Fixes the training mode used by [`evaluate`](Self::evaluate).
    /// Defaults to [`TrainingMode::Training`].
    #[must_use]
    pub fn with_mode(mut self, mode: TrainingMode) -> Self {
        self.mode = mode;
        self
    }

    /// The specification function this closure evaluates.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Evaluates the loss once under the mode fixed at build time.
    ///
    /// The returned tensor stays attached to the autodiff graph of the
    /// bound networks and parameters, ready for `backward()`.
    pub fn evaluate(&self) -> BridgeResult<Tensor> {
        self.evaluate_with_mode(self.mode)
    }

    /// Evaluates the loss once under an explicit mode, for callers that
    /// flip between training and inference phases.
    pub fn evaluate_with_mode(&self, mode: TrainingMode) -> BridgeResult<Tensor> {
        let evaluator = Evaluator::new(
            &self.resources,
            &self.samplers,
            &self.config,
            &self.device,
            mode,
        );
        evaluator.evaluate(&self.tree, &Environment::root())
    }
}

/// Build-time resolution walk. `bound` is the stack of quantifier
/// variables enclosing the current node.
fn validate_tree<'n>(
    node: &'n ExprNode,
    resources: &ResourceTable,
    samplers: &SamplerRegistry,
    bound: &mut Vec<&'n str>,
) -> BridgeResult<()> {
    match node {
        ExprNode::Literal { .. } => Ok(()),

        ExprNode::VariableRef { name } => {
            if bound.iter().any(|b| *b == name.as_str()) || samplers.contains(name) {
                Ok(())
            } else {
                Err(BridgeError::UnboundVariable { name: name.clone() })
            }
        }

        ExprNode::ResourceRef { name, kind } => match kind {
            ResourceKind::Network => Err(BridgeError::MalformedArtifact {
                detail: format!(
                    "network '{name}' used as a value; networks only appear applied to an argument"
                ),
            }),
            ResourceKind::Dataset => resources.dataset(name).map(|_| ()),
            ResourceKind::Parameter => resources.parameter(name).map(|_| ()),
        },

        ExprNode::NetworkApply { network, argument } => {
            resources.network(network)?;
            validate_tree(argument, resources, samplers, bound)
        }

        ExprNode::UnaryOp { operand, .. } => validate_tree(operand, resources, samplers, bound),

        ExprNode::BinaryOp { left, right, .. } => {
            validate_tree(left, resources, samplers, bound)?;
            validate_tree(right, resources, samplers, bound)
        }

        ExprNode::Quantifier { variable, body, .. } => {
            if !samplers.contains(variable) {
                return Err(BridgeError::UnboundVariable {
                    name: variable.clone(),
                });
            }
            bound.push(variable);
            let result = validate_tree(body, resources, samplers, bound);
            bound.pop();
            result
        }
    }
}
