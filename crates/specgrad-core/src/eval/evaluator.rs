//! Recursive differentiable evaluation of expression trees.

use candle_core::{DType, Device, Tensor};
use tracing::trace;

use crate::artifact::{BinaryOpKind, ExprNode, QuantifierKind, ResourceKind, UnaryOpKind};
use crate::config::{ForAllAggregation, RelaxationConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::eval::env::Environment;
use crate::eval::relax;
use crate::resources::{ResourceTable, TrainingMode};
use crate::sampling::SamplerRegistry;

/// Reduces expression trees to tensors in one post-order pass.
///
/// The evaluator holds no mutable state; it borrows the bindings and
/// config for the duration of one call, so a closure can build one per
/// invocation. Every tensor it produces stays attached to the caller's
/// autodiff graph: nothing is detached or copied out of the gradient
/// path.
pub struct Evaluator<'a> {
    resources: &'a ResourceTable,
    samplers: &'a SamplerRegistry,
    config: &'a RelaxationConfig,
    device: &'a Device,
    mode: TrainingMode,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        resources: &'a ResourceTable,
        samplers: &'a SamplerRegistry,
        config: &'a RelaxationConfig,
        device: &'a Device,
        mode: TrainingMode,
    ) -> Self {
        Self {
            resources,
            samplers,
            config,
            device,
            mode,
        }
    }

    /// Evaluates `node` under `env`.
    ///
    /// Quantifier-bound variables resolve through `env`; free variables
    /// fall back to the sampler registry and are drawn independently per
    /// occurrence. Errors abort the whole call.
    pub fn evaluate(&self, node: &ExprNode, env: &Environment<'_>) -> BridgeResult<Tensor> {
        match node {
            ExprNode::Literal { value } => {
                Tensor::new(*value as f32, self.device).map_err(wrap_tensor("literal"))
            }

            ExprNode::VariableRef { name } => match env.get(name) {
                Some(bound) => Ok(bound.clone()),
                None => {
                    let sampler = self.samplers.get(name)?;
                    sampler.sample().map_err(|e| BridgeError::Sampler {
                        name: name.clone(),
                        message: e.to_string(),
                    })
                }
            },

            ExprNode::ResourceRef { name, kind } => match kind {
                ResourceKind::Parameter => Ok(self.resources.parameter(name)?.clone()),
                ResourceKind::Dataset => self
                    .resources
                    .dataset(name)?
                    .fetch()
                    .map_err(|e| BridgeError::Dataset {
                        name: name.clone(),
                        message: e.to_string(),
                    }),
                ResourceKind::Network => Err(BridgeError::MalformedArtifact {
                    detail: format!(
                        "network '{name}' used as a value; networks only appear applied to an argument"
                    ),
                }),
            },

            ExprNode::NetworkApply { network, argument } => {
                let input = self.evaluate(argument, env)?;
                let net = self.resources.network(network)?;
                trace!(network = %network, input_dims = ?input.dims(), "network forward");
                net.forward(&input, self.mode)
                    .map_err(|e| BridgeError::Network {
                        name: network.clone(),
                        message: e.to_string(),
                    })
            }

            ExprNode::UnaryOp { op, operand } => {
                let x = self.evaluate(operand, env)?;
                match op {
                    UnaryOpKind::Negate => x.neg().map_err(wrap_tensor("neg")),
                    UnaryOpKind::LogicalNot => relax::complement(&x).map_err(wrap_tensor("not")),
                }
            }

            ExprNode::BinaryOp { op, left, right } => {
                let l = self.evaluate(left, env)?;
                let r = self.evaluate(right, env)?;
                self.apply_binary(*op, &l, &r, node)
            }

            ExprNode::Quantifier {
                kind,
                variable,
                body,
            } => self.quantify(*kind, variable, body, env),
        }
    }

    fn apply_binary(
        &self,
        op: BinaryOpKind,
        l: &Tensor,
        r: &Tensor,
        node: &ExprNode,
    ) -> BridgeResult<Tensor> {
        if !broadcast_compatible(l.dims(), r.dims()) {
            return Err(BridgeError::ShapeMismatch {
                op: op.to_string(),
                lhs: l.dims().to_vec(),
                rhs: r.dims().to_vec(),
            });
        }
        let wrap = wrap_tensor(op.to_string());
        match op {
            BinaryOpKind::Add => l.broadcast_add(r).map_err(wrap),
            BinaryOpKind::Sub => l.broadcast_sub(r).map_err(wrap),
            BinaryOpKind::Mul => l.broadcast_mul(r).map_err(wrap),
            BinaryOpKind::Div => {
                self.ensure_nonzero(r, node)?;
                l.broadcast_div(r).map_err(wrap)
            }
            BinaryOpKind::And => relax::t_norm(l, r).map_err(wrap),
            BinaryOpKind::Or => relax::t_conorm(l, r).map_err(wrap),
            BinaryOpKind::Implies => relax::implication(l, r).map_err(wrap),
            BinaryOpKind::Eq
            | BinaryOpKind::Lt
            | BinaryOpKind::Le
            | BinaryOpKind::Gt
            | BinaryOpKind::Ge => relax::comparison(op, l, r, self.config).map_err(wrap),
        }
    }

    /// Rejects the division before computing it when any element of the
    /// denominator is exactly zero; no inf/nan is ever substituted.
    fn ensure_nonzero(&self, denom: &Tensor, node: &ExprNode) -> BridgeResult<()> {
        let wrap = |e: candle_core::Error| BridgeError::Tensor {
            op: "div".to_string(),
            message: e.to_string(),
        };
        let zeros = denom.zeros_like().map_err(wrap)?;
        let zero_hits = denom
            .eq(&zeros)
            .map_err(wrap)?
            .to_dtype(DType::F32)
            .map_err(wrap)?
            .sum_all()
            .map_err(wrap)?
            .to_scalar::<f32>()
            .map_err(wrap)?;
        if zero_hits > 0.0 {
            return Err(BridgeError::DivisionByZero {
                expr: node.to_string(),
            });
        }
        Ok(())
    }

    /// One fresh draw per configured sample, then the configured
    /// aggregation along the sample axis. Draws are never reused across
    /// calls; the expectation is approximated over the training run.
    fn quantify(
        &self,
        kind: QuantifierKind,
        variable: &str,
        body: &ExprNode,
        env: &Environment<'_>,
    ) -> BridgeResult<Tensor> {
        let sampler = self.samplers.get(variable)?;
        let draws = self.config.quantifier_samples;
        trace!(quantifier = %kind, variable = %variable, draws, "sampling quantifier");

        let mut truths: Vec<Tensor> = Vec::with_capacity(draws);
        for _ in 0..draws {
            let value = sampler.sample().map_err(|e| BridgeError::Sampler {
                name: variable.to_string(),
                message: e.to_string(),
            })?;
            let child = env.child(variable, &value);
            let truth = self.evaluate(body, &child)?;
            if let Some(first) = truths.first() {
                if first.dims() != truth.dims() {
                    return Err(BridgeError::ShapeMismatch {
                        op: kind.to_string(),
                        lhs: first.dims().to_vec(),
                        rhs: truth.dims().to_vec(),
                    });
                }
            }
            truths.push(truth);
        }

        // A single draw makes every aggregation the identity.
        if let [single] = truths.as_slice() {
            return Ok(single.clone());
        }

        let aggregated = match kind {
            QuantifierKind::ForAll => match self.config.forall_aggregation {
                ForAllAggregation::Mean => relax::mean(&truths),
                ForAllAggregation::SoftMin => {
                    relax::soft_min(&truths, self.config.quantifier_temperature)
                }
            },
            QuantifierKind::Exists => relax::soft_max(&truths, self.config.quantifier_temperature),
        };
        aggregated.map_err(wrap_tensor(kind.to_string()))
    }
}

fn wrap_tensor(op: impl Into<String>) -> impl Fn(candle_core::Error) -> BridgeError {
    let op = op.into();
    move |e| BridgeError::Tensor {
        op: op.clone(),
        message: e.to_string(),
    }
}

/// Numpy broadcast rule: align trailing dims; each pair must match or
/// contain a 1. Missing leading dims count as 1.
fn broadcast_compatible(lhs: &[usize], rhs: &[usize]) -> bool {
    lhs.iter()
        .rev()
        .zip(rhs.iter().rev())
        .all(|(&a, &b)| a == b || a == 1 || b == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::ConstantSampler;

    fn lit(v: f64) -> Box<ExprNode> {
        Box::new(ExprNode::Literal { value: v })
    }

    fn bin(op: BinaryOpKind, left: Box<ExprNode>, right: Box<ExprNode>) -> ExprNode {
        ExprNode::BinaryOp { op, left, right }
    }

    struct Doubler;

    impl crate::resources::Network for Doubler {
        fn forward(&self, input: &Tensor, _mode: TrainingMode) -> candle_core::Result<Tensor> {
            input.affine(2.0, 0.0)
        }
    }

    struct Fixture {
        resources: ResourceTable,
        samplers: SamplerRegistry,
        config: RelaxationConfig,
        device: Device,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                resources: ResourceTable::new(),
                samplers: SamplerRegistry::new(),
                config: RelaxationConfig::default(),
                device: Device::Cpu,
            }
        }

        fn eval(&self, node: &ExprNode) -> BridgeResult<Tensor> {
            Evaluator::new(
                &self.resources,
                &self.samplers,
                &self.config,
                &self.device,
                TrainingMode::Training,
            )
            .evaluate(node, &Environment::root())
        }
    }

    #[test]
    fn arithmetic_is_exact() {
        // (2 * 3) + (10 / 4) = 8.5, no relaxation on arithmetic.
        let tree = bin(
            BinaryOpKind::Add,
            Box::new(bin(BinaryOpKind::Mul, lit(2.0), lit(3.0))),
            Box::new(bin(BinaryOpKind::Div, lit(10.0), lit(4.0))),
        );
        let out = Fixture::new().eval(&tree).unwrap();
        assert_eq!(out.to_scalar::<f32>().unwrap(), 8.5);
    }

    #[test]
    fn negation_and_subtraction_are_exact() {
        let tree = ExprNode::UnaryOp {
            op: UnaryOpKind::Negate,
            operand: Box::new(bin(BinaryOpKind::Sub, lit(1.5), lit(4.0))),
        };
        let out = Fixture::new().eval(&tree).unwrap();
        assert_eq!(out.to_scalar::<f32>().unwrap(), 2.5);
    }

    #[test]
    fn division_by_zero_is_rejected_before_computing() {
        let tree = bin(BinaryOpKind::Div, lit(1.0), lit(0.0));
        match Fixture::new().eval(&tree).unwrap_err() {
            BridgeError::DivisionByZero { expr } => {
                assert_eq!(expr, "(div 1 0)");
            }
            other => panic!("expected DivisionByZero, got {other:?}"),
        }
    }

    #[test]
    fn elementwise_zero_in_denominator_is_rejected() {
        let mut fixture = Fixture::new();
        let denom = Tensor::new(&[1f32, 0.0, 3.0], &fixture.device).unwrap();
        fixture.resources = ResourceTable::new().with_parameter("d", denom);
        let tree = bin(
            BinaryOpKind::Div,
            lit(1.0),
            Box::new(ExprNode::ResourceRef {
                name: "d".to_string(),
                kind: ResourceKind::Parameter,
            }),
        );
        assert!(matches!(
            fixture.eval(&tree).unwrap_err(),
            BridgeError::DivisionByZero { .. }
        ));
    }

    #[test]
    fn incompatible_shapes_are_rejected_before_the_op() {
        let mut fixture = Fixture::new();
        let a = Tensor::zeros((2, 3), DType::F32, &fixture.device).unwrap();
        let b = Tensor::zeros(4, DType::F32, &fixture.device).unwrap();
        fixture.resources = ResourceTable::new()
            .with_parameter("a", a)
            .with_parameter("b", b);
        let tree = bin(
            BinaryOpKind::Add,
            Box::new(ExprNode::ResourceRef {
                name: "a".to_string(),
                kind: ResourceKind::Parameter,
            }),
            Box::new(ExprNode::ResourceRef {
                name: "b".to_string(),
                kind: ResourceKind::Parameter,
            }),
        );
        match fixture.eval(&tree).unwrap_err() {
            BridgeError::ShapeMismatch { op, lhs, rhs } => {
                assert_eq!(op, "add");
                assert_eq!(lhs, vec![2, 3]);
                assert_eq!(rhs, vec![4]);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn variables_resolve_env_first_then_sampler() {
        let mut fixture = Fixture::new();
        fixture.samplers.insert(
            "x",
            ConstantSampler::new(Tensor::new(0.25f32, &fixture.device).unwrap()),
        );
        let tree = ExprNode::VariableRef {
            name: "x".to_string(),
        };

        // Free occurrence: drawn from the sampler.
        let free = fixture.eval(&tree).unwrap();
        assert_eq!(free.to_scalar::<f32>().unwrap(), 0.25);

        // Bound occurrence: the environment wins.
        let bound_value = Tensor::new(0.75f32, &fixture.device).unwrap();
        let root = Environment::root();
        let env = root.child("x", &bound_value);
        let evaluator = Evaluator::new(
            &fixture.resources,
            &fixture.samplers,
            &fixture.config,
            &fixture.device,
            TrainingMode::Training,
        );
        let bound = evaluator.evaluate(&tree, &env).unwrap();
        assert_eq!(bound.to_scalar::<f32>().unwrap(), 0.75);
    }

    #[test]
    fn unknown_variable_is_unbound() {
        let tree = ExprNode::VariableRef {
            name: "ghost".to_string(),
        };
        match Fixture::new().eval(&tree).unwrap_err() {
            BridgeError::UnboundVariable { name } => assert_eq!(name, "ghost"),
            other => panic!("expected UnboundVariable, got {other:?}"),
        }
    }

    #[test]
    fn bare_network_reference_is_malformed() {
        let mut fixture = Fixture::new();
        fixture.resources = ResourceTable::new().with_network("net", Doubler);
        let tree = ExprNode::ResourceRef {
            name: "net".to_string(),
            kind: ResourceKind::Network,
        };
        assert!(matches!(
            fixture.eval(&tree).unwrap_err(),
            BridgeError::MalformedArtifact { .. }
        ));
    }

    #[test]
    fn network_apply_runs_the_forward_pass() {
        let mut fixture = Fixture::new();
        fixture.resources = ResourceTable::new().with_network("net", Doubler);
        let tree = ExprNode::NetworkApply {
            network: "net".to_string(),
            argument: lit(3.0),
        };
        let out = fixture.eval(&tree).unwrap();
        assert_eq!(out.to_scalar::<f32>().unwrap(), 6.0);
    }

    #[test]
    fn quantifier_with_constant_sampler_is_idempotent() {
        // forall x . x > 0 with x pinned to 1.0 keeps the same truth value
        // whatever the sample count or aggregation.
        for (samples, aggregation) in [
            (1, ForAllAggregation::Mean),
            (4, ForAllAggregation::Mean),
            (4, ForAllAggregation::SoftMin),
        ] {
            let mut fixture = Fixture::new();
            fixture.config.quantifier_samples = samples;
            fixture.config.forall_aggregation = aggregation;
            fixture.samplers.insert(
                "x",
                ConstantSampler::new(Tensor::new(1.0f32, &fixture.device).unwrap()),
            );
            let tree = ExprNode::Quantifier {
                kind: QuantifierKind::ForAll,
                variable: "x".to_string(),
                body: Box::new(bin(
                    BinaryOpKind::Gt,
                    Box::new(ExprNode::VariableRef {
                        name: "x".to_string(),
                    }),
                    lit(0.0),
                )),
            };
            let out = fixture.eval(&tree).unwrap().to_scalar::<f32>().unwrap();
            assert!(out > 0.99, "samples={samples} gave {out}");
        }
    }

    #[test]
    fn exists_with_constant_sampler_is_idempotent() {
        for samples in [1, 4] {
            let mut fixture = Fixture::new();
            fixture.config.quantifier_samples = samples;
            fixture.samplers.insert(
                "x",
                ConstantSampler::new(Tensor::new(0.25f32, &fixture.device).unwrap()),
            );
            let tree = ExprNode::Quantifier {
                kind: QuantifierKind::Exists,
                variable: "x".to_string(),
                body: Box::new(ExprNode::VariableRef {
                    name: "x".to_string(),
                }),
            };
            let out = fixture.eval(&tree).unwrap().to_scalar::<f32>().unwrap();
            assert!((out - 0.25).abs() < 1e-6, "samples={samples} gave {out}");
        }
    }

    #[test]
    fn quantifier_without_sampler_is_unbound() {
        let tree = ExprNode::Quantifier {
            kind: QuantifierKind::Exists,
            variable: "x".to_string(),
            body: lit(1.0),
        };
        match Fixture::new().eval(&tree).unwrap_err() {
            BridgeError::UnboundVariable { name } => assert_eq!(name, "x"),
            other => panic!("expected UnboundVariable, got {other:?}"),
        }
    }

    #[test]
    fn broadcast_rule_matches_numpy() {
        assert!(broadcast_compatible(&[2, 3], &[3]));
        assert!(broadcast_compatible(&[2, 3], &[1, 3]));
        assert!(broadcast_compatible(&[], &[4]));
        assert!(broadcast_compatible(&[2, 1], &[2, 5]));
        assert!(!broadcast_compatible(&[2, 3], &[4]));
        assert!(!broadcast_compatible(&[2, 3], &[2, 2]));
    }
}
