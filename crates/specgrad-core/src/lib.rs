//! Specification-to-Loss Bridge
//!
//! Turns compiled logical-specification artifacts into differentiable loss
//! closures for gradient-based training. An external verifier compiles a
//! specification into a JSON expression tree; this crate parses that
//! artifact, binds the networks, datasets, and parameters it names,
//! relaxes its logic into smooth tensor arithmetic, and hands the
//! training loop a zero-argument closure that freshly samples every
//! quantified variable on each call.
//!
//! # Architecture
//!
//! - `artifact`: expression tree model and JSON parsing
//! - `resources`: network/dataset/parameter bindings and training mode
//! - `sampling`: sampler trait, registry, and built-in samplers
//! - `eval`: differentiable relaxations and the recursive evaluator
//! - `closure`: the loss closure factory (public entry point)
//! - `config`: relaxation temperatures and quantifier sampling settings
//! - `error`: the crate-wide error enum and result alias
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use candle_core::{Device, Tensor};
//! use specgrad_core::{
//!     Artifact, ConstantSampler, LossClosure, RelaxationConfig, ResourceTable, SamplerRegistry,
//! };
//!
//! let artifact = Artifact::from_json_str(
//!     r#"{
//!         "positive": {
//!             "tag": "quantifier", "kind": "forall", "variable": "x",
//!             "body": {
//!                 "tag": "binary_op", "op": "gt",
//!                 "left": {"tag": "variable_ref", "name": "x"},
//!                 "right": {"tag": "literal", "value": 0.0}
//!             }
//!         }
//!     }"#,
//! )
//! .unwrap();
//!
//! let device = Device::Cpu;
//! let x = Tensor::new(1.0f32, &device).unwrap();
//! let resources = Arc::new(ResourceTable::new());
//! let samplers = Arc::new(SamplerRegistry::new().with_sampler("x", ConstantSampler::new(x)));
//!
//! let closure = LossClosure::build(
//!     &artifact,
//!     "positive",
//!     resources,
//!     samplers,
//!     RelaxationConfig::default(),
//!     device,
//! )
//! .unwrap();
//!
//! let loss = closure.evaluate().unwrap();
//! assert!(loss.to_scalar::<f32>().unwrap() > 0.99);
//! ```

pub mod artifact;
pub mod closure;
pub mod config;
pub mod error;
pub mod eval;
pub mod resources;
pub mod sampling;

// Re-exports for convenience
pub use artifact::{Artifact, BinaryOpKind, ExprNode, QuantifierKind, ResourceKind, UnaryOpKind};
pub use closure::LossClosure;
pub use config::{ForAllAggregation, RelaxationConfig};
pub use error::{BridgeError, BridgeResult};
pub use eval::{Environment, Evaluator};
pub use resources::{DatasetSource, Network, ResourceTable, TrainingMode};
pub use sampling::{
    ConstantSampler, FnSampler, IndexSampler, NormalSampler, RowChoiceSampler, Sampler,
    SamplerRegistry, UniformSampler,
};
