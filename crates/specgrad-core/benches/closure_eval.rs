//! Loss closure evaluation benchmarks.
//!
//! Measures the per-training-step cost of one closure call: tree walk,
//! sampling, network forward, and relaxation arithmetic on CPU.
//!
//! Run with:
//! - `cargo bench -p specgrad-core --bench closure_eval`
//! - `cargo bench -p specgrad-core --bench closure_eval quantifier_samples -- --noplot`

use std::sync::Arc;

use candle_core::{Device, Tensor, Var};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use specgrad_core::{
    Artifact, BinaryOpKind, Environment, Evaluator, ExprNode, LossClosure, Network,
    RelaxationConfig, ResourceTable, SamplerRegistry, TrainingMode, UniformSampler,
};

/// `forall x . score(x) > 0.5`
const SCORE_ABOVE: &str = r#"{
    "above_threshold": {
        "tag": "quantifier", "kind": "forall", "variable": "x",
        "body": {
            "tag": "binary_op", "op": "gt",
            "left": {
                "tag": "network_apply", "network": "score",
                "argument": {"tag": "variable_ref", "name": "x"}
            },
            "right": {"tag": "literal", "value": 0.5}
        }
    }
}"#;

struct LinearNet {
    weight: Var,
    bias: Var,
}

impl LinearNet {
    fn new(device: &Device) -> Self {
        Self {
            weight: Var::new(1.0f32, device).unwrap(),
            bias: Var::new(0.0f32, device).unwrap(),
        }
    }
}

impl Network for LinearNet {
    fn forward(&self, input: &Tensor, _mode: TrainingMode) -> candle_core::Result<Tensor> {
        input
            .broadcast_mul(self.weight.as_tensor())?
            .broadcast_add(self.bias.as_tensor())
    }
}

fn robustness_closure(input_dim: usize, config: RelaxationConfig) -> LossClosure {
    let device = Device::Cpu;
    let artifact = Artifact::from_json_str(SCORE_ABOVE).unwrap();
    let resources = Arc::new(ResourceTable::new().with_network("score", LinearNet::new(&device)));
    let shape: Vec<usize> = if input_dim == 0 { vec![] } else { vec![input_dim] };
    let samplers = Arc::new(SamplerRegistry::new().with_sampler(
        "x",
        UniformSampler::new(&shape, 0.4, 1.6, &device)
            .unwrap()
            .with_seed(42),
    ));
    LossClosure::build(
        &artifact,
        "above_threshold",
        resources,
        samplers,
        config,
        device,
    )
    .unwrap()
}

/// Chained conjunction `(x > t_1) and (x > t_2) and ...` of a given width.
fn conjunction_tree(width: usize) -> ExprNode {
    let term = |i: usize| ExprNode::BinaryOp {
        op: BinaryOpKind::Gt,
        left: Box::new(ExprNode::VariableRef {
            name: "x".to_string(),
        }),
        right: Box::new(ExprNode::Literal {
            value: i as f64 / width as f64,
        }),
    };
    (1..width).fold(term(0), |acc, i| ExprNode::BinaryOp {
        op: BinaryOpKind::And,
        left: Box::new(acc),
        right: Box::new(term(i)),
    })
}

fn bench_scalar_closure_call(c: &mut Criterion) {
    let closure = robustness_closure(0, RelaxationConfig::default());
    c.bench_function("closure_eval_scalar", |b| {
        b.iter(|| black_box(closure.evaluate().unwrap()))
    });
}

fn bench_vector_closure_call(c: &mut Criterion) {
    let closure = robustness_closure(64, RelaxationConfig::default());
    c.bench_function("closure_eval_vec64", |b| {
        b.iter(|| black_box(closure.evaluate().unwrap()))
    });
}

fn bench_quantifier_samples(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantifier_samples");
    for samples in [1usize, 4, 16] {
        let config = RelaxationConfig {
            quantifier_samples: samples,
            ..Default::default()
        };
        let closure = robustness_closure(0, config);
        group.bench_with_input(BenchmarkId::from_parameter(samples), &samples, |b, _| {
            b.iter(|| black_box(closure.evaluate().unwrap()))
        });
    }
    group.finish();
}

fn bench_tree_width(c: &mut Criterion) {
    let device = Device::Cpu;
    let resources = ResourceTable::new();
    let samplers = SamplerRegistry::new().with_sampler(
        "x",
        UniformSampler::new(&[], 0.0, 1.0, &device)
            .unwrap()
            .with_seed(7),
    );
    let config = RelaxationConfig::default();

    let mut group = c.benchmark_group("conjunction_width");
    for width in [4usize, 32, 128] {
        let tree = conjunction_tree(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let evaluator = Evaluator::new(
                &resources,
                &samplers,
                &config,
                &device,
                TrainingMode::Training,
            );
            b.iter(|| black_box(evaluator.evaluate(&tree, &Environment::root()).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_scalar_closure_call,
    bench_vector_closure_call,
    bench_quantifier_samples,
    bench_tree_width
);
criterion_main!(benches);
