//! Differentiable evaluation: environments, relaxations, and the
//! recursive evaluator.

mod env;
mod evaluator;
mod relax;

pub use env::Environment;
pub use evaluator::Evaluator;
