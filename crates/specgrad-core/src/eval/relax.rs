//! Differentiable relaxations of logic.
//!
//! Truth values live in `[0, 1]`: 1 is satisfied, 0 is violated, and the
//! connectives are the product T-norm pair, so every rule is smooth and
//! keeps gradients flowing. Comparisons become sigmoid margins of
//! `left - right`; equality becomes a gaussian kernel of the scaled
//! difference. Quantifier aggregations reduce a stack of per-sample truth
//! values along the sample axis.

use candle_core::{Result, Tensor};
use candle_nn::ops::{sigmoid, softmax};

use crate::artifact::BinaryOpKind;
use crate::config::RelaxationConfig;

/// `1 - p`.
pub(crate) fn complement(p: &Tensor) -> Result<Tensor> {
    p.affine(-1.0, 1.0)
}

/// Product T-norm: `p * q`.
pub(crate) fn t_norm(p: &Tensor, q: &Tensor) -> Result<Tensor> {
    p.broadcast_mul(q)
}

/// Product T-conorm: `p + q - p * q`.
pub(crate) fn t_conorm(p: &Tensor, q: &Tensor) -> Result<Tensor> {
    let sum = p.broadcast_add(q)?;
    let prod = p.broadcast_mul(q)?;
    sum.sub(&prod)
}

/// `Or(1 - p, q)`.
pub(crate) fn implication(p: &Tensor, q: &Tensor) -> Result<Tensor> {
    t_conorm(&complement(p)?, q)
}

/// Smooth margin relaxation of a comparison operator.
///
/// `Gt`/`Ge` map to `sigmoid((l - r) / T)`, `Lt`/`Le` to the mirrored
/// margin, `Eq` to `exp(-((l - r) / T)^2)`. Strict and non-strict
/// comparisons coincide under the relaxation; the measure-zero boundary
/// does not matter for a training signal.
pub(crate) fn comparison(
    op: BinaryOpKind,
    left: &Tensor,
    right: &Tensor,
    config: &RelaxationConfig,
) -> Result<Tensor> {
    let diff = left.broadcast_sub(right)?;
    match op {
        BinaryOpKind::Gt | BinaryOpKind::Ge => {
            sigmoid(&diff.affine(1.0 / f64::from(config.comparison_temperature), 0.0)?)
        }
        BinaryOpKind::Lt | BinaryOpKind::Le => {
            sigmoid(&diff.affine(-1.0 / f64::from(config.comparison_temperature), 0.0)?)
        }
        BinaryOpKind::Eq => {
            let scaled = diff.affine(1.0 / f64::from(config.equality_temperature), 0.0)?;
            scaled.sqr()?.neg()?.exp()
        }
        other => candle_core::bail!("not a comparison operator: {other}"),
    }
}

/// Arithmetic mean along the sample axis.
pub(crate) fn mean(samples: &[Tensor]) -> Result<Tensor> {
    Tensor::stack(samples, 0)?.mean(0)
}

/// Softmax(-p/T)-weighted sum: a smooth minimum over samples.
pub(crate) fn soft_min(samples: &[Tensor], temperature: f32) -> Result<Tensor> {
    weighted_sum(samples, -1.0 / f64::from(temperature))
}

/// Softmax(p/T)-weighted sum: a smooth maximum over samples, so gradients
/// favor the draw closest to satisfaction.
pub(crate) fn soft_max(samples: &[Tensor], temperature: f32) -> Result<Tensor> {
    weighted_sum(samples, 1.0 / f64::from(temperature))
}

fn weighted_sum(samples: &[Tensor], scale: f64) -> Result<Tensor> {
    let stacked = Tensor::stack(samples, 0)?;
    let weights = softmax(&stacked.affine(scale, 0.0)?, 0)?;
    weights.mul(&stacked)?.sum(0)
}
