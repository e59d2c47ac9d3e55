//! Quantifier sampling: named zero-argument value sources.
//!
//! Every quantified (or free) variable in a specification resolves to one
//! sampler here. Each `sample` call is independent; the evaluator never
//! memoizes or correlates draws. If a caller needs correlated sampling,
//! say reusing one dataset row across two variables, that coupling belongs
//! inside the sampler implementations, not in the evaluator.
//!
//! Samplers take `&self` so one registry can serve concurrent closure
//! calls; the built-ins keep their RNG behind a `parking_lot::Mutex`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal, Uniform};

use crate::error::{BridgeError, BridgeResult};

/// A zero-argument source of one value per call.
///
/// Returns a candle tensor on whatever device the sampler was configured
/// for; scalars are rank-0 tensors.
pub trait Sampler: Send + Sync {
    fn sample(&self) -> candle_core::Result<Tensor>;
}

/// Adapts a plain closure into a [`Sampler`].
pub struct FnSampler<F>(F);

impl<F> FnSampler<F>
where
    F: Fn() -> candle_core::Result<Tensor> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Sampler for FnSampler<F>
where
    F: Fn() -> candle_core::Result<Tensor> + Send + Sync,
{
    fn sample(&self) -> candle_core::Result<Tensor> {
        (self.0)()
    }
}

/// Returns the same tensor on every call.
pub struct ConstantSampler {
    value: Tensor,
}

impl ConstantSampler {
    pub fn new(value: Tensor) -> Self {
        Self { value }
    }
}

impl Sampler for ConstantSampler {
    fn sample(&self) -> candle_core::Result<Tensor> {
        Ok(self.value.clone())
    }
}

/// Uniform draws in `[low, high)` with a fixed shape.
///
/// An empty shape yields rank-0 scalars.
pub struct UniformSampler {
    shape: Vec<usize>,
    dist: Uniform<f32>,
    device: Device,
    rng: Mutex<StdRng>,
}

impl UniformSampler {
    pub fn new(shape: &[usize], low: f32, high: f32, device: &Device) -> BridgeResult<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(BridgeError::InvalidConfig {
                detail: format!("uniform sampler needs finite low < high, got [{low}, {high})"),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            dist: Uniform::new(low, high),
            device: device.clone(),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the entropy-seeded RNG with a fixed seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl Sampler for UniformSampler {
    fn sample(&self) -> candle_core::Result<Tensor> {
        let count: usize = self.shape.iter().product();
        let data: Vec<f32> = {
            let mut rng = self.rng.lock();
            (0..count).map(|_| self.dist.sample(&mut *rng)).collect()
        };
        Tensor::from_vec(data, self.shape.as_slice(), &self.device)
    }
}

/// Gaussian draws `mean + std * z`, `z ~ N(0, 1)`, with a fixed shape.
pub struct NormalSampler {
    shape: Vec<usize>,
    mean: f32,
    std: f32,
    device: Device,
    rng: Mutex<StdRng>,
}

impl NormalSampler {
    pub fn new(shape: &[usize], mean: f32, std: f32, device: &Device) -> BridgeResult<Self> {
        if !(mean.is_finite() && std.is_finite() && std > 0.0) {
            return Err(BridgeError::InvalidConfig {
                detail: format!("normal sampler needs finite mean and std > 0, got N({mean}, {std})"),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            mean,
            std,
            device: device.clone(),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the entropy-seeded RNG with a fixed seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl Sampler for NormalSampler {
    fn sample(&self) -> candle_core::Result<Tensor> {
        let count: usize = self.shape.iter().product();
        let data: Vec<f32> = {
            let mut rng = self.rng.lock();
            (0..count)
                .map(|_| {
                    let z: f32 = StandardNormal.sample(&mut *rng);
                    self.mean + self.std * z
                })
                .collect()
        };
        Tensor::from_vec(data, self.shape.as_slice(), &self.device)
    }
}

/// Uniform integer in `[0, upper)`, returned as a rank-0 f32 tensor.
pub struct IndexSampler {
    upper: usize,
    device: Device,
    rng: Mutex<StdRng>,
}

impl IndexSampler {
    pub fn new(upper: usize, device: &Device) -> BridgeResult<Self> {
        if upper == 0 {
            return Err(BridgeError::InvalidConfig {
                detail: "index sampler needs upper >= 1".to_string(),
            });
        }
        Ok(Self {
            upper,
            device: device.clone(),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the entropy-seeded RNG with a fixed seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl Sampler for IndexSampler {
    fn sample(&self) -> candle_core::Result<Tensor> {
        let index = self.rng.lock().gen_range(0..self.upper);
        Tensor::new(index as f32, &self.device)
    }
}

/// Uniformly chosen leading-dimension slice of a held tensor.
///
/// This is the dataset-row draw: hold the training inputs once, get one
/// row per call.
pub struct RowChoiceSampler {
    data: Tensor,
    rows: usize,
    rng: Mutex<StdRng>,
}

impl RowChoiceSampler {
    pub fn new(data: Tensor) -> BridgeResult<Self> {
        let rows = data.dims().first().copied().unwrap_or(0);
        if rows == 0 {
            return Err(BridgeError::InvalidConfig {
                detail: "row choice source needs a non-empty leading dimension".to_string(),
            });
        }
        Ok(Self {
            data,
            rows,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the entropy-seeded RNG with a fixed seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }
}

impl Sampler for RowChoiceSampler {
    fn sample(&self) -> candle_core::Result<Tensor> {
        let row = self.rng.lock().gen_range(0..self.rows);
        self.data.get(row)
    }
}

/// Name-keyed sampler table, one entry per quantified or free variable.
#[derive(Default)]
pub struct SamplerRegistry {
    samplers: HashMap<String, Arc<dyn Sampler>>,
}

impl SamplerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sampler for a variable name (builder form).
    #[must_use]
    pub fn with_sampler(mut self, name: impl Into<String>, sampler: impl Sampler + 'static) -> Self {
        self.insert(name, sampler);
        self
    }

    /// Registers a closure-backed sampler (builder form).
    #[must_use]
    pub fn with_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> candle_core::Result<Tensor> + Send + Sync + 'static,
    {
        self.insert_fn(name, f);
        self
    }

    /// Registers a sampler for a variable name.
    pub fn insert(&mut self, name: impl Into<String>, sampler: impl Sampler + 'static) {
        self.samplers.insert(name.into(), Arc::new(sampler));
    }

    /// Registers a closure-backed sampler.
    pub fn insert_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn() -> candle_core::Result<Tensor> + Send + Sync + 'static,
    {
        self.insert(name, FnSampler::new(f));
    }

    /// Looks up the sampler for a variable.
    ///
    /// # Errors
    ///
    /// `UnboundVariable` when no sampler is registered under `name`.
    pub fn get(&self, name: &str) -> BridgeResult<&Arc<dyn Sampler>> {
        self.samplers
            .get(name)
            .ok_or_else(|| BridgeError::UnboundVariable {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.samplers.contains_key(name)
    }
}

impl fmt::Debug for SamplerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.samplers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SamplerRegistry")
            .field("variables", &names)
            .finish()
    }
}
