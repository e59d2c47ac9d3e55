//! Resource bindings: networks, datasets, and parameters.
//!
//! The specification declares resources by name; the caller supplies the
//! concrete implementations here. The table is built once, then shared
//! read-only by every closure over it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use candle_core::Tensor;

use crate::artifact::ResourceKind;
use crate::error::{BridgeError, BridgeResult};

/// Whether network forward passes run in training or inference mode.
///
/// The bridge never decides this itself; it is supplied by the enclosing
/// training step and threaded through every `Network::forward` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainingMode {
    #[default]
    Training,
    Inference,
}

/// A callable forward pass bound to a specification-declared network name.
///
/// The output tensor must stay attached to the caller's autodiff graph;
/// implementations must not detach or copy it out of the gradient path.
/// Concurrent `forward` calls happen only if the caller invokes one closure
/// from several threads, so implementations only need interior
/// synchronization they would need anyway for that use.
pub trait Network: Send + Sync {
    fn forward(&self, input: &Tensor, mode: TrainingMode) -> candle_core::Result<Tensor>;
}

/// A value source bound to a specification-declared dataset name.
pub trait DatasetSource: Send + Sync {
    fn fetch(&self) -> candle_core::Result<Tensor>;
}

/// A fixed in-memory tensor acts as its own dataset.
impl DatasetSource for Tensor {
    fn fetch(&self) -> candle_core::Result<Tensor> {
        Ok(self.clone())
    }
}

/// Immutable name-keyed bindings for every resource a specification can
/// reference. Built with the consuming `with_*` chain, then never mutated.
#[derive(Default)]
pub struct ResourceTable {
    networks: HashMap<String, Arc<dyn Network>>,
    datasets: HashMap<String, Arc<dyn DatasetSource>>,
    parameters: HashMap<String, Tensor>,
}

impl ResourceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a network under the specification's declared name.
    #[must_use]
    pub fn with_network(mut self, name: impl Into<String>, network: impl Network + 'static) -> Self {
        self.networks.insert(name.into(), Arc::new(network));
        self
    }

    /// Binds a dataset source under the specification's declared name.
    #[must_use]
    pub fn with_dataset(
        mut self,
        name: impl Into<String>,
        dataset: impl DatasetSource + 'static,
    ) -> Self {
        self.datasets.insert(name.into(), Arc::new(dataset));
        self
    }

    /// Binds a scalar or tensor parameter under the specification's
    /// declared name.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Tensor) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Looks up a bound network.
    pub fn network(&self, name: &str) -> BridgeResult<&Arc<dyn Network>> {
        self.networks
            .get(name)
            .ok_or_else(|| BridgeError::UnboundResource {
                name: name.to_string(),
                kind: ResourceKind::Network,
            })
    }

    /// Looks up a bound dataset source.
    pub fn dataset(&self, name: &str) -> BridgeResult<&Arc<dyn DatasetSource>> {
        self.datasets
            .get(name)
            .ok_or_else(|| BridgeError::UnboundResource {
                name: name.to_string(),
                kind: ResourceKind::Dataset,
            })
    }

    /// Looks up a bound parameter value.
    pub fn parameter(&self, name: &str) -> BridgeResult<&Tensor> {
        self.parameters
            .get(name)
            .ok_or_else(|| BridgeError::UnboundResource {
                name: name.to_string(),
                kind: ResourceKind::Parameter,
            })
    }
}

impl fmt::Debug for ResourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut keys: Vec<_> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys
        }
        f.debug_struct("ResourceTable")
            .field("networks", &sorted_keys(&self.networks))
            .field("datasets", &sorted_keys(&self.datasets))
            .field("parameters", &sorted_keys(&self.parameters))
            .finish()
    }
}
