//! Top-level sampling entry points.
//!
//! [`Sampler`] ties the pieces together: discover the placeholder sites of a
//! network, forward their shape descriptors and the validated options to the
//! search engine in one call, and splice the returned kernel back in. Shape
//! specs are paired with sites positionally, so discovery order and spec
//! order always agree.

use itertools::Itertools;
use tracing::{info, warn};

use crate::backend::{KernelPack, KernelSpec, SearchBackend};
use crate::graph::Graph;
use crate::options::SampleOptions;
use crate::placeholder::{PlaceholderSite, SubstitutionManager};
use crate::tensor::Tensor;
use crate::{CanvasError, Result};

/// Samples kernel designs from a search engine and substitutes them into
/// placeholder sites.
#[derive(Debug, Default)]
pub struct Sampler<B> {
    backend: B,
    sites: SubstitutionManager,
}

impl<B: SearchBackend> Sampler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sites: SubstitutionManager::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The substitution manager, for direct site inspection.
    pub fn manager(&self) -> &SubstitutionManager {
        &self.sites
    }

    /// Sample a kernel without any network context (no shape constraints).
    pub fn empty_sample(&self, options: &SampleOptions) -> Result<KernelPack> {
        self.backend.sample(&[], options)
    }

    /// Discover the placeholder sites of `graph` without sampling.
    pub fn placeholders(
        &mut self,
        graph: &mut Graph,
        example_input: Option<&Tensor>,
        require_shapes: bool,
    ) -> Result<Vec<PlaceholderSite>> {
        self.sites.discover(graph, example_input, require_shapes)
    }

    /// Sample a kernel for `graph`.
    ///
    /// Runs a discovery pass (shapes required), sends one shape spec per
    /// site to the engine in site order, and returns the sampled pack.
    /// `Ok(None)` when the graph contains no placeholders: nothing to
    /// search for, nothing to substitute.
    pub fn sample(
        &mut self,
        graph: &mut Graph,
        example_input: Option<&Tensor>,
        options: &SampleOptions,
    ) -> Result<Option<KernelPack>> {
        let sites = self.sites.discover(graph, example_input, true)?;
        if sites.is_empty() {
            warn!("no placeholders found in the network; redesign the model with placeholders");
            return Ok(None);
        }
        let specs: Vec<KernelSpec> = sites
            .iter()
            .map(|s| {
                s.spec.ok_or(CanvasError::ShapeInference {
                    node: s.node.index(),
                })
            })
            .try_collect()?;
        let pack = self.backend.sample(&specs, options)?;
        info!(kernel = %pack.name, sites = specs.len(), "sampled a kernel design");
        Ok(Some(pack))
    }

    /// Splice `pack` into every discovered site of `graph`, in place.
    ///
    /// Returns the same graph reference for fluent chaining.
    pub fn replace<'g>(
        &mut self,
        graph: &'g mut Graph,
        pack: &KernelPack,
    ) -> Result<&'g mut Graph> {
        self.sites.substitute(graph, pack)
    }
}
