//! The seam to the external kernel-search engine.
//!
//! Everything hard lives behind [`SearchBackend`]: search-space exploration,
//! constraint solving on primitive counts and widths, and generation of the
//! kernel module itself. This layer only marshals shape specs and options in
//! and carries the resulting [`KernelPack`] out.

use std::fmt;

use dyn_clone::DynClone;

use crate::op::Operator;
use crate::options::SampleOptions;
use crate::Result;

/// Shape descriptor of one substitution site: the (channels, height, width)
/// triple observed flowing into a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelSpec {
    pub c: usize,
    pub h: usize,
    pub w: usize,
}

impl KernelSpec {
    pub fn new(c: usize, h: usize, w: usize) -> Self {
        Self { c, h, w }
    }
}

impl fmt::Display for KernelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.c, self.h, self.w)
    }
}

/// Loadable module artifact of a sampled kernel.
///
/// Instantiation is per call site: every placeholder gets its own operator
/// built for that site's shape, so parameters are never shared across
/// placeholders.
pub trait KernelModule: fmt::Debug + DynClone {
    fn instantiate(&self, spec: KernelSpec) -> Box<dyn Operator>;
}

dyn_clone::clone_trait_object!(KernelModule);

/// The bundle of artifacts produced by one successful sample.
///
/// Owned by the caller after return; the `module` artifact is what gets
/// handed on for splicing into placeholder sites.
#[derive(Debug, Clone)]
pub struct KernelPack {
    /// Identifier of the sampled kernel design.
    pub name: String,
    /// Factory for the generated operator.
    pub module: Box<dyn KernelModule>,
    /// Human-readable GraphViz diagram of the kernel graph.
    pub graphviz: String,
    /// Generated source text.
    pub source: String,
}

/// Trait implemented by search engines.
///
/// `sample` blocks until the engine returns; it may honor
/// `options.timeout` by failing after that many seconds. An empty `specs`
/// slice requests a context-free search with no shape constraints.
pub trait SearchBackend {
    fn sample(&self, specs: &[KernelSpec], options: &SampleOptions) -> Result<KernelPack>;
}
