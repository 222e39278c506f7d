//! Placeholder discovery and kernel substitution.
//!
//! A [`Placeholder`] is a substitutable site inside a network: an identity
//! pass-through until a sampled kernel is loaded into it. The
//! [`SubstitutionManager`] finds placeholder nodes, records the shapes
//! flowing into them, and later splices a generated module into every site.
//!
//! Discovered site lists live in a side-table keyed by [`GraphId`], owned by
//! the manager. The table entry is replaced whenever discovery re-runs and
//! can be dropped with [`SubstitutionManager::forget`] once a graph is
//! discarded.

use itertools::Itertools;
use petgraph::prelude::NodeIndex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::backend::{KernelPack, KernelSpec};
use crate::graph::{Graph, GraphId};
use crate::op::{InputTensor, Operator};
use crate::tensor::Tensor;
use crate::{CanvasError, Result};

/// A substitutable site in a network.
///
/// Records the (channels, height, width) of whatever flows into it on every
/// evaluation, so an example-input pass doubles as shape observation.
#[derive(Debug, Default)]
pub struct Placeholder {
    spec: Option<KernelSpec>,
    inferred: bool,
    kernel: Option<Box<dyn Operator>>,
}

impl Placeholder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed shape descriptor, if any evaluation has run.
    pub fn spec(&self) -> Option<KernelSpec> {
        self.spec
    }

    /// Whether a kernel has been loaded into this site.
    pub fn is_loaded(&self) -> bool {
        self.kernel.is_some()
    }

    /// Swap in a concrete kernel implementation.
    pub fn reload(&mut self, kernel: Box<dyn Operator>) {
        self.kernel = Some(kernel);
    }

    fn reset_inferred(&mut self) {
        self.inferred = false;
    }
}

impl Operator for Placeholder {
    fn process(&mut self, mut inp: Vec<InputTensor>) -> Result<Tensor> {
        if inp.len() != 1 {
            return Err(CanvasError::Msg(format!(
                "placeholder expects exactly one input, got {}",
                inp.len()
            )));
        }
        let x = inp.remove(0);
        let shape = x.borrowed().shape;
        self.spec = Some(KernelSpec::new(shape.c, shape.h, shape.w));
        self.inferred = true;
        match &mut self.kernel {
            Some(kernel) => kernel.process(vec![x]),
            None => Ok(x.cloned()),
        }
    }
}

/// One discovered substitution point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSite {
    /// Position of the placeholder inside its graph.
    pub node: NodeIndex,
    /// Shape descriptor at discovery time; `None` until observed.
    pub spec: Option<KernelSpec>,
    /// Whether the shape was observed during the most recent discovery pass
    /// (as opposed to carried over from an earlier one).
    pub inferred: bool,
}

/// Lifecycle of a graph's cached site list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    /// Discovery has run; sites are cached and awaiting substitution.
    Discovered,
    /// Every cached site has had a kernel spliced in.
    Substituted,
}

#[derive(Debug)]
struct CachedSites {
    state: SiteState,
    sites: Vec<PlaceholderSite>,
}

/// Finds placeholder sites and splices sampled kernels into them.
#[derive(Debug, Default)]
pub struct SubstitutionManager {
    table: FxHashMap<GraphId, CachedSites>,
}

impl SubstitutionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `graph` for placeholder nodes, in a traversal order that is
    /// stable across repeated passes on an unchanged graph.
    ///
    /// With an `example_input`, one forward evaluation is driven so every
    /// placeholder observes the concrete shape arriving at it. Without one,
    /// shapes from an earlier observation are kept; if `require_shapes` is
    /// set and a site has none, discovery fails.
    ///
    /// A graph with zero placeholders yields an empty list, not an error.
    pub fn discover(
        &mut self,
        graph: &mut Graph,
        example_input: Option<&Tensor>,
        require_shapes: bool,
    ) -> Result<Vec<PlaceholderSite>> {
        let nodes = graph
            .topo_order()?
            .into_iter()
            .filter(|&n| graph.try_get_op::<Placeholder>(n).is_some())
            .collect_vec();

        for &node in &nodes {
            if let Some(ph) = graph.try_get_op_mut::<Placeholder>(node) {
                ph.reset_inferred();
            }
        }

        if nodes.is_empty() {
            debug!(graph = ?graph.id(), "no placeholders found");
            self.table.insert(
                graph.id(),
                CachedSites {
                    state: SiteState::Discovered,
                    sites: Vec::new(),
                },
            );
            return Ok(Vec::new());
        }

        if let Some(input) = example_input {
            graph.forward(input)?;
        }

        let mut sites = Vec::with_capacity(nodes.len());
        for node in nodes {
            let ph = graph.try_get_op::<Placeholder>(node).ok_or_else(|| {
                CanvasError::Msg(format!("node {} vanished mid-discovery", node.index()))
            })?;
            let site = PlaceholderSite {
                node,
                spec: ph.spec(),
                inferred: ph.inferred,
            };
            if require_shapes && site.spec.is_none() {
                return Err(CanvasError::ShapeInference { node: node.index() });
            }
            sites.push(site);
        }

        debug!(graph = ?graph.id(), sites = sites.len(), "discovered placeholders");
        self.table.insert(
            graph.id(),
            CachedSites {
                state: SiteState::Discovered,
                sites: sites.clone(),
            },
        );
        Ok(sites)
    }

    /// Splice `pack`'s module into every cached site of `graph`.
    ///
    /// Each site gets its own instance, built for that site's observed
    /// shape. The graph is mutated in place and the same reference is
    /// returned for fluent chaining.
    pub fn substitute<'g>(
        &mut self,
        graph: &'g mut Graph,
        pack: &KernelPack,
    ) -> Result<&'g mut Graph> {
        let entry = self
            .table
            .get_mut(&graph.id())
            .ok_or(CanvasError::NotInitialized {
                reason: "no discovery pass has run on this graph",
            })?;
        if entry.sites.is_empty() {
            return Err(CanvasError::NotInitialized {
                reason: "the graph has no placeholder sites",
            });
        }
        for site in &entry.sites {
            let spec = site
                .spec
                .ok_or(CanvasError::ShapeInference { node: site.node.index() })?;
            let ph = graph
                .try_get_op_mut::<Placeholder>(site.node)
                .ok_or(CanvasError::NotInitialized {
                    reason: "a cached site no longer refers to a placeholder in this graph",
                })?;
            ph.reload(pack.module.instantiate(spec));
        }
        entry.state = SiteState::Substituted;
        debug!(
            graph = ?graph.id(),
            kernel = %pack.name,
            sites = entry.sites.len(),
            "substituted kernel into placeholders"
        );
        Ok(graph)
    }

    /// Lifecycle state of a graph's cached sites, if any pass has run.
    pub fn state(&self, graph: &Graph) -> Option<SiteState> {
        self.table.get(&graph.id()).map(|e| e.state)
    }

    /// The cached site list for a graph, if any pass has run.
    pub fn sites(&self, graph: &Graph) -> Option<&[PlaceholderSite]> {
        self.table.get(&graph.id()).map(|e| e.sites.as_slice())
    }

    /// Drop the cached entry for a graph that is going away.
    pub fn forget(&mut self, graph: &Graph) {
        self.table.remove(&graph.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{AvgPool2d, ReLU};
    use crate::tensor::Shape;
    use crate::tests::scale_pack;

    /// relu -> placeholder -> pool(2) -> placeholder
    fn two_site_graph() -> (Graph, NodeIndex, NodeIndex) {
        let mut cx = Graph::new();
        let relu = cx.add_op(ReLU);
        let p1 = cx.add_op(Placeholder::new());
        let pool = cx.add_op(AvgPool2d::new(2));
        let p2 = cx.add_op(Placeholder::new());
        cx.connect(relu, p1, 0);
        cx.connect(p1, pool, 0);
        cx.connect(pool, p2, 0);
        (cx, p1, p2)
    }

    #[test]
    fn no_placeholders_is_a_no_op() {
        let mut cx = Graph::new();
        cx.add_op(ReLU);
        let mut mgr = SubstitutionManager::new();
        let sites = mgr.discover(&mut cx, None, false).unwrap();
        assert!(sites.is_empty());
        assert_eq!(mgr.state(&cx), Some(SiteState::Discovered));
    }

    #[test]
    fn discovery_observes_shapes_at_each_site() {
        let (mut cx, p1, p2) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let input = Tensor::zeros(Shape::new(1, 4, 8, 8));
        let sites = mgr.discover(&mut cx, Some(&input), true).unwrap();

        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].node, p1);
        assert_eq!(sites[0].spec, Some(KernelSpec::new(4, 8, 8)));
        assert_eq!(sites[1].node, p2);
        assert_eq!(sites[1].spec, Some(KernelSpec::new(4, 4, 4)));
        assert!(sites.iter().all(|s| s.inferred));
    }

    #[test]
    fn discovery_order_is_stable() {
        let (mut cx, _, _) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let input = Tensor::zeros(Shape::new(1, 2, 4, 4));
        let first = mgr.discover(&mut cx, Some(&input), true).unwrap();
        let second = mgr.discover(&mut cx, Some(&input), true).unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(
            first.iter().map(|s| s.node).collect_vec(),
            second.iter().map(|s| s.node).collect_vec()
        );
    }

    #[test]
    fn shapes_survive_a_pass_without_example_input() {
        let (mut cx, _, _) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let input = Tensor::zeros(Shape::new(1, 2, 4, 4));
        mgr.discover(&mut cx, Some(&input), true).unwrap();

        // Shapes are carried over but no longer freshly inferred.
        let again = mgr.discover(&mut cx, None, true).unwrap();
        assert_eq!(again[0].spec, Some(KernelSpec::new(2, 4, 4)));
        assert!(again.iter().all(|s| !s.inferred));
    }

    #[test]
    fn missing_shapes_fail_when_required() {
        let (mut cx, _, _) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let err = mgr.discover(&mut cx, None, true).unwrap_err();
        assert!(matches!(err, CanvasError::ShapeInference { .. }));

        // Not required: sites come back without specs.
        let sites = mgr.discover(&mut cx, None, false).unwrap();
        assert_eq!(sites.len(), 2);
        assert!(sites.iter().all(|s| s.spec.is_none()));
    }

    #[test]
    fn substitute_requires_discovery() {
        let (mut cx, _, _) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let err = mgr.substitute(&mut cx, &scale_pack(2.0)).unwrap_err();
        assert!(matches!(err, CanvasError::NotInitialized { .. }));
    }

    #[test]
    fn substitute_rejects_empty_site_list() {
        let mut cx = Graph::new();
        cx.add_op(ReLU);
        let mut mgr = SubstitutionManager::new();
        mgr.discover(&mut cx, None, false).unwrap();
        let err = mgr.substitute(&mut cx, &scale_pack(2.0)).unwrap_err();
        assert!(matches!(err, CanvasError::NotInitialized { .. }));
    }

    #[test]
    fn substitute_is_keyed_to_the_discovered_graph() {
        let (mut cx, _, _) = two_site_graph();
        let (mut other, _, _) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let input = Tensor::zeros(Shape::new(1, 2, 4, 4));
        mgr.discover(&mut cx, Some(&input), true).unwrap();

        // Same topology, different graph instance: not initialized.
        let err = mgr.substitute(&mut other, &scale_pack(2.0)).unwrap_err();
        assert!(matches!(err, CanvasError::NotInitialized { .. }));
    }

    #[test]
    fn substitute_replaces_every_delegate_in_place() {
        let (mut cx, p1, p2) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        let input = Tensor::new(
            Shape::new(1, 1, 2, 2),
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        mgr.discover(&mut cx, Some(&input), true).unwrap();

        let nodes_before = cx.graph.node_count();
        let edges_before = cx.graph.edge_count();
        mgr.substitute(&mut cx, &scale_pack(10.0)).unwrap();

        // Topology untouched, both sites loaded, state advanced.
        assert_eq!(cx.graph.node_count(), nodes_before);
        assert_eq!(cx.graph.edge_count(), edges_before);
        assert_eq!(mgr.state(&cx), Some(SiteState::Substituted));
        for node in [p1, p2] {
            assert!(cx.try_get_op::<Placeholder>(node).unwrap().is_loaded());
        }

        // relu(x) -> x10 -> avgpool -> x10: mean(10,20,30,40) * 10 = 250.
        let out = cx.forward(&input).unwrap();
        assert_eq!(out.data, vec![250.0]);
    }

    #[test]
    fn forget_clears_the_cache() {
        let (mut cx, _, _) = two_site_graph();
        let mut mgr = SubstitutionManager::new();
        mgr.discover(&mut cx, None, false).unwrap();
        assert!(mgr.sites(&cx).is_some());
        mgr.forget(&cx);
        assert!(mgr.state(&cx).is_none());
        let err = mgr.substitute(&mut cx, &scale_pack(2.0)).unwrap_err();
        assert!(matches!(err, CanvasError::NotInitialized { .. }));
    }
}
