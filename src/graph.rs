//! Operator graphs with stable identity and topological forward evaluation.

use std::sync::atomic::{AtomicU64, Ordering};

use as_any::AsAny;
use itertools::Itertools;
use petgraph::algo::toposort;
use petgraph::prelude::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;

use crate::op::{InputTensor, Operator};
use crate::tensor::Tensor;
use crate::{bail, Result};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a [`Graph`].
///
/// Cached placeholder sites are keyed by this, so a site list can never be
/// applied to a different graph that happens to share the same topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

/// A network as a graph of boxed operators.
///
/// Edges carry the input slot they feed, so multi-input operators see their
/// inputs in a defined order. Nodes with no inbound edges receive the graph
/// input; the output is the final node in topological order.
#[derive(Debug)]
pub struct Graph {
    pub graph: StableGraph<Box<dyn Operator>, u8>,
    id: GraphId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::default(),
            id: GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Add an operator node.
    pub fn add_op(&mut self, op: impl Operator + 'static) -> NodeIndex {
        self.graph.add_node(Box::new(op))
    }

    /// Feed `from`'s output into input slot `slot` of `to`.
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex, slot: u8) {
        self.graph.add_edge(from, to, slot);
    }

    /// Downcast the operator at `node`, if it is a `T`.
    pub fn try_get_op<T: Operator>(&self, node: NodeIndex) -> Option<&T> {
        self.graph
            .node_weight(node)
            .and_then(|op| (**op).as_any().downcast_ref())
    }

    /// Mutable variant of [`try_get_op`](Graph::try_get_op).
    pub fn try_get_op_mut<T: Operator>(&mut self, node: NodeIndex) -> Option<&mut T> {
        self.graph
            .node_weight_mut(node)
            .and_then(|op| (**op).as_any_mut().downcast_mut())
    }

    /// Nodes in topological order.
    ///
    /// `StableGraph` preserves indices across unrelated mutations, so the
    /// order is stable across repeated calls on an unchanged graph.
    pub fn topo_order(&self) -> Result<Vec<NodeIndex>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order),
            Err(_) => bail!("graph contains a cycle"),
        }
    }

    /// Drive one forward evaluation and return the output tensor.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let order = self.topo_order()?;
        if order.is_empty() {
            bail!("cannot evaluate an empty graph");
        }
        let mut memo: FxHashMap<NodeIndex, Tensor> = FxHashMap::default();
        let mut last = order[0];
        for node in order {
            let mut feeds = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| (*e.weight(), e.source()))
                .collect_vec();
            feeds.sort_by_key(|(slot, _)| *slot);

            let mut inputs = Vec::with_capacity(feeds.len().max(1));
            if feeds.is_empty() {
                inputs.push(InputTensor::Borrowed(input));
            } else {
                for (_, src) in &feeds {
                    let t = memo.get(src).ok_or_else(|| {
                        crate::CanvasError::Msg(format!(
                            "upstream output missing for node {}",
                            src.index()
                        ))
                    })?;
                    inputs.push(InputTensor::Borrowed(t));
                }
            }

            let op = self.graph.node_weight_mut(node).ok_or_else(|| {
                crate::CanvasError::Msg(format!("node {} missing from graph", node.index()))
            })?;
            let out = op.process(inputs)?;
            memo.insert(node, out);
            last = node;
        }
        memo.remove(&last)
            .ok_or_else(|| crate::CanvasError::Msg("graph produced no output".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{AvgPool2d, ReLU};
    use crate::tensor::{Shape, Tensor};

    #[test]
    fn forward_evaluates_a_chain() {
        let mut cx = Graph::new();
        let relu = cx.add_op(ReLU);
        let pool = cx.add_op(AvgPool2d::new(2));
        cx.connect(relu, pool, 0);

        let input =
            Tensor::new(Shape::new(1, 1, 2, 2), vec![-4.0, 4.0, -4.0, 8.0]).unwrap();
        let out = cx.forward(&input).unwrap();
        assert_eq!(out.shape, Shape::new(1, 1, 1, 1));
        assert_eq!(out.data, vec![3.0]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut cx = Graph::new();
        let a = cx.add_op(ReLU);
        let b = cx.add_op(ReLU);
        cx.connect(a, b, 0);
        cx.connect(b, a, 0);
        let err = cx.forward(&Tensor::zeros(Shape::new(1, 1, 1, 1))).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn empty_graph_is_an_error() {
        let mut cx = Graph::new();
        let err = cx.forward(&Tensor::zeros(Shape::new(1, 1, 1, 1))).unwrap_err();
        assert!(err.to_string().contains("empty graph"));
    }

    #[test]
    fn graph_ids_are_unique() {
        assert_ne!(Graph::new().id(), Graph::new().id());
    }
}
