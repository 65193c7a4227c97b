use std::{cell::RefCell, rc::Rc};

use crate::{Error, Operand};

use super::{backward::_BackPropWorkSpace, tape::_Tape, Node};

// -----------------------------------------------------------------------------
// _Graph
// Graph
// -----------------------------------------------------------------------------
#[derive(Debug, Default)]
pub(super) struct _Graph {
    pub(super) tape: _Tape,
    pub(super) workspace: _BackPropWorkSpace,
}

/// Owner of a set of scalar nodes.
///
/// Cloning a graph shares it. Nodes can only be combined with nodes of the same graph.
#[derive(Debug)]
pub struct Graph(pub(super) Rc<RefCell<_Graph>>);

impl Clone for Graph {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

//
// ctor
//
impl Default for Graph {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    #[inline]
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(_Graph::default())))
    }
}

// methods
impl Graph {
    /// Create a leaf node.
    ///
    /// `requires_grad` is advisory: it tells readers the gradient of this leaf is meant
    /// to be consumed but does not change how gradients propagate.
    #[inline]
    pub fn leaf(&self, value: f64, requires_grad: bool) -> Node {
        let index = self
            .0
            .borrow_mut()
            .tape
            ._reg_node(value, Vec::new(), None, requires_grad);
        Node::_registered(self, index)
    }

    /// Create a leaf whose gradient is not meant to be consumed.
    #[inline]
    pub fn constant(&self, value: f64) -> Node {
        self.leaf(value, false)
    }

    /// Create a leaf whose gradient is meant to be consumed, e.g. a model parameter.
    #[inline]
    pub fn variable(&self, value: f64) -> Node {
        self.leaf(value, true)
    }

    /// Create a leaf from a number, a numeric text or the value of another node.
    ///
    /// A node input is copied into a new leaf, even when it belongs to another graph.
    #[inline]
    pub fn try_leaf(&self, input: impl Into<Operand>, requires_grad: bool) -> Result<Node, Error> {
        let value = input.into().value()?;
        Ok(self.leaf(value, requires_grad))
    }

    /// Turn an operand into a node of this graph.
    ///
    /// Nodes of this graph are returned as they are and
    /// numbers or numeric texts become new constant leaves.
    pub fn promote(&self, operand: impl Into<Operand>) -> Result<Node, Error> {
        let node = self._operand_node(operand.into())?;
        if !Graph::ptr_eq(self, &node.graph) {
            return Err(Error::DifferentGraphs("promotion"));
        }
        Ok(node)
    }

    /// Reset the gradient of every node alive in this graph.
    #[inline]
    pub fn zero_grad(&self) {
        for cell in self.0.borrow_mut().tape._live_cells_mut() {
            cell.grad = 0.0;
        }
    }

    /// Number of nodes still referenced by a handle or by another node.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.0.borrow().tape._num_live()
    }

    /// Check that two graphs are the same instance.
    ///
    /// Note that this comparison is not based on the contents of the graphs.
    #[inline]
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Rc::ptr_eq(&lhs.0, &rhs.0)
    }
}

// impls
impl Graph {
    #[inline]
    pub(super) fn _debug_ptr(&self) -> impl std::fmt::Debug {
        self.0.as_ptr()
    }

    /// Like [Graph::promote] but passes nodes of other graphs through.
    #[inline]
    pub(super) fn _operand_node(&self, operand: Operand) -> Result<Node, Error> {
        match operand {
            Operand::Node(node) => Ok(node),
            other => other.value().map(|value| self.constant(value)),
        }
    }
}
