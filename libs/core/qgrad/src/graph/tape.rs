use std::fmt::{Debug, Display};

use log::trace;

use super::{op::Op, Graph};

// -----------------------------------------------------------------------------
// _TapeCell
// -----------------------------------------------------------------------------
#[derive(Debug)]
pub(super) struct _TapeCell {
    pub(super) value: f64,
    pub(super) grad: f64,
    pub(super) operands: Vec<usize>,
    pub(super) op: Option<Op>,
    pub(super) requires_grad: bool,
    refcnt: usize,
}

// -----------------------------------------------------------------------------
// _Tape
// -----------------------------------------------------------------------------
/// Design note:
///
/// Nodes are shared: a value used in several expressions is an operand of
/// several parents and must live as long as the longest of them.
/// We store every node of a graph in one flat [`Vec`] and refer to operands
/// by index, so a node never owns its operands and cycles cannot be expressed.
///
/// Each cell counts its holders, that is external [Node] handles plus
/// the parents listing it as an operand.
/// When the count drops to zero the cell is released, its operands lose one holder
/// and the index is pushed to `vacancy` so that the next registration reuses it
/// in O(1) without shifting indices of live cells.
#[derive(Debug, Default)]
pub(super) struct _Tape {
    cells: Vec<_TapeCell>,
    vacancy: Vec<usize>,
    next_nodes: Vec<usize>,
}

impl _Tape {
    #[inline]
    pub(super) fn _len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub(super) fn _cell(&self, idx: usize) -> &_TapeCell {
        self.cells.get(idx).expect("Tape must manage this node")
    }

    #[inline]
    pub(super) fn _cell_mut(&mut self, idx: usize) -> &mut _TapeCell {
        self.cells.get_mut(idx).expect("Tape must manage this node")
    }

    #[inline]
    pub(super) fn _live_cells_mut(&mut self) -> impl Iterator<Item = &mut _TapeCell> {
        self.cells.iter_mut().filter(|cell| 0 < cell.refcnt)
    }

    #[inline]
    pub(super) fn _num_live(&self) -> usize {
        self.cells.iter().filter(|cell| 0 < cell.refcnt).count()
    }

    /// Register a node holding one reference for the caller.
    pub(super) fn _reg_node(
        &mut self,
        value: f64,
        operands: Vec<usize>,
        op: Option<Op>,
        requires_grad: bool,
    ) -> usize {
        for &idx in &operands {
            self._incl_refcnt(idx);
        }
        let cell = _TapeCell {
            value,
            grad: 0.0,
            operands,
            op,
            requires_grad,
            refcnt: 1,
        };
        if let Some(idx) = self.vacancy.pop() {
            *self._cell_mut(idx) = cell;
            idx
        } else {
            self.cells.push(cell);
            self.cells.len() - 1
        }
    }

    #[inline]
    pub(super) fn _incl_refcnt(&mut self, idx: usize) {
        self._cell_mut(idx).refcnt += 1;
    }

    /// Drop one reference to the cell and release everything that becomes unreachable.
    ///
    /// Local operations of released cells are handed back to the caller
    /// because custom gradient closures may hold node handles,
    /// which must not be dropped while the tape is borrowed.
    #[must_use]
    pub(super) fn _decl_refcnt(&mut self, idx: usize) -> Vec<Op> {
        let mut released = Vec::new();

        // iterative rather than recursive so that long chains do not overflow the stack
        let stack = &mut self.next_nodes;
        stack.clear();
        stack.push(idx);

        while let Some(idx) = stack.pop() {
            let Some(cell) = self.cells.get_mut(idx) else {
                continue;
            };
            if cell.refcnt == 0 {
                continue;
            }
            cell.refcnt -= 1;
            if cell.refcnt != 0 {
                continue;
            }

            trace!("release cell {idx}");
            stack.append(&mut cell.operands);
            released.extend(cell.op.take());
            self.vacancy.push(idx);
        }
        released
    }

    /// Register the result of a unary operation on `arg`.
    #[inline]
    pub(super) fn _make_unary<F>(&mut self, arg: usize, f: F) -> usize
    where
        F: FnOnce(f64) -> (f64, Op),
    {
        let cell = self._cell(arg);
        let requires_grad = cell.requires_grad;
        let (value, op) = f(cell.value);
        self._reg_node(value, vec![arg], Some(op), requires_grad)
    }

    /// Register the result of a binary operation, keeping `lhs` before `rhs`.
    #[inline]
    pub(super) fn _make_binary<F>(&mut self, lhs: usize, rhs: usize, f: F) -> usize
    where
        F: FnOnce(f64, f64) -> (f64, Op),
    {
        let lhs_cell = self._cell(lhs);
        let rhs_cell = self._cell(rhs);
        let requires_grad = lhs_cell.requires_grad || rhs_cell.requires_grad;
        let (value, op) = f(lhs_cell.value, rhs_cell.value);
        self._reg_node(value, vec![lhs, rhs], Some(op), requires_grad)
    }

    #[inline]
    pub(super) fn _make_nary(&mut self, operands: Vec<usize>, value: f64, op: Op) -> usize {
        let requires_grad = operands.iter().any(|&idx| self._cell(idx).requires_grad);
        self._reg_node(value, operands, Some(op), requires_grad)
    }
}

// -----------------------------------------------------------------------------
// Node
// -----------------------------------------------------------------------------
/// Handle to a scalar vertex of a [Graph].
///
/// Cloning a handle does not copy the vertex, both handles refer to the same node.
/// Arithmetic on nodes builds new vertices eagerly, see the operator impls.
pub struct Node {
    pub(super) graph: Graph,
    pub(super) index: usize,
}

impl Clone for Node {
    #[inline]
    fn clone(&self) -> Self {
        Self::_share(&self.graph, self.index)
    }
}

impl Drop for Node {
    #[inline]
    fn drop(&mut self) {
        let released = self.graph.0.borrow_mut().tape._decl_refcnt(self.index);
        drop(released);
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let internal = self.graph.0.borrow();
        let cell = internal.tape._cell(self.index);
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("value", &cell.value)
            .field("grad", &cell.grad)
            .field("op", &cell.op)
            .finish()
    }
}

impl Display for Node {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

//
// ctor
//
impl Node {
    /// Wrap a cell whose initial reference was already counted for this handle.
    #[inline]
    pub(super) fn _registered(graph: &Graph, index: usize) -> Self {
        Self {
            graph: graph.clone(),
            index,
        }
    }

    /// Create one more handle to an existing cell.
    #[inline]
    pub(super) fn _share(graph: &Graph, index: usize) -> Self {
        graph.0.borrow_mut().tape._incl_refcnt(index);
        Self::_registered(graph, index)
    }
}

//
// methods
//
impl Node {
    /// Forward value of the node.
    #[inline]
    pub fn value(&self) -> f64 {
        self._read(|cell| cell.value)
    }

    /// Gradient accumulated on this node by the backward passes run so far.
    #[inline]
    pub fn grad(&self) -> f64 {
        self._read(|cell| cell.grad)
    }

    /// Reset the gradient accumulator of this node only.
    #[inline]
    pub fn zero_grad(&self) {
        self.graph.0.borrow_mut().tape._cell_mut(self.index).grad = 0.0;
    }

    #[inline]
    pub fn requires_grad(&self) -> bool {
        self._read(|cell| cell.requires_grad)
    }

    /// Leaves have neither operands nor a local operation.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self._read(|cell| cell.op.is_none())
    }

    /// Handles to the operands, in the order they were given to the operator.
    pub fn operands(&self) -> Vec<Node> {
        let operands = self._read(|cell| cell.operands.clone());
        operands
            .into_iter()
            .map(|idx| Node::_share(&self.graph, idx))
            .collect()
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// New leaf on the same graph holding the current value of this node.
    #[inline]
    pub fn detach(&self) -> Node {
        self.graph.constant(self.value())
    }

    /// Check that two handles refer to the same vertex.
    ///
    /// Two vertices built from identical inputs are still different vertices.
    #[inline]
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Graph::ptr_eq(&lhs.graph, &rhs.graph) && lhs.index == rhs.index
    }
}

// impls
impl Node {
    #[inline]
    pub(super) fn _read<R>(&self, f: impl FnOnce(&_TapeCell) -> R) -> R {
        f(self.graph.0.borrow().tape._cell(self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refcnt(graph: &Graph, idx: usize) -> usize {
        graph.0.borrow().tape.cells[idx].refcnt
    }

    //
    // memory management is critical for the correctness of gradients,
    // so private bookkeeping is tested here directly.
    //
    #[test]
    fn test_refcnt_leaf() {
        let graph = Graph::new();

        {
            let x1 = graph.variable(4.2);
            let x2 = graph.variable(4.3);
            let x3 = x1.clone();

            assert_eq!(graph.0.borrow().tape.cells.len(), 2);
            assert_eq!(refcnt(&graph, 0), 2);
            assert_eq!(refcnt(&graph, 1), 1);
            assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
            let _ = (x2, x3);
        }

        assert_eq!(graph.0.borrow().tape.cells.len(), 2);
        assert_eq!(refcnt(&graph, 0), 0);
        assert_eq!(refcnt(&graph, 1), 0);
        assert_eq!(graph.0.borrow().tape.vacancy, vec![1, 0]);
    }

    #[test]
    fn test_refcnt_unary() {
        let graph = Graph::new();

        let x1 = graph.variable(4.2);
        {
            let x2 = -&x1;
            let x3 = x2.clone();
            let x4 = x2.clone();
            assert_eq!(graph.0.borrow().tape.cells.len(), 2);
            assert_eq!(refcnt(&graph, 0), 2);
            assert_eq!(refcnt(&graph, 1), 3);
            assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
            let _ = (x3, x4);
        }

        assert_eq!(graph.0.borrow().tape.cells.len(), 2);
        assert_eq!(refcnt(&graph, 0), 1);
        assert_eq!(refcnt(&graph, 1), 0);
        assert_eq!(graph.0.borrow().tape.vacancy, vec![1]);
    }

    #[test]
    fn test_refcnt_binary_shared_operand() {
        let graph = Graph::new();

        let x = graph.variable(3.0);
        let y = &x + &x;

        assert_eq!(refcnt(&graph, 0), 3);
        assert_eq!(refcnt(&graph, 1), 1);
        assert_eq!(graph.0.borrow().tape._cell(1).operands, vec![0, 0]);

        drop(y);

        assert_eq!(refcnt(&graph, 0), 1);
        assert_eq!(refcnt(&graph, 1), 0);
    }

    #[test]
    fn test_operand_outlives_handle() {
        let graph = Graph::new();

        let y = {
            let x = graph.variable(2.0);
            x.exp()
        };

        // the leaf is kept alive by its consumer
        assert_eq!(refcnt(&graph, 0), 1);
        assert_eq!(y.operands()[0].value(), 2.0);
        assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
    }

    #[test]
    fn test_refcnt_recursive_decl() {
        let graph = Graph::new();

        let x = graph.variable(1.0);
        {
            let y = x.exp();
            let z = y.log();
            let _w = -&z;
        }

        assert_eq!(refcnt(&graph, 0), 1);
        assert_eq!(refcnt(&graph, 1), 0);
        assert_eq!(refcnt(&graph, 2), 0);
        assert_eq!(refcnt(&graph, 3), 0);
        assert_eq!(graph.0.borrow().tape.vacancy.len(), 3);
        assert_eq!(graph.num_nodes(), 1);
    }

    #[test]
    fn test_reuse_vacant_cell() {
        let graph = Graph::new();

        let x = graph.variable(1.0);
        drop(x.exp());
        let y = x.tanh();

        assert_eq!(graph.0.borrow().tape.cells.len(), 2);
        assert_eq!(y.index, 1);
        assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
        assert_eq!(y.grad(), 0.0);
        assert_eq!(y.operands().len(), 1);
    }

    #[test]
    fn test_long_chain_release() {
        let graph = Graph::new();
        let x = graph.variable(0.0);

        let mut y = x.clone();
        for _ in 0..10_000 {
            y = &y + 1.0;
        }
        assert_eq!(y.value(), 10_000.0);
        drop(y);

        assert_eq!(graph.num_nodes(), 1);
    }

    #[test]
    fn test_release_custom_op_holding_node() {
        let graph = Graph::new();
        let x = graph.variable(2.0);
        let captured = x.clone();

        let y = graph
            .custom("keep", &[&x], 2.0, Box::new(move |g| vec![g * captured.value()]))
            .unwrap();
        y.backward().unwrap();
        drop(y);

        assert_eq!(x.grad(), 2.0);
        assert_eq!(refcnt(&graph, 0), 1);
    }

    #[test]
    fn test_detach() {
        let graph = Graph::new();
        let x = graph.variable(2.0);
        let y = x.exp();

        let d = y.detach();
        let z = &d * &x;
        z.backward().unwrap();

        assert_eq!(d.value(), y.value());
        assert!(d.is_leaf());
        assert!(!d.requires_grad());
        assert_eq!(x.grad(), y.value());
        assert_eq!(y.grad(), 0.0);
    }

    #[test]
    fn test_ptr_eq() {
        let graph = Graph::new();
        let x = graph.variable(1.0);
        let y = graph.variable(1.0);

        assert!(Node::ptr_eq(&x, &x.clone()));
        assert!(!Node::ptr_eq(&x, &y));
    }

    #[test]
    fn test_not_thread_safe() {
        static_assertions::assert_not_impl_any!(Node: Send, Sync);
        static_assertions::assert_not_impl_any!(Graph: Send, Sync);
    }
}
