use log::debug;

use crate::Error;

use super::{sort::_sort_into, tape::_Tape, Node};

// -----------------------------------------------------------------------------
// _BackPropWorkSpace
// -----------------------------------------------------------------------------
/// Buffers reused across backward passes of one graph.
#[derive(Debug, Default)]
pub(super) struct _BackPropWorkSpace {
    order: Vec<usize>,
    grads_memo: Vec<f64>,
    local: Vec<f64>,
}

impl _BackPropWorkSpace {
    /// Compute the contribution of this pass to every cell reachable from `root`.
    ///
    /// Nothing on the tape is written, so a failing pass leaves gradients as they were.
    pub(super) fn _back_prop(&mut self, tape: &_Tape, root: usize) -> Result<(), Error> {
        _sort_into(tape, root, &mut self.order);

        self.grads_memo.clear();
        self.grads_memo.resize(tape._len(), 0.0);
        self.grads_memo[root] = 1.0;

        for &idx in &self.order {
            let cell = tape._cell(idx);
            let Some(op) = cell.op.as_ref() else {
                continue;
            };
            op._local_grads(self.grads_memo[idx], &mut self.local);
            if self.local.len() != cell.operands.len() {
                return Err(Error::ArityMismatch {
                    op: op._label(),
                    expected: cell.operands.len(),
                    actual: self.local.len(),
                });
            }
            for (&operand, &grad) in cell.operands.iter().zip(&self.local) {
                self.grads_memo[operand] += grad;
            }
        }
        Ok(())
    }

    /// Write the result of the last pass into the tape.
    ///
    /// The root is seeded with `1.0`, every other visited cell accumulates.
    pub(super) fn _accumulate(&self, tape: &mut _Tape, root: usize) {
        for &idx in &self.order {
            let cell = tape._cell_mut(idx);
            if idx == root {
                cell.grad = 1.0;
            } else {
                cell.grad += self.grads_memo[idx];
            }
        }
    }

    #[inline]
    pub(super) fn _num_visited(&self) -> usize {
        self.order.len()
    }
}

// -----------------------------------------------------------------------------
// backward
// -----------------------------------------------------------------------------
impl Node {
    /// Propagate gradients from this node to every node it depends on.
    ///
    /// This node's gradient is set to `1.0` and the gradient of every node reachable
    /// from it is increased by the partial derivative of this node's value with
    /// respect to it, summed over all paths.
    /// Gradients are not reset, so running the pass twice doubles them.
    ///
    /// # Errors
    /// [Error::ArityMismatch] if a custom operation returns a wrong number of gradients.
    /// No gradient is modified in that case.
    pub fn backward(&self) -> Result<(), Error> {
        let mut ws = std::mem::take(&mut self.graph.0.borrow_mut().workspace);

        // shared borrow only: custom gradients may read node values
        let res = ws._back_prop(&self.graph.0.borrow().tape, self.index);
        if res.is_ok() {
            ws._accumulate(&mut self.graph.0.borrow_mut().tape, self.index);
            debug!(
                "backward from node {}: {} nodes visited",
                self.index,
                ws._num_visited()
            );
        }

        self.graph.0.borrow_mut().workspace = ws;
        res
    }
}
