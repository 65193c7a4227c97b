use super::{tape::_Tape, Node};

/// Write every cell reachable from `root` into `order`, consumers before their operands.
///
/// Depth first with an explicit stack. A cell is emitted once all of its operands
/// have been emitted, and the post-order is reversed at the end.
/// The visited marks live in this call only.
pub(super) fn _sort_into(tape: &_Tape, root: usize, order: &mut Vec<usize>) {
    order.clear();

    let mut visited = vec![false; tape._len()];
    // (cell, operands already pushed)
    let mut stack = vec![(root, false)];
    while let Some((idx, expanded)) = stack.pop() {
        if expanded {
            order.push(idx);
            continue;
        }
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        stack.push((idx, true));
        for &operand in tape._cell(idx).operands.iter().rev() {
            if !visited[operand] {
                stack.push((operand, false));
            }
        }
    }
    order.reverse();
}

/// Nodes reachable from `root`, ordered so that every node comes before its operands.
///
/// `root` is always first. Running the sort again, or on a graph sharing nodes
/// with one sorted before, yields the same kind of order.
pub fn topological_order(root: &Node) -> Vec<Node> {
    let mut order = Vec::new();
    {
        let internal = root.graph.0.borrow();
        _sort_into(&internal.tape, root.index, &mut order);
    }
    order
        .into_iter()
        .map(|idx| Node::_share(&root.graph, idx))
        .collect()
}
