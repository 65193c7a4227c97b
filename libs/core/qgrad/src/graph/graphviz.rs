use std::collections::BTreeMap;

use super::{sort::_sort_into, Node};

// -----------------------------------------------------------------------------
// _GraphvizNode
// -----------------------------------------------------------------------------
#[derive(Debug, Clone)]
enum _GraphvizNode {
    Const { value: f64 },
    Var { value: f64, grad: f64 },
    Node { op: String, value: f64, grad: f64 },
}

// -----------------------------------------------------------------------------
// GraphvizBuilder
// -----------------------------------------------------------------------------
/// DOT dump of the nodes reachable from a root.
///
/// Values and gradients are captured when the builder is created,
/// so later backward passes do not change the output.
pub struct GraphvizBuilder<ValFmt> {
    nodes: Vec<_GraphvizNode>,
    edges: Vec<(usize, usize, Option<String>)>,
    name: String,
    graph_global_settings: BTreeMap<String, String>,
    node_global_settings: BTreeMap<String, String>,
    value_fmt: ValFmt,
}

impl GraphvizBuilder<()> {
    #[inline]
    pub fn with_value_formatter<VF>(self, val_fmt: VF) -> GraphvizBuilder<VF>
    where
        VF: Fn(f64) -> String,
    {
        GraphvizBuilder {
            nodes: self.nodes,
            edges: self.edges,
            name: self.name,
            graph_global_settings: self.graph_global_settings,
            node_global_settings: self.node_global_settings,
            value_fmt: val_fmt,
        }
    }
}

impl<ValFmt> GraphvizBuilder<ValFmt> {
    /// Set the name of the graph.
    #[inline]
    pub fn with_name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    /// Set a global setting for the graph.
    #[inline]
    pub fn with_graph_setting(&mut self, key: &str, value: &str) -> &mut Self {
        self.graph_global_settings
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Set a global setting for the node.
    #[inline]
    pub fn with_node_setting(&mut self, key: &str, value: &str) -> &mut Self {
        self.node_global_settings
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Generate a dot file.
    pub fn gen_dot(&self) -> String
    where
        ValFmt: Fn(f64) -> String,
    {
        let mut buf = String::new();

        buf += &format!("digraph {} {{\n", self.name);

        buf += "  graph [\n";
        for (key, value) in &self.graph_global_settings {
            buf.push_str(&format!("    {}={};\n", key, value));
        }
        buf += "  ];\n\n";

        buf += "  node [\n";
        for (key, value) in &self.node_global_settings {
            buf.push_str(&format!("    {}={};\n", key, value));
        }
        buf += "  ];\n\n";

        buf += "  // nodes\n";
        for (idx, node) in self.nodes.iter().enumerate() {
            let annotations = match node {
                _GraphvizNode::Const { value } => format!(
                    "label=\"{{value={}}}\", shape=record",
                    (self.value_fmt)(*value)
                ),
                _GraphvizNode::Var { value, grad } => format!(
                    "label=\"{{value={value}|grad={grad}}}\", shape=record, style=\"diagonals\"",
                    value = (self.value_fmt)(*value),
                    grad = (self.value_fmt)(*grad),
                ),
                _GraphvizNode::Node { op, value, grad } => format!(
                    "label=\"{op}|{{value={value}|grad={grad}}}\", shape=record",
                    value = (self.value_fmt)(*value),
                    grad = (self.value_fmt)(*grad),
                ),
            };
            buf.push_str(&format!("  {idx} [{annotations}];\n"));
        }
        buf += "\n";

        buf += "  // edges\n";
        for (src, dst, label) in &self.edges {
            let edge = match label {
                Some(label) => format!("  {src} -> {dst} [label=\"{label}\"];\n"),
                None => format!("  {src} -> {dst};\n"),
            };
            buf.push_str(&edge);
        }

        buf.push_str("}\n");
        buf
    }
}

impl Node {
    /// Snapshot the subgraph reachable from this node for rendering with Graphviz.
    ///
    /// Nodes are numbered in topological order, so the root is `0`.
    /// Edges go from an operand to its consumer and are labelled `L`/`R` for binary operations.
    pub fn graphviz(&self) -> GraphvizBuilder<()> {
        let internal = self.graph.0.borrow();
        let tape = &internal.tape;

        let mut order = Vec::new();
        _sort_into(tape, self.index, &mut order);
        let cell2node: BTreeMap<usize, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (idx, pos))
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        let mut edges = Vec::new();
        for (pos, &idx) in order.iter().enumerate() {
            let cell = tape._cell(idx);
            nodes.push(match (&cell.op, cell.requires_grad) {
                (Some(op), _) => _GraphvizNode::Node {
                    op: op._label(),
                    value: cell.value,
                    grad: cell.grad,
                },
                (None, true) => _GraphvizNode::Var {
                    value: cell.value,
                    grad: cell.grad,
                },
                (None, false) => _GraphvizNode::Const { value: cell.value },
            });

            let arity = cell.operands.len();
            for (k, operand) in cell.operands.iter().enumerate() {
                let label = match (arity, k) {
                    (1, _) => None,
                    (2, 0) => Some("L".to_string()),
                    (2, _) => Some("R".to_string()),
                    _ => Some(k.to_string()),
                };
                edges.push((cell2node[operand], pos, label));
            }
        }
        edges.sort();

        GraphvizBuilder {
            nodes,
            edges,
            name: "GradientGraph".to_string(),
            graph_global_settings: Default::default(),
            node_global_settings: Default::default(),
            value_fmt: (),
        }
    }
}
