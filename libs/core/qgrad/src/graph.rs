mod backward;
mod builder;
mod graph_impl;
mod graphviz;
mod op;
mod sort;
mod tape;

pub use graph_impl::Graph;
pub use graphviz::GraphvizBuilder;
pub use op::GradFn;
pub use sort::topological_order;
pub use tape::Node;
