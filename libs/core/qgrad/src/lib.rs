mod error;
mod graph;
mod operand;

pub use error::Error;
pub use graph::{topological_order, GradFn, Graph, GraphvizBuilder, Node};
pub use operand::Operand;
