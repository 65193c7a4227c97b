mod config;
mod error;
mod layer;
mod loss;
mod mlp;
mod module;
mod neuron;
mod optim;

pub use config::{MlpConfig, SgdConfig, WeightDecay};
pub use error::Error;
pub use layer::Layer;
pub use loss::binary_cross_entropy;
pub use mlp::Mlp;
pub use module::Module;
pub use neuron::Neuron;
pub use optim::Sgd;
