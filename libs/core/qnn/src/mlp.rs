use log::debug;
use qgrad::{Graph, Node, Operand};
use rand::{rngs::StdRng, SeedableRng};

use crate::{Error, Layer, MlpConfig, Module};

// -----------------------------------------------------------------------------
// Mlp
// -----------------------------------------------------------------------------
/// Stack of fully connected tanh layers.
#[derive(Debug, Clone)]
pub struct Mlp {
    graph: Graph,
    layers: Vec<Layer>,
}

//
// ctor
//
impl Mlp {
    pub fn new(graph: &Graph, config: &MlpConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let layers: Vec<_> = config
            .layer_shapes()
            .into_iter()
            .map(|(d_in, d_out)| Layer::new(graph, d_in, d_out, &mut rng))
            .collect();

        let mlp = Self {
            graph: graph.clone(),
            layers,
        };
        debug!(
            "mlp with {} layers and {} parameters",
            mlp.layers.len(),
            mlp.num_parameters()
        );
        Ok(mlp)
    }
}

//
// methods
//
impl Mlp {
    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn d_in(&self) -> usize {
        self.layers.first().map_or(0, Layer::d_in)
    }

    #[inline]
    pub fn d_out(&self) -> usize {
        self.layers.last().map_or(0, Layer::d_out)
    }

    pub fn forward(&self, x: &[Node]) -> Result<Vec<Node>, Error> {
        if x.len() != self.d_in() {
            return Err(Error::InputSize {
                expected: self.d_in(),
                actual: x.len(),
            });
        }
        let mut out = x.to_vec();
        for layer in &self.layers {
            out = layer.forward(&out)?;
        }
        Ok(out)
    }

    /// Like [Mlp::forward] but accepts raw numbers, numeric texts or nodes.
    pub fn predict<I>(&self, x: I) -> Result<Vec<Node>, Error>
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        let x = x
            .into_iter()
            .map(|v| self.graph.promote(v))
            .collect::<Result<Vec<_>, _>>()?;
        self.forward(&x)
    }
}

impl Module for Mlp {
    fn parameters(&self) -> Vec<&Node> {
        self.layers.iter().flat_map(Layer::parameters).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Node> {
        self.layers
            .iter_mut()
            .flat_map(Layer::parameters_mut)
            .collect()
    }
}
