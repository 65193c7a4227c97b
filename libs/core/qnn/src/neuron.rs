use qgrad::{Graph, Node};
use rand::Rng;

use crate::{Error, Module};

// -----------------------------------------------------------------------------
// Neuron
// -----------------------------------------------------------------------------
/// `tanh(w . x + b)` over `d_in` inputs.
#[derive(Debug, Clone)]
pub struct Neuron {
    weights: Vec<Node>,
    bias: Node,
}

//
// ctor
//
impl Neuron {
    /// Weights are drawn uniformly from `[-1, 1)` and the bias starts at `0`.
    pub fn new<R: Rng>(graph: &Graph, d_in: usize, rng: &mut R) -> Self {
        let weights = (0..d_in)
            .map(|_| graph.variable(rng.gen_range(-1.0..1.0)))
            .collect();
        Self {
            weights,
            bias: graph.variable(0.0),
        }
    }
}

//
// methods
//
impl Neuron {
    #[inline]
    pub fn d_in(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn weights(&self) -> &[Node] {
        &self.weights
    }

    #[inline]
    pub fn bias(&self) -> &Node {
        &self.bias
    }

    pub fn forward(&self, x: &[Node]) -> Result<Node, Error> {
        if x.len() != self.d_in() {
            return Err(Error::InputSize {
                expected: self.d_in(),
                actual: x.len(),
            });
        }
        let mut acc = self.bias.clone();
        for (xi, wi) in x.iter().zip(&self.weights) {
            acc = acc.try_add(wi.try_mul(xi)?)?;
        }
        Ok(acc.tanh())
    }
}

impl Module for Neuron {
    fn parameters(&self) -> Vec<&Node> {
        self.weights.iter().chain(Some(&self.bias)).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Node> {
        self.weights
            .iter_mut()
            .chain(Some(&mut self.bias))
            .collect()
    }
}
