use qgrad::{Graph, Node};
use rand::Rng;

use crate::{Error, Module, Neuron};

// -----------------------------------------------------------------------------
// Layer
// -----------------------------------------------------------------------------
/// `d_out` independent neurons reading the same `d_in` inputs.
#[derive(Debug, Clone)]
pub struct Layer {
    d_in: usize,
    neurons: Vec<Neuron>,
}

impl Layer {
    pub fn new<R: Rng>(graph: &Graph, d_in: usize, d_out: usize, rng: &mut R) -> Self {
        let neurons = (0..d_out).map(|_| Neuron::new(graph, d_in, rng)).collect();
        Self { d_in, neurons }
    }

    #[inline]
    pub fn d_in(&self) -> usize {
        self.d_in
    }

    #[inline]
    pub fn d_out(&self) -> usize {
        self.neurons.len()
    }

    #[inline]
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn forward(&self, x: &[Node]) -> Result<Vec<Node>, Error> {
        if x.len() != self.d_in {
            return Err(Error::InputSize {
                expected: self.d_in,
                actual: x.len(),
            });
        }
        self.neurons.iter().map(|n| n.forward(x)).collect()
    }
}

impl Module for Layer {
    fn parameters(&self) -> Vec<&Node> {
        self.neurons.iter().flat_map(Neuron::parameters).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Node> {
        self.neurons
            .iter_mut()
            .flat_map(Neuron::parameters_mut)
            .collect()
    }
}
