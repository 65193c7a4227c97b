use log::trace;

use crate::{Error, Module, SgdConfig, WeightDecay};

// -----------------------------------------------------------------------------
// Sgd
// -----------------------------------------------------------------------------
/// Plain stochastic gradient descent with optional weight decay.
#[derive(Debug, Clone, PartialEq)]
pub struct Sgd {
    config: SgdConfig,
}

impl Sgd {
    pub fn new(config: SgdConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    /// Move every parameter of `module` against its gradient.
    ///
    /// Each parameter handle is replaced by a new leaf holding the updated value.
    /// The new leaves start with a zero gradient and keep the `requires_grad` flag.
    pub fn step<M: Module + ?Sized>(&self, module: &mut M) {
        let SgdConfig {
            lr,
            weight_decay,
            decay,
        } = self.config;
        for param in module.parameters_mut() {
            let w = param.value();
            let mut updated = w - lr * param.grad();
            if let Some(wd) = weight_decay {
                updated -= match decay {
                    WeightDecay::L2 => wd * 2.0 * w,
                    WeightDecay::L1 => wd * _sign(w),
                };
            }
            trace!("sgd step: {w} -> {updated}");
            *param = param.graph().leaf(updated, param.requires_grad());
        }
    }

    #[inline]
    pub fn zero_grad<M: Module + ?Sized>(&self, module: &M) {
        module.zero_grad();
    }
}

#[inline]
fn _sign(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v.signum()
    }
}
