use crate::Error;

// -----------------------------------------------------------------------------
// MlpConfig
// -----------------------------------------------------------------------------
/// Shape of a multi-layer perceptron.
///
/// Layers map `d_in -> hidden[0] -> ... -> hidden[n-1] -> d_out`.
/// Without hidden layers the network is a single layer `d_in -> d_out`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct MlpConfig {
    pub d_in: usize,
    #[serde(default)]
    pub hidden: Vec<usize>,
    pub d_out: usize,
    /// Seed of the weight initialization. Fresh entropy is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl MlpConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.d_in == 0 || self.d_out == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer sizes must be positive: d_in={}, d_out={}",
                self.d_in, self.d_out
            )));
        }
        if let Some(pos) = self.hidden.iter().position(|&d| d == 0) {
            return Err(Error::InvalidConfig(format!(
                "hidden layer {pos} has no neuron"
            )));
        }
        Ok(())
    }

    /// `(d_in, d_out)` of each layer.
    pub(crate) fn layer_shapes(&self) -> Vec<(usize, usize)> {
        let dims: Vec<_> = std::iter::once(self.d_in)
            .chain(self.hidden.iter().copied())
            .chain(std::iter::once(self.d_out))
            .collect();
        dims.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

// -----------------------------------------------------------------------------
// WeightDecay
// SgdConfig
// -----------------------------------------------------------------------------
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    schemars::JsonSchema,
)]
pub enum WeightDecay {
    /// Shrink by `weight_decay * sign(w)`.
    L1,
    /// Shrink by `weight_decay * 2w`.
    #[default]
    L2,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct SgdConfig {
    #[serde(default = "SgdConfig::default_lr")]
    pub lr: f64,
    #[serde(default)]
    pub weight_decay: Option<f64>,
    #[serde(default)]
    pub decay: WeightDecay,
}

impl Default for SgdConfig {
    #[inline]
    fn default() -> Self {
        Self {
            lr: Self::default_lr(),
            weight_decay: None,
            decay: WeightDecay::default(),
        }
    }
}

impl SgdConfig {
    #[inline]
    fn default_lr() -> f64 {
        1e-3
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.lr.is_finite() && 0.0 < self.lr) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive and finite: {}",
                self.lr
            )));
        }
        match self.weight_decay {
            Some(wd) if !(wd.is_finite() && 0.0 <= wd) => Err(Error::InvalidConfig(format!(
                "weight decay must be non-negative and finite: {wd}"
            ))),
            _ => Ok(()),
        }
    }
}
