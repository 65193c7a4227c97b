use qgrad::Node;

// -----------------------------------------------------------------------------
// Module
// -----------------------------------------------------------------------------
/// Trainable building block owning its parameter nodes.
pub trait Module {
    /// Parameter handles in a stable order.
    fn parameters(&self) -> Vec<&Node>;

    /// Mutable parameter handles, in the same order as [Module::parameters].
    ///
    /// Optimizers replace the handles in place because node values are immutable.
    fn parameters_mut(&mut self) -> Vec<&mut Node>;

    #[inline]
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }

    #[inline]
    fn num_parameters(&self) -> usize {
        self.parameters().len()
    }
}
