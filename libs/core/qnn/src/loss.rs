use qgrad::Node;

use crate::Error;

/// Mean binary cross entropy of `predictions` read as probabilities against `targets`.
///
/// Each term is [Node::binary_cross_entropy], the targets are constants.
pub fn binary_cross_entropy(predictions: &[Node], targets: &[f64]) -> Result<Node, Error> {
    if predictions.len() != targets.len() {
        return Err(Error::InputSize {
            expected: targets.len(),
            actual: predictions.len(),
        });
    }
    let mut terms = predictions
        .iter()
        .zip(targets)
        .map(|(q, &p)| q.binary_cross_entropy(p));
    let Some(mut acc) = terms.next() else {
        return Err(Error::EmptyBatch);
    };
    for term in terms {
        acc = acc.try_add(term)?;
    }
    Ok(acc.try_div(predictions.len() as f64)?)
}
