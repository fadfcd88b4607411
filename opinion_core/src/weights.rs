//! Influence and edge weights.
//!
//! Two matrices come out of opinion distance:
//! - the **influence matrix** W, which drives propagation;
//! - the **edge weights**, which are purely observable and never feed back.

use nalgebra::DMatrix;

use crate::similarity::opinion_distance;

/// Influence matrix W = S⊙A + I − diag(rowsum(S⊙A)).
///
/// Similarity only flows along edges; whatever mass a row does not hand to
/// neighbors stays on the diagonal. W is row-stochastic and an agent without
/// edges gets the identity row.
pub fn influence_matrix(similarity: &DMatrix<f64>, adjacency: &DMatrix<u8>) -> DMatrix<f64> {
    let n = similarity.nrows();
    let masked = similarity.component_mul(&adjacency.map(f64::from));

    let mut w = masked.clone();
    for i in 0..n {
        let outgoing = masked.row(i).sum();
        w[(i, i)] += 1.0 - outgoing;
    }
    w
}

/// Edge weight matrix: 1 on the diagonal, `1 / (1 + distance)` elsewhere.
pub fn edge_weights(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0
        } else {
            1.0 / (1.0 + opinion_distance(x, i, j))
        }
    })
}
