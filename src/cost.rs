//! Objective values for the monotone safeguard
//!
//! ```math
//! F(x) = \| b - Ax \|_2^2 + \lambda \, \mathrm{TV}(x)
//! ```
//! These are only used to compare candidate iterates; the proximal
//! sub-solver never calls them.

use ndarray::prelude::*;
use ndarray::{s, Data, NdFloat, Zip};
use num_traits::Float;

use crate::error::{ReconError, Result};
use crate::linop::ProjectionOperator;

/// Anisotropic Total Variation seminorm of an image
///
/// Every pixel with both a lower and a right neighbour contributes the
/// Euclidean norm of its forward differences. The last column contributes
/// only its vertical differences and the last row only its horizontal
/// ones, as absolute values.
///
/// ```math
/// \mathrm{TV}(x) = \sum_{i<m-1,\,j<n-1} \sqrt{(x_{ij}-x_{i+1,j})^2 + (x_{ij}-x_{i,j+1})^2}
///   + \sum_{i<m-1} |x_{i,n-1} - x_{i+1,n-1}| + \sum_{j<n-1} |x_{m-1,j} - x_{m-1,j+1}|
/// ```
pub fn tv_cost<A, S>(image: &ArrayBase<S, Ix2>) -> A
where
    A: NdFloat,
    S: Data<Elem = A>,
{
    let (m, n) = image.dim();
    if m == 0 || n == 0 {
        return A::zero();
    }
    let mut cost = A::zero();

    Zip::from(image.slice(s![..m - 1, ..n - 1]))
        .and(image.slice(s![1.., ..n - 1]))
        .and(image.slice(s![..m - 1, 1..]))
        .apply(|&c, &down, &right| {
            let dv = c - down;
            let dh = c - right;
            cost += Float::sqrt(dv * dv + dh * dh);
        });

    Zip::from(image.slice(s![..m - 1, n - 1]))
        .and(image.slice(s![1.., n - 1]))
        .apply(|&c, &down| cost += Float::abs(c - down));

    Zip::from(image.slice(s![m - 1, ..n - 1]))
        .and(image.slice(s![m - 1, 1..]))
        .apply(|&c, &right| cost += Float::abs(c - right));

    cost
}

/// Squared data misfit plus weighted TV
///
/// `data` is the flattened projection data. The misfit is the plain sum of
/// squared residuals, not a mean.
pub fn full_cost<P>(
    image: ArrayView2<P::Elem>,
    op: &P,
    data: ArrayView1<P::Elem>,
    lambda: P::Elem,
) -> Result<P::Elem>
where
    P: ProjectionOperator + ?Sized,
{
    let projected = op.forward(image.view())?;
    if projected.len() != data.len() {
        return Err(ReconError::shape(
            "projection data",
            &[projected.len()],
            data.shape(),
        ));
    }
    let residual = &data - &projected;
    Ok(residual.dot(&residual) + lambda * tv_cost(&image))
}
