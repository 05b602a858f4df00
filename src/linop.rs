//! Projection Operators and Adjoints
//! building upon ndarray_linalg::operator
//!
//! A [`ProjectionOperator`] maps an image onto (flattened) projection data
//! and back. The reconstruction loop only ever sees this interface, so
//! geometry, GPU execution and noise simulation stay with the caller.

use std::marker::PhantomData;

use ndarray::prelude::*;
use ndarray::{Data, NdFloat};
pub use ndarray_linalg::operator::LinearOperator;
use ndarray_linalg::Scalar;
use num_traits::Float;

use crate::error::{ReconError, Result};

pub trait Adjoint<'a> {
    type Output;
    fn adj(&'a self) -> Self::Output;
}

impl<'a, A, S> Adjoint<'a> for ArrayBase<S, Ix2>
where
    A: 'a + Float,
    S: Data<Elem = A>,
{
    type Output = ArrayView<'a, A, Ix2>;

    fn adj(&'a self) -> Self::Output {
        self.t()
    }
}

/// Linear map from a 2-D image to projection data, together with its adjoint.
///
/// `forward` and `adjoint` must be exact adjoints of one another,
/// `<forward(x), r> == <x, adjoint(r)>` up to rounding, otherwise the
/// gradient step of the reconstruction is not a descent direction.
/// Both are called synchronously; an implementation is free to use threads
/// or a device internally but must block until the result is ready.
pub trait ProjectionOperator {
    type Elem: NdFloat;

    /// `(height, width)` of the image domain
    fn image_shape(&self) -> (usize, usize);

    /// Shape of the projection data, e.g. `(angles, detectors)`
    fn data_shape(&self) -> Vec<usize>;

    /// Total number of projection samples
    fn data_len(&self) -> usize {
        self.data_shape().iter().product()
    }

    /// Project an image; the result is flattened in logical order.
    fn forward(&self, image: ArrayView2<Self::Elem>) -> Result<Array1<Self::Elem>>;

    /// Backproject flattened projection data into the image domain.
    fn adjoint(&self, data: ArrayView1<Self::Elem>) -> Result<Array2<Self::Elem>>;
}

impl<'a, P> ProjectionOperator for &'a P
where
    P: ProjectionOperator + ?Sized,
{
    type Elem = P::Elem;

    fn image_shape(&self) -> (usize, usize) {
        (**self).image_shape()
    }

    fn data_shape(&self) -> Vec<usize> {
        (**self).data_shape()
    }

    fn data_len(&self) -> usize {
        (**self).data_len()
    }

    fn forward(&self, image: ArrayView2<Self::Elem>) -> Result<Array1<Self::Elem>> {
        (**self).forward(image)
    }

    fn adjoint(&self, data: ArrayView1<Self::Elem>) -> Result<Array2<Self::Elem>> {
        (**self).adjoint(data)
    }
}

/// Identity projection: the data is the image itself.
///
/// Turns the reconstruction into plain TV denoising of `data`.
pub struct Identity<A> {
    shape: (usize, usize),
    phantom: PhantomData<A>,
}

impl<A> Identity<A> {
    #[must_use]
    pub fn new(shape: (usize, usize)) -> Identity<A> {
        Identity {
            shape,
            phantom: PhantomData,
        }
    }
}

impl<A: NdFloat> ProjectionOperator for Identity<A> {
    type Elem = A;

    fn image_shape(&self) -> (usize, usize) {
        self.shape
    }

    fn data_shape(&self) -> Vec<usize> {
        vec![self.shape.0, self.shape.1]
    }

    #[inline]
    fn forward(&self, image: ArrayView2<A>) -> Result<Array1<A>> {
        check_image(self.shape, image.dim())?;
        Ok(image.iter().cloned().collect())
    }

    #[inline]
    fn adjoint(&self, data: ArrayView1<A>) -> Result<Array2<A>> {
        data.to_owned().into_shape(self.shape).map_err(|_| {
            ReconError::shape(
                "adjoint input",
                &[self.shape.0 * self.shape.1],
                data.shape(),
            )
        })
    }
}

/// Explicit system matrix `A` of shape `(M, H*W)`.
///
/// Row `i` holds the weights of every pixel on ray `i`, pixels are taken
/// in row-major order. The adjoint is the transpose.
pub struct SystemMatrix<A> {
    matrix: Array2<A>,
    image_shape: (usize, usize),
    data_shape: Vec<usize>,
}

impl<A: NdFloat> SystemMatrix<A> {
    pub fn new(matrix: Array2<A>, image_shape: (usize, usize)) -> Result<Self> {
        let (rays, pixels) = matrix.dim();
        if pixels != image_shape.0 * image_shape.1 {
            return Err(ReconError::shape(
                "system matrix columns",
                &[image_shape.0 * image_shape.1],
                &[pixels],
            ));
        }
        Ok(SystemMatrix {
            matrix,
            image_shape,
            data_shape: vec![rays],
        })
    }

    /// Declare the logical layout of the projection data,
    /// e.g. `&[angles, detectors]`. The product must equal the number of rows.
    pub fn with_data_shape(mut self, shape: &[usize]) -> Result<Self> {
        let rays = self.matrix.nrows();
        if shape.iter().product::<usize>() != rays {
            return Err(ReconError::shape("data shape", &[rays], shape));
        }
        self.data_shape = shape.to_vec();
        Ok(self)
    }

    pub fn matrix(&self) -> ArrayView2<A> {
        self.matrix.view()
    }
}

impl<A> ProjectionOperator for SystemMatrix<A>
where
    A: NdFloat + Scalar,
{
    type Elem = A;

    fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    fn data_shape(&self) -> Vec<usize> {
        self.data_shape.clone()
    }

    fn data_len(&self) -> usize {
        self.matrix.nrows()
    }

    fn forward(&self, image: ArrayView2<A>) -> Result<Array1<A>> {
        check_image(self.image_shape, image.dim())?;
        let flat: Array1<A> = image.iter().cloned().collect();
        Ok(self.matrix.apply(&flat))
    }

    fn adjoint(&self, data: ArrayView1<A>) -> Result<Array2<A>> {
        if data.len() != self.matrix.nrows() {
            return Err(ReconError::shape(
                "adjoint input",
                &[self.matrix.nrows()],
                data.shape(),
            ));
        }
        let back = self.matrix.adj().apply(&data);
        back.into_shape(self.image_shape).map_err(|_| {
            ReconError::shape(
                "adjoint output",
                &[self.image_shape.0, self.image_shape.1],
                &[],
            )
        })
    }
}

fn check_image(expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected != found {
        return Err(ReconError::shape(
            "image",
            &[expected.0, expected.1],
            &[found.0, found.1],
        ));
    }
    Ok(())
}

/// Dot-product test of an operator pair.
///
/// Returns `|<forward(x), r> - <x, adjoint(r)>|`, which is zero (up to
/// rounding) exactly when `adjoint` is the adjoint of `forward`.
pub fn adjoint_mismatch<P>(
    op: &P,
    x: ArrayView2<P::Elem>,
    r: ArrayView1<P::Elem>,
) -> Result<P::Elem>
where
    P: ProjectionOperator + ?Sized,
{
    let lhs = op.forward(x.view())?.dot(&r);
    let rhs = (&x * &op.adjoint(r)?).sum();
    Ok(Float::abs(lhs - rhs))
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand::rngs::StdRng;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    #[test]
    fn ndarray_adj() {
        let A = array![[1., 2.], [3., 4.]];
        let B = array![[1., 3.], [2., 4.]];
        assert!(A.adj() == B);
        assert!(A.adj().adj() == A);
    }

    #[test]
    fn identity() {
        let I = Identity::<f64>::new((2, 2));
        let x = array![[1., 2.], [3., 4.]];

        assert_eq!(I.forward(x.view()).unwrap(), array![1., 2., 3., 4.]);
        assert_eq!(I.adjoint(array![1., 2., 3., 4.].view()).unwrap(), x);
        assert_eq!(I.data_len(), 4);
    }

    #[test]
    fn identity_rejects_wrong_image() {
        let I = Identity::<f64>::new((2, 2));
        let err = I.forward(Array2::zeros((3, 2)).view()).unwrap_err();
        assert!(matches!(err, ReconError::ShapeMismatch { .. }));
    }

    #[test]
    fn system_matrix_forward_is_row_major() {
        // two rays: sum of the first row, sum of the second column
        let A = array![[1., 1., 0., 0.], [0., 1., 0., 1.]];
        let P = SystemMatrix::new(A, (2, 2)).unwrap();
        let x = array![[1., 2.], [3., 4.]];
        assert_eq!(P.forward(x.view()).unwrap(), array![3., 6.]);
        assert_eq!(
            P.adjoint(array![1., 10.].view()).unwrap(),
            array![[1., 11.], [0., 10.]]
        );
    }

    #[test]
    fn system_matrix_shapes() {
        let A = Array2::<f64>::zeros((6, 4));
        assert!(SystemMatrix::new(A.clone(), (3, 2)).is_err());

        let P = SystemMatrix::new(A, (2, 2)).unwrap();
        assert_eq!(P.data_shape(), vec![6]);
        let P = P.with_data_shape(&[3, 2]).unwrap();
        assert_eq!(P.data_shape(), vec![3, 2]);
        assert_eq!(P.data_len(), 6);
        assert!(P.with_data_shape(&[4, 2]).is_err());
    }

    #[test]
    fn system_matrix_passes_dot_product_test() {
        let mut rng = StdRng::seed_from_u64(7);
        let A = Array2::random_using((12, 20), Uniform::new(0., 1.), &mut rng);
        let P = SystemMatrix::new(A, (4, 5)).unwrap();
        let x = Array2::random_using((4, 5), Uniform::new(-1., 1.), &mut rng);
        let r = Array1::random_using(12, Uniform::new(-1., 1.), &mut rng);
        assert_abs_diff_eq!(
            adjoint_mismatch(&P, x.view(), r.view()).unwrap(),
            0.,
            epsilon = 1e-10
        );
    }

    #[test]
    fn dot_product_test_catches_wrong_adjoint() {
        struct Scaled;
        impl ProjectionOperator for Scaled {
            type Elem = f64;
            fn image_shape(&self) -> (usize, usize) {
                (1, 2)
            }
            fn data_shape(&self) -> Vec<usize> {
                vec![2]
            }
            fn forward(&self, image: ArrayView2<f64>) -> Result<Array1<f64>> {
                Ok(image.iter().map(|v| 2. * v).collect())
            }
            fn adjoint(&self, data: ArrayView1<f64>) -> Result<Array2<f64>> {
                Ok(data.to_owned().into_shape((1, 2)).unwrap())
            }
        }
        let x = array![[1., 1.]];
        let r = array![1., 1.];
        let err = adjoint_mismatch(&Scaled, x.view(), r.view()).unwrap();
        assert_abs_diff_eq!(err, 2.);
    }
}
