//! TV-regularized reconstruction as a composite minimization:
//! a smooth least-squares data term through a [`ProjectionOperator`]
//! and a non-smooth, prox-friendly TV term with box constraints.
//!
//! The proximal map of the TV term is supplied from outside through
//! [`ProximalDenoiser`]; [`Fista`] drives the outer iteration.
//!
//! [`ProjectionOperator`]: crate::linop::ProjectionOperator

mod clip;
pub use clip::*;

mod fista;
pub use fista::*;

use ndarray::prelude::*;
use ndarray::NdFloat;
use num_traits::Float;

use crate::error::{ReconError, Result};

/// Elementwise box constraint `min <= x <= max`; either side may be infinite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds<A> {
    pub min: A,
    pub max: A,
}

impl<A: Float> Bounds<A> {
    pub fn new(min: A, max: A) -> Result<Self> {
        let b = Bounds { min, max };
        b.validate()?;
        Ok(b)
    }

    pub fn unbounded() -> Self {
        Bounds {
            min: A::neg_infinity(),
            max: A::infinity(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min == A::neg_infinity() && self.max == A::infinity()
    }

    #[inline]
    pub fn clamp(&self, v: A) -> A {
        if v < self.min {
            self.min
        } else if v > self.max {
            self.max
        } else {
            v
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        // also rejects NaN on either side
        if !(self.min <= self.max) {
            return Err(ReconError::invalid_config(
                "box constraint requires bmin <= bmax",
            ));
        }
        Ok(())
    }
}

impl<A: Float> Default for Bounds<A> {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Everything a proximal denoiser is configured with.
///
/// Handed to the denoiser factory of [`Fista::new`] once, at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct ProxParams<A> {
    /// TV weight
    pub lambda: A,
    /// iteration budget of the inner solver
    pub iterations: usize,
    pub bounds: Bounds<A>,
    /// worker threads for the inner solver, `None` lets it decide
    pub threads: Option<usize>,
    /// `(height, width)` of every image passed to `prox`
    pub shape: (usize, usize),
}

/// Proximal map of `lambda * TV` restricted to a box:
///
/// ```math
/// \mathrm{prox}(t) = \mathrm{arg}\!\min_{b_{min} \leq x \leq b_{max}}
///     \tfrac12 \|x - t\|_2^2 + \lambda \, \mathrm{TV}(x)
/// ```
///
/// Implementations must be deterministic for a fixed configuration and
/// input; reconstruction runs are only reproducible if `prox` is.
pub trait ProximalDenoiser {
    type Elem: NdFloat;

    fn prox(&self, target: ArrayView2<Self::Elem>) -> Result<Array2<Self::Elem>>;
}

impl<'a, D> ProximalDenoiser for &'a D
where
    D: ProximalDenoiser + ?Sized,
{
    type Elem = D::Elem;

    fn prox(&self, target: ArrayView2<Self::Elem>) -> Result<Array2<Self::Elem>> {
        (**self).prox(target)
    }
}
