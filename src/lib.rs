//! The `ndarray-tvtomo` crate reconstructs 2-D images from noisy
//! tomographic projection data by Total Variation (TV) regularized
//! least squares:
//!
//! ```math
//! \min_{b_{min} \leq x \leq b_{max}} \| b - Ax \|_2^2 + \lambda \, \mathrm{TV}(x)
//! ```
//!
//! The problem is solved with a (monotone) FISTA outer loop, see
//! [`prox::Fista`]. The two numerically heavy pieces are supplied by the
//! caller:
//! - the projection operator `A` and its adjoint, as a
//!   [`linop::ProjectionOperator`] (an explicit [`linop::SystemMatrix`] is
//!   provided for small problems),
//! - the TV proximal map, as a [`prox::ProximalDenoiser`]. [`prox::BoxClip`]
//!   covers the `lambda = 0` case.
//!
//! ```no_run
//! use ndarray::Array2;
//! use ndarray_tvtomo::linop::Identity;
//! use ndarray_tvtomo::prox::{BoxClip, Fista, FistaConfig};
//!
//! # fn main() -> ndarray_tvtomo::Result<()> {
//! let data = Array2::<f64>::ones((64, 64));
//! let config = FistaConfig::new(0.).bounds(0., 1.);
//! let fista = Fista::new(Identity::<f64>::new((64, 64)), config, BoxClip::new)?;
//! let rec = fista.reconstruct(&data, 50, None, true)?;
//! assert_eq!(rec.dim(), (64, 64));
//! # Ok(())
//! # }
//! ```
//!
//! Progress and diagnostics are emitted through `tracing`; install a
//! subscriber to see them.

#![cfg_attr(all(rustc_nightly, test), feature(test))]
#[cfg(all(rustc_nightly, test))]
extern crate test;

pub mod cost;
mod error;
pub mod linop;
pub mod prox;

pub use error::{ReconError, Result};
