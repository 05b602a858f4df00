//! Projection onto the box constraint set

use ndarray::prelude::*;
use ndarray::NdFloat;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::{Bounds, ProximalDenoiser, ProxParams};
use crate::error::{ReconError, Result};

/// Elementwise clamp to `[bmin, bmax]`.
///
/// This is the exact proximal map of the box indicator, i.e. the TV
/// proximal map for `lambda = 0`; any other `lambda` is rejected. With a
/// thread hint the clamp runs on its own rayon pool.
pub struct BoxClip<A> {
    bounds: Bounds<A>,
    shape: (usize, usize),
    pool: Option<ThreadPool>,
}

impl<A: NdFloat> BoxClip<A> {
    pub fn new(params: &ProxParams<A>) -> Result<Self> {
        params.bounds.validate()?;
        if params.lambda != A::zero() {
            return Err(ReconError::invalid_config(
                "BoxClip is only the TV prox for lambda = 0",
            ));
        }
        let pool = match params.threads {
            Some(n) => Some(ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };
        Ok(BoxClip {
            bounds: params.bounds,
            shape: params.shape,
            pool,
        })
    }
}

impl<A: NdFloat> ProximalDenoiser for BoxClip<A> {
    type Elem = A;

    fn prox(&self, target: ArrayView2<A>) -> Result<Array2<A>> {
        if target.dim() != self.shape {
            return Err(ReconError::shape(
                "prox target",
                &[self.shape.0, self.shape.1],
                target.shape(),
            ));
        }
        let mut out = target.to_owned();
        if self.bounds.is_unbounded() {
            return Ok(out);
        }
        let bounds = self.bounds;
        match &self.pool {
            Some(pool) => pool.install(|| out.par_mapv_inplace(|v| bounds.clamp(v))),
            None => out.mapv_inplace(|v| bounds.clamp(v)),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(bounds: Bounds<f64>, threads: Option<usize>) -> ProxParams<f64> {
        ProxParams {
            lambda: 0.,
            iterations: 100,
            bounds,
            threads,
            shape: (2, 3),
        }
    }

    #[test]
    fn clamps_to_box() {
        let clip = BoxClip::new(&params(Bounds::new(0., 1.).unwrap(), None)).unwrap();
        let z = clip.prox(array![[-1., 0.5, 2.], [0., 1., 0.75]].view()).unwrap();
        assert_eq!(z, array![[0., 0.5, 1.], [0., 1., 0.75]]);
    }

    #[test]
    fn unbounded_is_identity() {
        let clip = BoxClip::new(&params(Bounds::unbounded(), None)).unwrap();
        let t = array![[-1e9, 0.5, 2.], [0., 1., 1e9]];
        assert_eq!(clip.prox(t.view()).unwrap(), t);
    }

    #[test]
    fn thread_pool_matches_serial() {
        let bounds = Bounds::new(-0.5, 0.5).unwrap();
        let serial = BoxClip::new(&params(bounds, None)).unwrap();
        let pooled = BoxClip::new(&params(bounds, Some(2))).unwrap();
        let t = array![[-1., -0.25, 0.], [0.3, 0.6, 9.]];
        assert_eq!(serial.prox(t.view()).unwrap(), pooled.prox(t.view()).unwrap());
    }

    #[test]
    fn constant_inside_box_is_fixed_point() {
        let clip = BoxClip::new(&params(Bounds::new(0., 1.).unwrap(), None)).unwrap();
        let t = Array2::from_elem((2, 3), 0.4);
        assert_eq!(clip.prox(t.view()).unwrap(), t);
    }

    #[test]
    fn rejects_positive_lambda() {
        let mut p = params(Bounds::new(0., 1.).unwrap(), None);
        p.lambda = 1.;
        assert!(matches!(BoxClip::new(&p), Err(ReconError::InvalidConfig(_))));
    }

    #[test]
    fn fista_refuses_tv_weight_with_clip() {
        use crate::linop::Identity;
        use crate::prox::{Fista, FistaConfig};

        let op = Identity::<f64>::new((4, 4));
        let built = Fista::new(op, FistaConfig::new(10.), BoxClip::new);
        assert!(matches!(built, Err(ReconError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_wrong_shape() {
        let clip = BoxClip::new(&params(Bounds::unbounded(), None)).unwrap();
        let err = clip.prox(Array2::zeros((3, 2)).view()).unwrap_err();
        assert!(matches!(err, ReconError::ShapeMismatch { .. }));
    }
}
