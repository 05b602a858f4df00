//! Fast Iterative Shrinking/Thresholding Algorithm for TV tomography

use std::fmt;
use std::time::{Duration, Instant};

use ndarray::prelude::*;
use ndarray::{Data, Zip};
use num_traits::Float;
use tracing::{debug, info};

use super::{Bounds, ProximalDenoiser, ProxParams};
use crate::cost::full_cost;
use crate::error::{ReconError, Result};
use crate::linop::ProjectionOperator;

/// Next term of the extrapolation sequence
///
/// ```math
/// t_{n+1} = \frac{1 + \sqrt{1 + 4 t_n^2}}{2}
/// ```
/// Starting from `t_0 = 1` the sequence is strictly increasing and grows
/// like `n / 2`.
#[inline]
pub fn next_momentum<A: Float>(t: A) -> A {
    let two = A::one() + A::one();
    let four = two + two;
    (A::one() + Float::sqrt(A::one() + four * t * t)) / two
}

/// Reconstruction settings, fixed for the lifetime of a [`Fista`].
#[derive(Clone, Debug, PartialEq)]
pub struct FistaConfig<A> {
    /// TV weight, `lambda >= 0`
    pub lambda: A,
    /// iteration budget of the inner TV solver
    pub prox_iterations: usize,
    pub bounds: Bounds<A>,
    /// reject steps that increase the objective (MFISTA)
    pub monotone: bool,
    /// thread hint for the inner TV solver
    pub threads: Option<usize>,
}

impl<A: Float> FistaConfig<A> {
    pub fn new(lambda: A) -> Self {
        FistaConfig {
            lambda,
            prox_iterations: 100,
            bounds: Bounds::unbounded(),
            monotone: true,
            threads: None,
        }
    }

    pub fn prox_iterations(mut self, iterations: usize) -> Self {
        self.prox_iterations = iterations;
        self
    }

    pub fn bounds(mut self, min: A, max: A) -> Self {
        self.bounds = Bounds { min, max };
        self
    }

    pub fn monotone(mut self, monotone: bool) -> Self {
        self.monotone = monotone;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lambda >= A::zero()) {
            return Err(ReconError::invalid_config("lambda must be >= 0"));
        }
        self.bounds.validate()
    }

    /// Parameters for a denoiser working on images of `shape`.
    pub fn prox_params(&self, shape: (usize, usize)) -> ProxParams<A> {
        ProxParams {
            lambda: self.lambda,
            iterations: self.prox_iterations,
            bounds: self.bounds,
            threads: self.threads,
            shape,
        }
    }
}

/// Snapshot handed to the callback of [`Fista::reconstruct_with`]
/// after every iteration.
pub struct Iterate<'a, A> {
    /// iterations completed so far, starting at 1
    pub iteration: usize,
    pub iterations: usize,
    /// current reconstruction
    pub rec: ArrayView2<'a, A>,
    /// extrapolated point for the next gradient step
    pub y: ArrayView2<'a, A>,
    pub t: A,
    /// best objective value so far, monotone mode only
    pub cost: Option<A>,
    /// whether this iteration's proximal step was kept
    pub accepted: bool,
    pub elapsed: Duration,
}

impl<'a, A> Iterate<'a, A> {
    pub fn progress(&self) -> Progress {
        Progress {
            done: self.iteration,
            total: self.iterations,
            elapsed: self.elapsed,
        }
    }
}

/// Completion estimate of a running reconstruction
///
/// `done` counts finished iterations, so the percentage is
/// `100 * done / total` and the report after the last iteration reads
/// `100.00 %`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.;
        }
        100. * self.done as f64 / self.total as f64
    }

    /// Remaining wall-clock time at the average speed so far, whole seconds
    pub fn remaining(&self) -> Duration {
        if self.done == 0 {
            return Duration::from_secs(0);
        }
        let left = self.total.saturating_sub(self.done) as f64;
        let per_iter = self.elapsed.as_secs_f64() / self.done as f64;
        Duration::from_secs((left * per_iter) as u64)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.remaining().as_secs();
        let (hours, rem) = (secs / 3600, secs % 3600);
        let (minutes, secs) = (rem / 60, rem % 60);
        write!(
            f,
            "{:.2} % done ({}:{:02}:{:02})",
            self.percent(),
            hours,
            minutes,
            secs
        )
    }
}

/// (Monotone) FISTA for TV-regularized tomographic reconstruction
///
/// minimizes
/// ```math
/// F(x) = \| b - Ax \|_2^2 + \lambda \, \mathrm{TV}(x), \quad b_{min} \leq x \leq b_{max}
/// ```
/// see [\[BT09\]](#references).
///
/// Algorithm
/// ---------
/// ```math
/// \begin{aligned}
/// z_k &= \mathrm{prox}\left( y_k + \tfrac{1}{N} A^T (b - A y_k) \right) \\
/// x_k &= \begin{cases}
///     z_k & F(z_k) < F(x_{k-1}) \text{ or not monotone} \\
///     x_{k-1} & \text{otherwise}
/// \end{cases} \\
/// t_{k+1} &= \frac{1 + \sqrt{1 + 4 t_k^2}}{2} \\
/// y_{k+1} &= x_k + \frac{t_k}{t_{k+1}} (z_k - x_k) + \frac{t_k - 1}{t_{k+1}} (x_k - x_{k-1})
/// \end{aligned}
/// ```
/// where `N` is the number of projection samples and $`t_0 := 1`$.
/// A rejected step still feeds `z_k` into the extrapolation.
///
/// Concurrency
/// -----------
/// `reconstruct` borrows `self` immutably and owns all of its iteration
/// state, so one `Fista` can serve concurrent calls whenever the operator
/// and denoiser are `Sync`.
///
/// References
/// ----------
/// \[BT09\]: [ Beck A, Teboulle M
///             "Fast gradient-based algorithms for constrained total variation
///             image denoising and deblurring problems", IEEE Trans. Image
///             Process. 18(11), 2419-2434, (2009) ](https://doi.org/10.1109/TIP.2009.2028250)
pub struct Fista<P: ProjectionOperator, D> {
    op: P,
    denoiser: D,
    lambda: P::Elem,
    monotone: bool,
}

impl<P, D> Fista<P, D>
where
    P: ProjectionOperator,
    D: ProximalDenoiser<Elem = P::Elem>,
{
    /// Validate `config` and build the denoiser from the derived
    /// [`ProxParams`], e.g. `Fista::new(op, config, BoxClip::new)`.
    pub fn new<F>(op: P, config: FistaConfig<P::Elem>, build: F) -> Result<Self>
    where
        F: FnOnce(&ProxParams<P::Elem>) -> Result<D>,
    {
        config.validate()?;
        let denoiser = build(&config.prox_params(op.image_shape()))?;
        Self::with_denoiser(op, denoiser, &config)
    }

    /// Use an already configured denoiser. Only `lambda` and `monotone` of
    /// `config` are read here; the rest is the denoiser's business.
    pub fn with_denoiser(op: P, denoiser: D, config: &FistaConfig<P::Elem>) -> Result<Self> {
        config.validate()?;
        Ok(Fista {
            op,
            denoiser,
            lambda: config.lambda,
            monotone: config.monotone,
        })
    }

    pub fn operator(&self) -> &P {
        &self.op
    }

    pub fn denoiser(&self) -> &D {
        &self.denoiser
    }

    pub fn lambda(&self) -> P::Elem {
        self.lambda
    }

    pub fn is_monotone(&self) -> bool {
        self.monotone
    }

    /// Objective value of `image` for the measured `data`
    pub fn cost<S, Dim>(
        &self,
        image: ArrayView2<P::Elem>,
        data: &ArrayBase<S, Dim>,
    ) -> Result<P::Elem>
    where
        S: Data<Elem = P::Elem>,
        Dim: Dimension,
    {
        self.check_image(image.dim(), "image")?;
        let data = self.flatten_data(data)?;
        full_cost(image, &self.op, data.view(), self.lambda)
    }

    /// Run `iterations` FISTA steps on the measured projection `data`.
    ///
    /// Starts from a copy of `warm_start`, or from zero. With
    /// `report_progress` a completion line is logged after each iteration.
    pub fn reconstruct<S, Dim>(
        &self,
        data: &ArrayBase<S, Dim>,
        iterations: usize,
        warm_start: Option<ArrayView2<P::Elem>>,
        report_progress: bool,
    ) -> Result<Array2<P::Elem>>
    where
        S: Data<Elem = P::Elem>,
        Dim: Dimension,
    {
        self.reconstruct_with(data, iterations, warm_start, |it| {
            if report_progress {
                info!("{}", it.progress());
            }
            false
        })
    }

    /// [`reconstruct`](Self::reconstruct) with a user callback.
    ///
    /// The callback is evaluated after each iteration; if it returns true
    /// the loop stops and the current reconstruction is returned.
    pub fn reconstruct_with<S, Dim>(
        &self,
        data: &ArrayBase<S, Dim>,
        iterations: usize,
        warm_start: Option<ArrayView2<P::Elem>>,
        mut callback: impl FnMut(&Iterate<P::Elem>) -> bool,
    ) -> Result<Array2<P::Elem>>
    where
        S: Data<Elem = P::Elem>,
        Dim: Dimension,
    {
        let data = self.flatten_data(data)?;
        let shape = self.op.image_shape();
        let mut rec = match warm_start {
            Some(x0) => {
                self.check_image(x0.dim(), "warm start")?;
                x0.to_owned()
            }
            None => Array2::zeros(shape),
        };
        if iterations == 0 {
            return Ok(rec);
        }

        let one: P::Elem = num_traits::one();
        let div = <P::Elem as num_traits::NumCast>::from(data.len())
            .ok_or_else(|| ReconError::invalid_config("data size not representable"))?;

        // iteration state, owned by this call only
        let mut y = rec.clone();
        let mut t = one;
        let mut best = if self.monotone {
            Some(full_cost(rec.view(), &self.op, data.view(), self.lambda)?)
        } else {
            None
        };
        debug!(
            iterations,
            samples = data.len(),
            height = shape.0,
            width = shape.1,
            monotone = self.monotone,
            "starting reconstruction"
        );

        let start = Instant::now();
        for iter in 1..=iterations {
            // gradient step with fixed size 1/N
            let residual = &data - &self.op.forward(y.view())?;
            let mut target = self.op.adjoint(residual.view())?;
            self.check_image(target.dim(), "adjoint output")?;
            Zip::from(&mut target)
                .and(&y)
                .apply(|g, &y| *g = y + *g / div);

            let z = self.denoiser.prox(target.view())?;
            self.check_image(z.dim(), "prox output")?;

            let accepted = match best.as_mut() {
                None => true,
                Some(f) => {
                    let fz = full_cost(z.view(), &self.op, data.view(), self.lambda)?;
                    if fz < *f {
                        *f = fz;
                        true
                    } else {
                        debug!(iter, cost = ?fz, best = ?*f, "rejected step");
                        false
                    }
                }
            };

            let tn = next_momentum(t);
            if accepted {
                let beta = (t - one) / tn;
                Zip::from(&mut y)
                    .and(&z)
                    .and(&rec)
                    .apply(|y, &z, &x| *y = z + (z - x) * beta);
                rec = z;
            } else {
                let gamma = t / tn;
                Zip::from(&mut y)
                    .and(&z)
                    .and(&rec)
                    .apply(|y, &z, &x| *y = x + (z - x) * gamma);
            }
            t = tn;

            let it = Iterate {
                iteration: iter,
                iterations,
                rec: rec.view(),
                y: y.view(),
                t,
                cost: best,
                accepted,
                elapsed: start.elapsed(),
            };
            if callback(&it) {
                debug!(iter, "stopped by callback");
                break;
            }
        }
        Ok(rec)
    }

    fn flatten_data<S, Dim>(&self, data: &ArrayBase<S, Dim>) -> Result<Array1<P::Elem>>
    where
        S: Data<Elem = P::Elem>,
        Dim: Dimension,
    {
        let expected = self.op.data_len();
        if data.len() != expected {
            return Err(ReconError::shape(
                "projection data",
                &self.op.data_shape(),
                data.shape(),
            ));
        }
        if expected == 0 {
            return Err(ReconError::invalid_config("projection data is empty"));
        }
        Ok(data.iter().cloned().collect())
    }

    fn check_image(&self, found: (usize, usize), what: &'static str) -> Result<()> {
        let expected = self.op.image_shape();
        if found != expected {
            return Err(ReconError::shape(
                what,
                &[expected.0, expected.1],
                &[found.0, found.1],
            ));
        }
        Ok(())
    }
}
