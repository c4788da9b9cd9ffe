//! Diffusion Operator
//!
//! One implicit (backward Euler) step of the heat equation over the belief axis:
//!
//! ```text
//! (x(t+1) - x(t)) / dt = kappa * (x_{b+1}(t+1) + x_{b-1}(t+1) - 2 x_b(t+1)) / db^2
//! x(t) = A x(t+1)      =>      x(t+1) = A^-1 x(t)
//! ```
//!
//! `A` is tridiagonal with `1 + 2c` on the diagonal and `-c` off it, where
//! `c = kappa * dt / db^2`. The inverse is computed once per run and shared
//! read-only by every agent.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::belief::BeliefSpace;
use crate::error::{SimError, SimResult};

/// Time step of the diffusion solve (one tick)
pub const DIFFUSION_DT: f64 = 1.0;

/// Treatment of the two ends of the belief axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// Reflecting ends: every row of `A` sums to 1, so mass is conserved and the
    /// uniform density is a fixed point.
    #[default]
    ZeroFlux,
    /// Truncated stencil (density leaks out at the ends before renormalization)
    Absorbing,
}

/// The tridiagonal heat-equation matrix together with its precomputed inverse.
#[derive(Resource, Debug, Clone)]
pub struct DiffusionOperator {
    n: usize,
    kappa: f64,
    coupling: f64,
    diagonal: Vec<f64>,
    /// Dense row-major `A^-1`
    inverse: Vec<f64>,
}

impl DiffusionOperator {
    pub fn new(space: &BeliefSpace, kappa: f64, boundary: BoundaryCondition) -> SimResult<Self> {
        if !(kappa.is_finite() && kappa >= 0.0) {
            return Err(SimError::InvalidParams(format!(
                "kappa must be finite and non-negative, got {}",
                kappa
            )));
        }

        let n = space.len();
        let coupling = DIFFUSION_DT * kappa / (space.db() * space.db());

        let mut diagonal = vec![1.0 + 2.0 * coupling; n];
        if boundary == BoundaryCondition::ZeroFlux {
            diagonal[0] = 1.0 + coupling;
            diagonal[n - 1] = 1.0 + coupling;
        }

        let mut operator = Self {
            n,
            kappa,
            coupling,
            diagonal,
            inverse: vec![0.0; n * n],
        };
        operator.invert();
        Ok(operator)
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    /// Entry `(row, col)` of `A^-1`
    pub fn inverse_entry(&self, row: usize, col: usize) -> f64 {
        self.inverse[row * self.n + col]
    }

    /// `A x` (forward operator, used to verify the inverse)
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        let c = self.coupling;
        (0..self.n)
            .map(|i| {
                let mut value = self.diagonal[i] * x[i];
                if i > 0 {
                    value -= c * x[i - 1];
                }
                if i + 1 < self.n {
                    value -= c * x[i + 1];
                }
                value
            })
            .collect()
    }

    /// `A^-1 x` using the precomputed inverse.
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.inverse
            .chunks_exact(self.n)
            .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// Solve `A y = rhs` directly with the Thomas algorithm.
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.n;
        let off = -self.coupling;
        let mut upper = vec![0.0; n];
        let mut y = vec![0.0; n];

        upper[0] = off / self.diagonal[0];
        y[0] = rhs[0] / self.diagonal[0];
        for i in 1..n {
            let pivot = self.diagonal[i] - off * upper[i - 1];
            upper[i] = off / pivot;
            y[i] = (rhs[i] - off * y[i - 1]) / pivot;
        }
        for i in (0..n - 1).rev() {
            y[i] -= upper[i] * y[i + 1];
        }
        y
    }

    /// One non-interaction step: diffuse and renormalize.
    pub fn diffuse(&self, space: &BeliefSpace, density: &[f64]) -> SimResult<Vec<f64>> {
        space.normalized(self.apply(density))
    }

    fn invert(&mut self) {
        let n = self.n;
        let mut unit = vec![0.0; n];
        for col in 0..n {
            unit[col] = 1.0;
            let column = self.solve(&unit);
            unit[col] = 0.0;
            for (row, value) in column.into_iter().enumerate() {
                self.inverse[row * n + col] = value;
            }
        }
    }
}
