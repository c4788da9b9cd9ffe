//! Belief Space
//!
//! The discretized opinion axis and the density primitives every update relies on.
//!
//! Densities are probability densities, not masses: a normalized density `p`
//! satisfies `sum(p) * db == 1`.

use bevy_ecs::prelude::*;

use crate::error::{SimError, SimResult};

/// Lower bound of the opinion axis
pub const BELIEF_MIN: f64 = -1.0;
/// Upper bound of the opinion axis
pub const BELIEF_MAX: f64 = 1.0;
/// Default number of bins on the opinion axis
pub const DEFAULT_N_BELIEFS: usize = 200;

/// Ordered bin centers spanning (-1, 1) with uniform width.
///
/// Immutable once built; shared by every agent of a run.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct BeliefSpace {
    centers: Vec<f64>,
    db: f64,
}

impl BeliefSpace {
    /// Build `n_beliefs` bins of width `2 / n_beliefs`.
    pub fn new(n_beliefs: usize) -> SimResult<Self> {
        if n_beliefs < 2 {
            return Err(SimError::InvalidParams(format!(
                "n_beliefs must be at least 2, got {}",
                n_beliefs
            )));
        }

        let db = (BELIEF_MAX - BELIEF_MIN) / n_beliefs as f64;
        let centers = (0..n_beliefs)
            .map(|i| BELIEF_MIN + (i as f64 + 0.5) * db)
            .collect();

        Ok(Self { centers, db })
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Bin width
    pub fn db(&self) -> f64 {
        self.db
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    /// The uninformative density, `1 / (n * db)` in every bin.
    pub fn uniform(&self) -> Vec<f64> {
        vec![self.uniform_value(); self.len()]
    }

    pub fn uniform_value(&self) -> f64 {
        1.0 / (self.len() as f64 * self.db)
    }

    /// Integral of a density over the axis.
    pub fn integral(&self, density: &[f64]) -> f64 {
        density.iter().sum::<f64>() * self.db
    }

    /// Rescale non-negative weights in place so that they integrate to 1.
    pub fn normalize(&self, weights: &mut [f64]) -> SimResult<()> {
        if weights.len() != self.len() {
            return Err(SimError::degenerate(format!(
                "expected {} bins, got {}",
                self.len(),
                weights.len()
            )));
        }
        check_entries(weights)?;

        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(SimError::degenerate(format!("total weight is {}", total)));
        }

        let scale = 1.0 / (total * self.db);
        for w in weights.iter_mut() {
            *w *= scale;
        }
        Ok(())
    }

    /// Owned variant of [`BeliefSpace::normalize`].
    pub fn normalized(&self, mut weights: Vec<f64>) -> SimResult<Vec<f64>> {
        self.normalize(&mut weights)?;
        Ok(weights)
    }

    /// Density-weighted mean of the bin centers.
    pub fn mean(&self, density: &[f64]) -> f64 {
        let total: f64 = density.iter().sum();
        let weighted: f64 = density
            .iter()
            .zip(&self.centers)
            .map(|(p, b)| p * b)
            .sum();
        weighted / total
    }

    /// Density-weighted standard deviation around `mean`, floored at machine epsilon.
    pub fn spread(&self, density: &[f64], mean: f64) -> f64 {
        let total: f64 = density.iter().sum();
        let second: f64 = density
            .iter()
            .zip(&self.centers)
            .map(|(p, b)| p * b * b)
            .sum();
        let var = second / total - mean * mean;
        if var > 0.0 {
            var.sqrt()
        } else {
            f64::EPSILON
        }
    }

    /// Gaussian with mean `mu` and standard deviation `sigma`, evaluated at the
    /// bin centers and normalized onto the axis.
    pub fn gaussian(&self, mu: f64, sigma: f64) -> SimResult<Vec<f64>> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(SimError::InvalidParams(format!(
                "gaussian width must be positive, got {}",
                sigma
            )));
        }

        let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        let pdf = self
            .centers
            .iter()
            .map(|b| {
                let z = (b - mu) / sigma;
                norm * (-0.5 * z * z).exp()
            })
            .collect();
        self.normalized(pdf)
    }
}

/// Every entry must be finite and non-negative.
pub fn check_entries(density: &[f64]) -> SimResult<()> {
    match density
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        Some((bin, p)) => Err(SimError::degenerate(format!(
            "bin {} holds invalid value {}",
            bin, p
        ))),
        None => Ok(()),
    }
}
