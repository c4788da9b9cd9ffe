//! Property-based tests for the belief density primitives.
//!
//! Every update must leave densities non-negative, finite and normalized.

use opinion_core::systems::{social_influence, BoundaryCondition, DiffusionOperator};
use opinion_core::BeliefSpace;
use proptest::prelude::*;

/// Tolerance for the normalization integral.
const TOL: f64 = 1e-9;

fn space() -> BeliefSpace {
    BeliefSpace::new(200).unwrap()
}

fn assert_valid_density(space: &BeliefSpace, density: &[f64]) -> Result<(), TestCaseError> {
    prop_assert_eq!(density.len(), space.len());
    prop_assert!(density.iter().all(|p| p.is_finite() && *p >= 0.0));
    let integral = space.integral(density);
    prop_assert!((integral - 1.0).abs() < TOL, "integral {} != 1", integral);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Initial Gaussians are normalized densities.
    #[test]
    fn gaussian_is_normalized(mu in -1.0..1.0f64, sigma in 0.02..1.0f64) {
        let space = space();
        let density = space.gaussian(mu, sigma).unwrap();
        assert_valid_density(&space, &density)?;
    }

    /// Social influence with any trust below one yields a valid density.
    #[test]
    fn social_influence_is_normalized(
        own_mu in -1.0..1.0f64,
        own_sigma in 0.02..0.5f64,
        other_mu in -1.0..1.0f64,
        other_sigma in 0.02..0.5f64,
        alpha in 0.0..0.99f64,
    ) {
        let space = space();
        let own = space.gaussian(own_mu, own_sigma).unwrap();
        let other = space.gaussian(other_mu, other_sigma).unwrap();

        let posterior = social_influence(&space, &own, &other, alpha).unwrap();
        assert_valid_density(&space, &posterior)?;
    }

    /// The posterior mean lies between the two means when the beliefs are
    /// well inside the axis.
    #[test]
    fn social_influence_mean_between(
        own_mu in -0.5..0.5f64,
        other_mu in -0.5..0.5f64,
        alpha in 0.0..0.99f64,
    ) {
        let space = space();
        let own = space.gaussian(own_mu, 0.1).unwrap();
        let other = space.gaussian(other_mu, 0.1).unwrap();

        let posterior = social_influence(&space, &own, &other, alpha).unwrap();
        let mean = space.mean(&posterior);
        let (lo, hi) = if own_mu < other_mu { (own_mu, other_mu) } else { (other_mu, own_mu) };
        prop_assert!(mean >= lo - 1e-3 && mean <= hi + 1e-3, "{} outside [{}, {}]", mean, lo, hi);
    }

    /// Without trust the neighbour's belief is irrelevant.
    #[test]
    fn zero_trust_ignores_neighbour(
        own_mu in -1.0..1.0f64,
        first_mu in -1.0..1.0f64,
        second_mu in -1.0..1.0f64,
    ) {
        let space = space();
        let own = space.gaussian(own_mu, 0.2).unwrap();
        let first = space.gaussian(first_mu, 0.1).unwrap();
        let second = space.gaussian(second_mu, 0.1).unwrap();

        let a = social_influence(&space, &own, &first, 0.0).unwrap();
        let b = social_influence(&space, &own, &second, 0.0).unwrap();
        for (x, y) in a.iter().zip(&b) {
            prop_assert!((x - y).abs() < 1e-10);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Diffusion keeps densities valid under both boundary treatments.
    #[test]
    fn diffusion_is_normalized(
        mu in -1.0..1.0f64,
        sigma in 0.02..0.5f64,
        kappa in 0.0..1e-2f64,
        absorbing in any::<bool>(),
    ) {
        let space = space();
        let boundary = if absorbing {
            BoundaryCondition::Absorbing
        } else {
            BoundaryCondition::ZeroFlux
        };
        let operator = DiffusionOperator::new(&space, kappa, boundary).unwrap();
        let density = space.gaussian(mu, sigma).unwrap();

        let diffused = operator.diffuse(&space, &density).unwrap();
        assert_valid_density(&space, &diffused)?;
    }
}
