//! Parameter Records
//!
//! The flat parameter set attached to every persisted run, and the key used to
//! group runs of a sweep.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every model parameter of a single run, except the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub n_agents: usize,
    pub k: usize,
    pub k_in: usize,
    pub k_out: usize,
    pub alpha_in: f64,
    pub alpha_out: f64,
    pub sig_op_0: f64,
    pub communication_frequency: f64,
    pub kappa: f64,
    pub delta_0: f64,
    pub p_rewire: f64,
    /// Time horizon `T` in ticks
    pub ticks: u64,
    pub n_beliefs: usize,
    pub sigma_threshold: f64,
}

impl ParameterSet {
    /// Homophily `h = (k_in - k_out) / k`.
    pub fn homophily(&self) -> f64 {
        if self.k == 0 {
            return 0.0;
        }
        (self.k_in as f64 - self.k_out as f64) / self.k as f64
    }

    /// Key grouping runs that differ only by seed.
    pub fn key(&self) -> ParameterKey {
        ParameterKey::new(self.alpha_in, self.alpha_out, self.p_rewire)
    }

    /// Stem for result files covering every parameter except the perception
    /// weights and the seed.
    pub fn file_stem(&self) -> String {
        format!(
            "ws{}_n{}_k-{}_kin-{}_kout-{}_sig-{}_commf-{}_kappa-{}_delta-{}",
            self.p_rewire,
            self.n_agents,
            self.k,
            self.k_in,
            self.k_out,
            self.sig_op_0,
            self.communication_frequency,
            self.kappa,
            self.delta_0,
        )
    }
}

/// Sweep grouping key: the swept coordinates of a run.
///
/// Floats are stored as their bit patterns so the key is `Eq + Ord + Hash`;
/// the swept values come from fixed grids so bitwise equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterKey {
    alpha_in_bits: u64,
    alpha_out_bits: u64,
    p_rewire_bits: u64,
}

impl ParameterKey {
    pub fn new(alpha_in: f64, alpha_out: f64, p_rewire: f64) -> Self {
        Self {
            alpha_in_bits: alpha_in.to_bits(),
            alpha_out_bits: alpha_out.to_bits(),
            p_rewire_bits: p_rewire.to_bits(),
        }
    }

    pub fn alpha_in(&self) -> f64 {
        f64::from_bits(self.alpha_in_bits)
    }

    pub fn alpha_out(&self) -> f64 {
        f64::from_bits(self.alpha_out_bits)
    }

    pub fn p_rewire(&self) -> f64 {
        f64::from_bits(self.p_rewire_bits)
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ain={} aout={} p_rewire={}",
            self.alpha_in(),
            self.alpha_out(),
            self.p_rewire()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> ParameterSet {
        ParameterSet {
            n_agents: 100,
            k: 10,
            k_in: 8,
            k_out: 2,
            alpha_in: 0.75,
            alpha_out: 0.25,
            sig_op_0: 0.2,
            communication_frequency: 0.2,
            kappa: 0.0002,
            delta_0: 0.0,
            p_rewire: 0.0,
            ticks: 3000,
            n_beliefs: 200,
            sigma_threshold: 0.01,
        }
    }

    #[test]
    fn test_homophily() {
        let params = sample_params();
        assert!((params.homophily() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_homophily_zero_degree() {
        let mut params = sample_params();
        params.k = 0;
        params.k_in = 0;
        params.k_out = 0;
        assert_eq!(params.homophily(), 0.0);
    }

    #[test]
    fn test_file_stem() {
        let stem = sample_params().file_stem();
        assert_eq!(
            stem,
            "ws0_n100_k-10_kin-8_kout-2_sig-0.2_commf-0.2_kappa-0.0002_delta-0"
        );
    }

    #[test]
    fn test_parameter_key_roundtrip_values() {
        let key = ParameterKey::new(0.75, 0.25, 0.1);
        assert_eq!(key.alpha_in(), 0.75);
        assert_eq!(key.alpha_out(), 0.25);
        assert_eq!(key.p_rewire(), 0.1);
        assert_eq!(key.to_string(), "ain=0.75 aout=0.25 p_rewire=0.1");
    }

    #[test]
    fn test_parameter_key_ordering() {
        let a = ParameterKey::new(0.25, 0.25, 0.0);
        let b = ParameterKey::new(0.5, 0.25, 0.0);
        assert!(a < b);
        assert_eq!(sample_params().key(), ParameterKey::new(0.75, 0.25, 0.0));
    }
}
