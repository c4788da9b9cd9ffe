//! Network Generation
//!
//! Builds the two-group social network the agents live on.
//!
//! Construction: each group is a Watts–Strogatz ring lattice of `k_in`
//! in-group links whose edges are rewired, with probability `p_rewire`, to a
//! random member of the same group. Between the groups, agent `i` of the first
//! group is linked to the agents of the second group at offsets
//! `0, +1, -1, +2, -2, ...` (first `k_out` offsets) around the stacked rings;
//! each of those links is rewired with probability `p_rewire` by keeping one
//! endpoint and redrawing the other from the opposite group. Rewiring therefore
//! never turns an in-group link into an out-group link or vice versa, so
//! `k_in` and `k_out` are exact expectations of the realized degrees.

use bevy_ecs::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;

use crate::components::agent::Group;
use crate::error::{SimError, SimResult};

/// Parameters of the generated topology
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyParams {
    pub n_agents: usize,
    /// Average degree
    pub k: usize,
    /// Expected in-group degree
    pub k_in: usize,
    /// Expected out-group degree
    pub k_out: usize,
    /// Probability that a link is rewired
    pub p_rewire: f64,
}

impl TopologyParams {
    pub fn new(n_agents: usize, k: usize, k_in: usize, k_out: usize, p_rewire: f64) -> Self {
        Self {
            n_agents,
            k,
            k_in,
            k_out,
            p_rewire,
        }
    }

    /// Derive the in/out split from homophily `h = (k_in - k_out) / k`.
    pub fn from_homophily(n_agents: usize, k: usize, h: f64, p_rewire: f64) -> SimResult<Self> {
        if !(-1.0..=1.0).contains(&h) {
            return Err(SimError::InvalidTopologyParams(format!(
                "homophily must lie in [-1, 1], got {}",
                h
            )));
        }
        let k_in = ((1.0 + h) / 2.0 * k as f64).round() as usize;
        let k_in = k_in.min(k);
        Ok(Self::new(n_agents, k, k_in, k - k_in, p_rewire))
    }

    pub fn homophily(&self) -> f64 {
        if self.k == 0 {
            return 0.0;
        }
        (self.k_in as f64 - self.k_out as f64) / self.k as f64
    }

    pub fn group_size(&self) -> usize {
        self.n_agents / 2
    }

    pub fn validate(&self) -> SimResult<()> {
        let invalid = |msg: String| Err(SimError::InvalidTopologyParams(msg));

        if !(0.0..=1.0).contains(&self.p_rewire) {
            return invalid(format!("p_rewire must lie in [0, 1], got {}", self.p_rewire));
        }
        if self.k_in + self.k_out != self.k {
            return invalid(format!(
                "k_in + k_out must equal k ({} + {} != {})",
                self.k_in, self.k_out, self.k
            ));
        }
        if self.n_agents < 2 || self.n_agents % 2 != 0 {
            return invalid(format!(
                "n_agents must be even and at least 2 to form two equal groups, got {}",
                self.n_agents
            ));
        }
        if self.k > self.n_agents - 1 {
            return invalid(format!(
                "k must not exceed n_agents - 1 ({} > {})",
                self.k,
                self.n_agents - 1
            ));
        }
        if self.k_in >= self.group_size() {
            return invalid(format!(
                "k_in must be smaller than the group size ({} >= {})",
                self.k_in,
                self.group_size()
            ));
        }
        if self.k_out > self.group_size() {
            return invalid(format!(
                "k_out must not exceed the group size ({} > {})",
                self.k_out,
                self.group_size()
            ));
        }
        Ok(())
    }
}

/// Realized degree statistics of a network
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeStats {
    pub mean_degree: f64,
    pub mean_in_group_degree: f64,
    pub mean_out_group_degree: f64,
    pub min_degree: usize,
    pub max_degree: usize,
}

/// Undirected two-group graph over agent indices.
///
/// Immutable after construction for the duration of a run.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct Network {
    adjacency: Vec<Vec<usize>>,
    groups: Vec<Group>,
}

impl Network {
    /// Generate a network; the first half of the indices forms the first group.
    pub fn generate<R: Rng + ?Sized>(params: &TopologyParams, rng: &mut R) -> SimResult<Self> {
        params.validate()?;

        let m = params.group_size();
        let mut builder = GraphBuilder::new(params.n_agents);

        builder.add_in_group_lattice(0, m, params.k_in, params.p_rewire, rng);
        builder.add_in_group_lattice(m, m, params.k_in, params.p_rewire, rng);
        builder.add_between_group_links(m, params.k_out, params.p_rewire, rng);

        Ok(builder.finish(halves(params.n_agents)))
    }

    /// Build from a symmetric 0/1 adjacency matrix; rows in the first half
    /// belong to the first group.
    pub fn from_adjacency(matrix: &[Vec<u8>]) -> SimResult<Self> {
        let n = matrix.len();
        let invalid = |msg: String| Err(SimError::InvalidTopologyParams(msg));

        if n < 2 || n % 2 != 0 {
            return invalid(format!(
                "adjacency matrix must have an even number of rows, got {}",
                n
            ));
        }
        if let Some(row) = matrix.iter().position(|r| r.len() != n) {
            return invalid(format!("adjacency row {} does not have {} columns", row, n));
        }

        let mut builder = GraphBuilder::new(n);
        for i in 0..n {
            if matrix[i][i] != 0 {
                return invalid(format!("self-loop on agent {}", i));
            }
            for j in (i + 1)..n {
                let forward = matrix[i][j] != 0;
                let backward = matrix[j][i] != 0;
                if forward != backward {
                    return invalid(format!("adjacency matrix is not symmetric at ({}, {})", i, j));
                }
                if forward {
                    builder.add_edge(i, j);
                }
            }
        }

        Ok(builder.finish(halves(n)))
    }

    pub fn n_agents(&self) -> usize {
        self.adjacency.len()
    }

    /// Sorted neighbour indices of an agent
    pub fn neighbors(&self, agent: usize) -> &[usize] {
        &self.adjacency[agent]
    }

    pub fn group(&self, agent: usize) -> Group {
        self.groups[agent]
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn degree(&self, agent: usize) -> usize {
        self.adjacency[agent].len()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency[a].binary_search(&b).is_ok()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn is_in_group_edge(&self, a: usize, b: usize) -> bool {
        self.groups[a] == self.groups[b]
    }

    /// Agents without any neighbour
    pub fn isolated_agents(&self) -> Vec<usize> {
        (0..self.n_agents()).filter(|&i| self.degree(i) == 0).collect()
    }

    pub fn degree_stats(&self) -> DegreeStats {
        let n = self.n_agents();
        let mut in_group = 0usize;
        let mut out_group = 0usize;
        for (agent, neighbors) in self.adjacency.iter().enumerate() {
            for &other in neighbors {
                if self.is_in_group_edge(agent, other) {
                    in_group += 1;
                } else {
                    out_group += 1;
                }
            }
        }

        DegreeStats {
            mean_degree: (in_group + out_group) as f64 / n as f64,
            mean_in_group_degree: in_group as f64 / n as f64,
            mean_out_group_degree: out_group as f64 / n as f64,
            min_degree: self.adjacency.iter().map(Vec::len).min().unwrap_or(0),
            max_degree: self.adjacency.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

fn halves(n: usize) -> Vec<Group> {
    (0..n)
        .map(|i| if i < n / 2 { Group::First } else { Group::Second })
        .collect()
}

/// `i`-th out-group offset: 0, +1, -1, +2, -2, ...
fn between_group_offset(i: usize) -> i64 {
    if i == 0 {
        0
    } else if i % 2 == 1 {
        ((i + 1) / 2) as i64
    } else {
        -((i / 2) as i64)
    }
}

/// Mutable edge sets used while generating; ordered sets keep iteration deterministic.
struct GraphBuilder {
    edges: Vec<BTreeSet<usize>>,
}

impl GraphBuilder {
    fn new(n: usize) -> Self {
        Self {
            edges: vec![BTreeSet::new(); n],
        }
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        if a != b {
            self.edges[a].insert(b);
            self.edges[b].insert(a);
        }
    }

    fn remove_edge(&mut self, a: usize, b: usize) {
        self.edges[a].remove(&b);
        self.edges[b].remove(&a);
    }

    fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges[a].contains(&b)
    }

    /// Nodes in `start..start + size` that `node` could be linked to without a
    /// self-loop or duplicate.
    fn free_targets(&self, node: usize, start: usize, size: usize) -> Vec<usize> {
        (start..start + size)
            .filter(|&w| w != node && !self.has_edge(node, w))
            .collect()
    }

    /// Move the edge `(u, v)` to `(u, w)` with `w` drawn uniformly from the
    /// free targets of `u` in the group; skipped when `u` is saturated.
    fn rewire_within<R: Rng + ?Sized>(
        &mut self,
        u: usize,
        v: usize,
        start: usize,
        size: usize,
        rng: &mut R,
    ) {
        if !self.has_edge(u, v) {
            return;
        }
        let targets = self.free_targets(u, start, size);
        if let Some(&w) = targets.choose(rng) {
            self.remove_edge(u, v);
            self.add_edge(u, w);
        }
    }

    fn add_in_group_lattice<R: Rng + ?Sized>(
        &mut self,
        start: usize,
        size: usize,
        k_in: usize,
        p_rewire: f64,
        rng: &mut R,
    ) {
        let half = k_in / 2;
        for j in 1..=half {
            for u in 0..size {
                self.add_edge(start + u, start + (u + j) % size);
            }
        }

        // Odd degree: the extra successor link exists with probability 1/2,
        // which keeps the expected degree at k_in. When the offset is exactly
        // half the ring, `u` and its successor share one link, so only the
        // lower endpoint draws it.
        if k_in % 2 == 1 {
            let antipodal = 2 * (half + 1) == size;
            for u in 0..size {
                if antipodal && u >= size / 2 {
                    continue;
                }
                if rng.gen_bool(0.5) {
                    let v = start + (u + half + 1) % size;
                    self.add_edge(start + u, v);
                    if rng.gen::<f64>() < p_rewire {
                        self.rewire_within(start + u, v, start, size, rng);
                    }
                }
            }
        }

        for j in 1..=half {
            for u in 0..size {
                if rng.gen::<f64>() < p_rewire {
                    let v = start + (u + j) % size;
                    self.rewire_within(start + u, v, start, size, rng);
                }
            }
        }
    }

    fn add_between_group_links<R: Rng + ?Sized>(
        &mut self,
        group_size: usize,
        k_out: usize,
        p_rewire: f64,
        rng: &mut R,
    ) {
        let m = group_size as i64;
        for u in 0..group_size {
            for i in 0..k_out {
                let v = group_size + (u as i64 + between_group_offset(i)).rem_euclid(m) as usize;
                self.add_edge(u, v);

                if rng.gen::<f64>() < p_rewire {
                    self.remove_edge(u, v);
                    self.relink_between_groups(u, v, group_size, rng);
                }
            }
        }
    }

    /// Keep one endpoint of a removed out-group link (chosen at random) and
    /// redraw the other from the opposite group.
    fn relink_between_groups<R: Rng + ?Sized>(
        &mut self,
        u: usize,
        v: usize,
        group_size: usize,
        rng: &mut R,
    ) {
        let keep_first = rng.gen_bool(0.5);
        let attempts = if keep_first {
            [(u, group_size), (v, 0)]
        } else {
            [(v, 0), (u, group_size)]
        };

        for (kept, other_start) in attempts {
            let targets = self.free_targets(kept, other_start, group_size);
            if let Some(&w) = targets.choose(rng) {
                self.add_edge(kept, w);
                return;
            }
        }
        // Both endpoints saturated: put the original link back.
        self.add_edge(u, v);
    }

    fn finish(self, groups: Vec<Group>) -> Network {
        Network {
            adjacency: self
                .edges
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
            groups,
        }
    }
}
