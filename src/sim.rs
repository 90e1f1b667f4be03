//! Bit-parallel simulation and FEC partition refinement.
//!
//! Signatures pack 64 simulation patterns into one `u64` per node, so a batch
//! evaluates 64 input vectors with plain word operations. Partition
//! refinement splits candidate-equivalence groups by signature; groups only
//! ever split, never merge, so every batch can only sharpen the candidates
//! handed to [`Aig::fraig`](crate::Aig::fraig).

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::BufRead;
use std::mem;

use rand::Rng;

use crate::aig::{Aig, Lit, NodeId, ParserError, PatternError, Result};

/// Stagnant refinement batches tolerated before random simulation stops.
const STAGNANT_LIMIT: u32 = 15;
/// Every `CHECK_INTERVAL` batches, stop unless the relative change of the
/// group count is at least `MIN_PROGRESS`.
const CHECK_INTERVAL: u64 = 100;
const MIN_PROGRESS: f64 = 1e-4;

/// A group of functionally-equivalent candidates, up to complement.
///
/// Members are literals: an odd member matched the group's reference
/// signature complemented. `base` is the member with the smallest
/// topological position, the representative every other member gets proved
/// (or disproved) against.
#[derive(Debug, Clone)]
pub struct FecGroup {
    pub(crate) lits: Vec<Lit>,
    pub(crate) base: Lit,
}

impl FecGroup {
    pub(crate) fn new(lit: Lit) -> Self {
        FecGroup {
            lits: vec![lit],
            base: lit,
        }
    }

    pub(crate) fn add(&mut self, lit: Lit) {
        self.lits.push(lit);
    }

    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub fn base(&self) -> Lit {
        self.base
    }

    pub fn is_singleton(&self) -> bool {
        self.lits.len() == 1
    }

    /// Removes the member with the given id, if present. Returns whether it
    /// was the base, in which case the caller recomputes one.
    pub(crate) fn erase(&mut self, id: NodeId) -> bool {
        match self.lits.iter().position(|l| l.node() == id) {
            Some(i) => {
                self.lits.swap_remove(i);
                self.base.node() == id
            }
            None => false,
        }
    }
}

impl Aig {
    /// The signature observed through a literal: the referenced node's
    /// signature, complemented if the literal is. Absent nodes read as zero.
    pub(crate) fn sim_of(&self, lit: Lit) -> u64 {
        let s = self.node(lit.node()).map_or(0, |n| n.sim);
        if lit.complement() { !s } else { s }
    }

    /// Evaluates the active cone in topological order, then lets every
    /// output copy its polarity-resolved fanin signature. Input signatures
    /// must already be in place.
    pub(crate) fn simulate_circuit(&mut self) {
        for i in 0..self.cone.len() {
            let id = self.cone[i];
            let Some(n) = self.node(id) else { continue };
            let &[f0, f1] = n.fanins() else { continue };
            let v = self.sim_of(f0) & self.sim_of(f1);
            if let Some(n) = self.node_mut(id) {
                n.sim = v;
            }
        }
        for k in 0..self.outputs.len() {
            let id = self.outputs[k];
            let Some(&f) = self.node(id).and_then(|n| n.fanins.first()) else {
                continue;
            };
            let v = self.sim_of(f);
            if let Some(n) = self.node_mut(id) {
                n.sim = v;
            }
        }
    }

    /// Seeds the partition: one group holding the constant node and every
    /// cone AND at even polarity. Seeding the constant lets gates that are
    /// functionally a constant get proved against (and merged into) the
    /// constant node itself; its position 0 makes it the base automatically.
    /// The first refinement splits the group by actual signatures.
    pub(crate) fn reset_fec(&mut self) {
        self.groups.clear();
        self.group_of.clear();
        let mut lits = vec![Lit::FALSE];
        lits.extend(self.cone.iter().map(|&id| Lit::new(id, false)));
        self.groups.push(FecGroup {
            lits,
            base: Lit::FALSE,
        });
    }

    /// One refinement pass over the current signatures.
    ///
    /// The first pass keys members by raw signature and folds a signature's
    /// complement into the existing group at odd polarity, which is what
    /// discovers complementary equivalences. Later passes split each group
    /// independently, each member keyed relative to its recorded polarity.
    /// Singletons carry no merge opportunity and are dropped.
    pub(crate) fn refine_fecs(&mut self) {
        let old = mem::take(&mut self.groups);
        let mut next = Vec::new();
        if !self.simulated {
            for grp in old {
                let mut split: HashMap<u64, FecGroup> = HashMap::new();
                for lit in grp.lits {
                    let sv = self.node(lit.node()).map_or(0, |n| n.sim);
                    if let Some(g) = split.get_mut(&sv) {
                        g.add(lit);
                    } else if let Some(g) = split.get_mut(&!sv) {
                        g.add(!lit);
                    } else {
                        split.insert(sv, FecGroup::new(lit));
                    }
                }
                next.extend(split.into_values().filter(|g| !g.is_singleton()));
            }
            self.simulated = true;
        } else {
            for grp in old {
                let mut split: HashMap<u64, FecGroup> = HashMap::new();
                for lit in grp.lits {
                    let sv = self.sim_of(lit);
                    match split.entry(sv) {
                        Entry::Occupied(e) => e.into_mut().add(lit),
                        Entry::Vacant(v) => {
                            v.insert(FecGroup::new(lit));
                        }
                    }
                }
                next.extend(split.into_values().filter(|g| !g.is_singleton()));
            }
        }
        self.groups = next;
    }

    /// Rebuilds the id-to-group reverse index and recomputes every group's
    /// base as its smallest-position member.
    pub(crate) fn rebuild_group_index(&mut self) {
        self.group_of.clear();
        let mut groups = mem::take(&mut self.groups);
        for (gi, grp) in groups.iter_mut().enumerate() {
            let Some(&first) = grp.lits.first() else { continue };
            let mut base = first;
            let mut best = u32::MAX;
            for &lit in &grp.lits {
                self.group_of.insert(lit.node(), gi);
                let pos = self.node(lit.node()).map_or(u32::MAX, |n| n.pos);
                if pos < best {
                    best = pos;
                    base = lit;
                }
            }
            grp.base = base;
        }
        self.groups = groups;
    }

    pub(crate) fn apply_input_words(&mut self, words: &[u64]) {
        for k in 0..self.inputs.len() {
            let id = self.inputs[k];
            let w = words.get(k).copied().unwrap_or(0);
            if let Some(n) = self.node_mut(id) {
                n.sim = w;
            }
        }
    }

    /// Random simulation with automatic stopping.
    ///
    /// No-op on a fraiged network: until the structure changes again there is
    /// nothing left for simulation to discover. Otherwise batches of 64
    /// random patterns are simulated and refined until the pattern count
    /// covers the whole input space, the group count stagnates for
    /// [`STAGNANT_LIMIT`] batches, progress falls below [`MIN_PROGRESS`] at a
    /// [`CHECK_INTERVAL`] boundary, or no groups survive.
    pub fn random_sim(&mut self) {
        if self.fraiged {
            return;
        }
        if !self.simulated {
            self.reset_fec();
        }
        let max_patterns = 1u64.checked_shl(self.inputs.len() as u32);
        let mut batches: u64 = 0;
        let mut stagnant: u32 = 0;
        let mut last_count: usize = 1;
        loop {
            for k in 0..self.inputs.len() {
                let w: u64 = self.rng.random();
                let id = self.inputs[k];
                if let Some(n) = self.node_mut(id) {
                    n.sim = w;
                }
            }
            self.simulate_circuit();
            self.refine_fecs();
            batches += 1;

            let count = self.groups.len();
            if count == 0 {
                break;
            }
            if let Some(max) = max_patterns {
                if batches.saturating_mul(64) > max {
                    break;
                }
            }
            if batches % CHECK_INTERVAL == 0
                && (last_count.abs_diff(count) as f64) / (last_count as f64) < MIN_PROGRESS
            {
                break;
            }
            if count == last_count {
                stagnant += 1;
                if stagnant >= STAGNANT_LIMIT {
                    break;
                }
            } else {
                last_count = count;
                stagnant = 0;
            }
        }
        self.rebuild_group_index();
    }

    /// Simulates fixed-width 0/1 patterns from a reader, 64 per batch,
    /// refining the FEC partition after each batch. The first whitespace
    /// token of each line is the pattern; blank lines are skipped. Returns
    /// the number of patterns read.
    ///
    /// A malformed pattern is recoverable: the offending line and everything
    /// after it are discarded and the error is returned, but batches already
    /// refined stay. If less than one full batch had ever been simulated the
    /// partial partition is unreliable and is dropped entirely.
    pub fn file_sim(&mut self, reader: impl BufRead) -> Result<usize> {
        if !self.simulated {
            self.reset_fec();
        }
        let width = self.inputs.len();
        let mut words = vec![0u64; width];
        let mut count: usize = 0;
        let mut bad: Option<PatternError> = None;

        for line in reader.lines() {
            let line = line.map_err(|e| ParserError::IoError(e.to_string()))?;
            let Some(pattern) = line.split_whitespace().next() else {
                continue;
            };
            if pattern.len() != width {
                bad = Some(PatternError::WidthMismatch {
                    pattern: pattern.to_string(),
                    expected: width,
                });
                break;
            }
            if let Some(c) = pattern.chars().find(|&c| c != '0' && c != '1') {
                bad = Some(PatternError::NonBinary {
                    pattern: pattern.to_string(),
                    found: c,
                });
                break;
            }
            // patterns pack MSB-first: the first line of a batch lands in
            // the highest bit of the word
            for (w, c) in words.iter_mut().zip(pattern.chars()) {
                *w = (*w << 1) | (c == '1') as u64;
            }
            count += 1;
            if count % 64 == 0 {
                self.apply_input_words(&words);
                self.simulate_circuit();
                self.refine_fecs();
                words.fill(0);
            }
        }

        let rem = count % 64;
        if bad.is_none() && rem != 0 {
            for w in &mut words {
                *w <<= 64 - rem;
            }
            self.apply_input_words(&words);
            self.simulate_circuit();
            self.refine_fecs();
        }
        if bad.is_some() && count < 64 {
            self.groups.clear();
            self.group_of.clear();
            self.simulated = false;
        }
        self.rebuild_group_index();
        match bad {
            Some(e) => Err(e.into()),
            None => Ok(count),
        }
    }

    /// Read-only convenience: applies the given input words (one per PI, in
    /// declaration order), simulates, and returns the output signatures in
    /// declaration order. Does not touch the FEC partition.
    pub fn simulate_patterns(&mut self, words: &[u64]) -> Vec<u64> {
        self.apply_input_words(words);
        self.simulate_circuit();
        self.outputs
            .iter()
            .map(|&id| self.node(id).map_or(0, |n| n.sim))
            .collect()
    }
}
