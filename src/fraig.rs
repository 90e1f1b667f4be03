//! SAT-based merging of functionally-equivalent candidates.
//!
//! The simulation partition ([`crate::sim`]) only ever proposes; this module
//! disposes. Every non-base member of a FEC group is proved against its
//! group's base with a per-pair proof scope: a fresh oracle, a fresh
//! id-to-variable map, free variables for the inputs feeding the two cones.
//! UNSAT merges the candidate into the base; SAT yields a counterexample
//! that is injected into the next simulation batch to split the lying group.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::aig::{Aig, AigError, NodeId, NodeKind, Result};
use crate::sat::{SatOracle, SatVar, VarisatOracle};

impl Aig {
    /// SAT sweep with the default varisat-backed oracle.
    /// See [`fraig_with`](Aig::fraig_with).
    pub fn fraig(&mut self) -> Result<()> {
        let mut oracle = VarisatOracle::new();
        self.fraig_with(&mut oracle)
    }

    /// Proves or refutes every FEC candidate against its group's base,
    /// merging the proved ones.
    ///
    /// The cone is scanned in topological order. A successful merge prunes
    /// partition entries that fell out of the live cone and resumes the scan
    /// right after the base's position, so consumers repointed by the merge
    /// are revisited with their new fanins. Afterwards the partition and all
    /// signatures are dropped and the network is flagged as fraiged, which
    /// shields it from pointless re-simulation until the structure changes
    /// again.
    pub fn fraig_with(&mut self, oracle: &mut impl SatOracle) -> Result<()> {
        let mut i = 0;
        while i < self.cone.len() {
            let id = self.cone[i];
            let Some(&gi) = self.group_of.get(&id) else {
                i += 1;
                continue;
            };
            let base = self.groups[gi].base.node();
            if base == id {
                i += 1;
                continue;
            }

            // fresh proof scope for this pair
            oracle.reset();
            let mut vars: HashMap<NodeId, SatVar> = HashMap::new();
            let mut touched: Vec<NodeId> = Vec::new();
            let const_var = oracle.new_var();
            vars.insert(0, const_var);
            self.encode_cone(oracle, &mut vars, &mut touched, base)?;
            self.encode_cone(oracle, &mut vars, &mut touched, id)?;

            let base_var = self.proof_var(&vars, base)?;
            let cand_var = self.proof_var(&vars, id)?;
            // signatures disagreeing means the candidates are complements
            let flip = self.sim_disagrees(base, id);
            let diff = oracle.new_var();
            oracle.add_xor_clause(diff, base_var, false, cand_var, flip);
            oracle.clear_assumptions();
            oracle.assume(const_var, false);
            oracle.assume(diff, true);

            if oracle.solve()? {
                self.resimulate_with_cex(&*oracle, &vars, &touched);
                i += 1;
            } else {
                self.merge_equivalent(id, base, flip)?;
                i = self.get(base)?.pos() as usize;
            }
        }
        self.update_cone();
        self.classify();
        self.end_fraig();
        Ok(())
    }

    fn proof_var(&self, vars: &HashMap<NodeId, SatVar>, id: NodeId) -> Result<SatVar> {
        vars.get(&id).copied().ok_or_else(|| {
            AigError::InvalidState(format!("proof model misses node {}", id))
        })
    }

    fn sim_disagrees(&self, a: NodeId, b: NodeId) -> bool {
        self.node(a).map_or(0, |n| n.sim) != self.node(b).map_or(0, |n| n.sim)
    }

    /// Encodes the cone of `root` into the oracle. Inputs and undefined
    /// placeholders become free variables, recorded as touched; AND gates
    /// get their Tseitin clauses once their fanins are encoded. Nodes
    /// already holding a variable in this proof scope are reused, so the
    /// shared prefix of the two cones is encoded once.
    ///
    /// Iterative on an explicit work stack; each node is expanded at most
    /// once per proof attempt.
    fn encode_cone(
        &self,
        oracle: &mut impl SatOracle,
        vars: &mut HashMap<NodeId, SatVar>,
        touched: &mut Vec<NodeId>,
        root: NodeId,
    ) -> Result<()> {
        let mut stack: Vec<(NodeId, bool)> = vec![(root, false)];
        while let Some((id, children_done)) = stack.pop() {
            if children_done {
                let n = self.get(id)?;
                let &[f0, f1] = n.fanins() else {
                    return Err(AigError::InvalidState(format!(
                        "node {} in a proof cone is not a gate",
                        id
                    )));
                };
                let v0 = self.proof_var(vars, f0.node()).map_err(|_| {
                    AigError::InvalidState("combinational loop in a proof cone".to_string())
                })?;
                let v1 = self.proof_var(vars, f1.node()).map_err(|_| {
                    AigError::InvalidState("combinational loop in a proof cone".to_string())
                })?;
                let v = oracle.new_var();
                oracle.add_and_clause(v, v0, f0.complement(), v1, f1.complement());
                vars.insert(id, v);
                continue;
            }
            if vars.contains_key(&id) {
                continue;
            }
            let n = self.get(id)?;
            match n.kind() {
                NodeKind::Input | NodeKind::Undef => {
                    let v = oracle.new_var();
                    vars.insert(id, v);
                    touched.push(id);
                }
                NodeKind::And => {
                    stack.push((id, true));
                    for f in n.fanins().iter().rev() {
                        stack.push((f.node(), false));
                    }
                }
                NodeKind::Const | NodeKind::Output => {
                    return Err(AigError::InvalidState(format!(
                        "{} node {} cannot appear in a proof cone",
                        n.kind().as_str(),
                        id
                    )));
                }
            }
        }
        Ok(())
    }

    /// A proved merge: candidate into base, polarity corrected by the
    /// signature disagreement, then partition repair. Entries whose node
    /// fell out of the live cone prove nothing anymore and are erased.
    fn merge_equivalent(&mut self, dying: NodeId, keeper: NodeId, flip: bool) -> Result<()> {
        self.merge_into(dying, keeper, flip)?;
        self.update_cone();
        // the constant node is a valid proof target even though it is
        // never part of the cone
        let mut live: HashSet<NodeId> = self.cone.iter().copied().collect();
        live.insert(0);
        let stale: Vec<NodeId> = self
            .group_of
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(gi) = self.group_of.remove(&id) {
                self.groups[gi].erase(id);
            }
        }
        self.rebuild_group_index();
        Ok(())
    }

    /// Counterexample injection: every PI gets a fresh random word, and the
    /// inputs the proof actually touched carry the model value in pattern
    /// bit 0. One refinement pass then splits the group that lied.
    fn resimulate_with_cex(
        &mut self,
        oracle: &impl SatOracle,
        vars: &HashMap<NodeId, SatVar>,
        touched: &[NodeId],
    ) {
        for k in 0..self.inputs.len() {
            let w: u64 = self.rng.random();
            let id = self.inputs[k];
            if let Some(n) = self.node_mut(id) {
                n.sim = w;
            }
        }
        for &id in touched {
            let Some(&v) = vars.get(&id) else { continue };
            let bit = oracle.value(v) as u64;
            if let Some(n) = self.node_mut(id) {
                n.sim = if n.is_input() { (n.sim & !1) | bit } else { bit };
            }
        }
        self.simulate_circuit();
        self.refine_fecs();
        self.rebuild_group_index();
    }

    /// Drops the partition and zeroes every signature. The network stays
    /// shielded from random simulation until a structural pass changes it.
    fn end_fraig(&mut self) {
        for slot in &mut self.nodes {
            if let Some(n) = slot {
                n.sim = 0;
            }
        }
        self.clear_sim_state();
        self.fraiged = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Aig, Lit};

    // exhaustive check over two inputs packed into one word each
    fn outputs_all_patterns(aig: &mut Aig) -> Vec<u64> {
        let mask = 0b1111;
        aig.simulate_patterns(&[0b1100, 0b1010])
            .into_iter()
            .map(|w| w & mask)
            .collect()
    }

    #[test]
    fn fraig_merges_duplicates_and_complements() {
        // 3 = a & b, 4 = a & b, 5 = !3 (through and(!3, !3))
        let src = "aag 5 2 0 3 3\n2\n4\n6\n8\n10\n6 2 4\n8 2 4\n10 7 7\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        let before = outputs_all_patterns(&mut aig);

        aig.random_sim();
        assert_eq!(aig.fec_groups().len(), 1);
        aig.fraig().unwrap();

        assert_eq!(aig.num_ands(), 1);
        assert!(aig.node(4).is_none());
        assert!(aig.node(5).is_none());
        assert_eq!(aig.output_lits()[2], Lit::new(3, true));
        assert_eq!(outputs_all_patterns(&mut aig), before);
    }

    #[test]
    fn fraig_refutes_false_candidates() {
        // 4 = a & b and 5 = a & c agree on patterns where b == c only
        let src = "aag 5 3 0 2 2\n2\n4\n6\n8\n10\n8 2 4\n10 2 6\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        // aliasing patterns: b == c on every line
        aig.file_sim("000\n100\n111\n011\n".as_bytes()).unwrap();
        assert_eq!(aig.fec_groups().len(), 1);

        aig.fraig().unwrap();
        // the counterexample split the group: nothing merged
        assert_eq!(aig.num_ands(), 2);
        assert!(aig.node(4).is_some());
        assert!(aig.node(5).is_some());
        // and indeed the two differ on some input
        let out = aig.simulate_patterns(&[0b11110000, 0b11001100, 0b10101010]);
        assert_ne!(out[0] & 0xff, out[1] & 0xff);
    }

    #[test]
    fn fraig_merges_across_different_structures() {
        // two XOR implementations: 5 = xnor(a, b) via (a & !b), (!a & b);
        // 8 = xor(a, b) via (a & b), (!a & !b). 8 is the complement of 5.
        let src = "aag 8 2 0 2 6\n2\n4\n11\n16\n\
                   6 2 5\n8 3 4\n10 7 9\n12 2 4\n14 3 5\n16 13 15\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        let before = outputs_all_patterns(&mut aig);
        assert_eq!(aig.num_ands(), 6);

        aig.random_sim();
        aig.fraig().unwrap();

        assert_eq!(outputs_all_patterns(&mut aig), before);
        assert!(aig.node(8).is_none());
        assert_eq!(aig.num_ands(), 5);
        // the feeders of the merged gate went dead; sweeping reclaims them
        aig.sweep().unwrap();
        assert_eq!(aig.num_ands(), 3);
        assert_eq!(outputs_all_patterns(&mut aig), before);
    }

    #[test]
    fn fraig_merges_constant_false_gates_into_the_constant() {
        // 2 = a & !a == false, 3 = 2 & a == false
        let src = "aag 3 1 0 1 2\n2\n6\n4 2 3\n6 4 2\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.random_sim();
        aig.fraig().unwrap();
        assert_eq!(aig.num_ands(), 0);
        assert!(aig.node(2).is_none());
        assert!(aig.node(3).is_none());
        assert_eq!(aig.output_lits(), vec![Lit::FALSE]);
    }

    #[test]
    fn fraig_merges_constant_true_gates_into_the_constant() {
        // 2 = a & !a == false, 3 = !2 & !2 == true
        let src = "aag 3 1 0 1 2\n2\n6\n4 2 3\n6 5 5\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.random_sim();
        aig.fraig().unwrap();
        assert_eq!(aig.num_ands(), 0);
        assert_eq!(aig.output_lits(), vec![Lit::TRUE]);
    }

    #[test]
    fn fraiged_network_shields_random_sim() {
        let src = "aag 5 2 0 3 3\n2\n4\n6\n8\n10\n6 2 4\n8 2 4\n10 7 7\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.random_sim();
        aig.fraig().unwrap();
        assert!(aig.fec_groups().is_empty());

        // shielded: nothing to discover until the structure changes
        aig.random_sim();
        assert!(aig.fec_groups().is_empty());
    }
}
