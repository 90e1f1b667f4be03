//! Structural rewriting passes: hashing, trivial-gate rewriting, sweeping.
//!
//! All passes iterate over a snapshot of the active cone in topological
//! order, mutate the graph through the manager's surgery helpers, and
//! recompute the cone and the diagnostic lists when done. A pass that
//! changed anything also drops cached partitions and the fraiged shield.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::aig::{Aig, Lit, NodeId, Result};

/// Key for an unordered fanin pair: smaller literal in the high half.
fn pair_key(f0: Lit, f1: Lit) -> u64 {
    let (x, y) = (f0.raw() as u64, f1.raw() as u64);
    if x < y { (x << 32) | y } else { (y << 32) | x }
}

impl Aig {
    /// Structural hashing: merges every AND whose unordered fanin pair was
    /// already seen into the earlier owner, at the same polarity.
    ///
    /// One linear pass suffices for a cascade of duplicates: consumers are
    /// repointed as soon as their fanin merges, so by the time the pass
    /// reaches them they hash with canonical fanins.
    pub fn strash(&mut self) -> Result<()> {
        let snapshot = self.cone.clone();
        let mut table: HashMap<u64, NodeId> = HashMap::with_capacity(snapshot.len());
        let mut merged = false;
        for id in snapshot {
            let Some(n) = self.node(id) else { continue };
            let &[f0, f1] = n.fanins() else { continue };
            match table.entry(pair_key(f0, f1)) {
                Entry::Occupied(e) => {
                    self.merge_into(id, *e.get(), false)?;
                    merged = true;
                }
                Entry::Vacant(v) => {
                    v.insert(id);
                }
            }
        }
        self.update_cone();
        self.classify();
        if merged {
            self.structural_change();
        }
        Ok(())
    }

    /// One pass of trivial-gate rewriting over the cone.
    pub fn optimize(&mut self) -> Result<()> {
        let snapshot = self.cone.clone();
        let mut changed = false;
        for id in snapshot {
            if self.node(id).is_some() && self.rewrite_trivial(id)? {
                changed = true;
            }
        }
        self.update_cone();
        self.classify();
        if changed {
            self.structural_change();
        }
        Ok(())
    }

    /// Applies one of the four degeneracy rewrites if the gate fits one:
    /// identical fanins collapse to the fanin, complementary fanins or a
    /// constant-false fanin collapse to the constant, a constant-true fanin
    /// collapses to the other fanin. Consumers inherit the replacement with
    /// their own edge polarity folded in, then the gate is deleted.
    fn rewrite_trivial(&mut self, id: NodeId) -> Result<bool> {
        let n = self.get(id)?;
        let &[f0, f1] = n.fanins() else {
            return Ok(false);
        };
        let replacement = if f0 == f1 {
            f0
        } else if f0.is_complement_of(f1) {
            Lit::FALSE
        } else if f0.is_cst_false() || f1.is_cst_false() {
            Lit::FALSE
        } else if f0.is_cst_true() {
            f1
        } else if f1.is_cst_true() {
            f0
        } else {
            return Ok(false);
        };
        // two fanout entries to detach, even when both fanins share a node
        for f in [f0, f1] {
            if let Some(fanin) = self.node_mut(f.node()) {
                fanin.remove_fanout_of(id)?;
            }
        }
        let consumers = self.get(id)?.fanouts.clone();
        for c in consumers {
            let new_lit = Lit::new(replacement.node(), replacement.complement() ^ c.complement());
            self.repoint_fanin(c.node(), id, new_lit)?;
        }
        self.remove_node(id);
        Ok(true)
    }

    /// Deletes every currently-unused node and, transitively, fanins left
    /// without a consumer. The constant, the inputs and the active cone are
    /// never swept.
    pub fn sweep(&mut self) -> Result<()> {
        if self.unused.is_empty() {
            return Ok(());
        }
        self.epoch += 1;
        self.mark(0);
        for k in 0..self.inputs.len() {
            let id = self.inputs[k];
            self.mark(id);
        }
        for k in 0..self.cone.len() {
            let id = self.cone[k];
            self.mark(id);
        }
        let roots = self.unused.clone();
        for root in roots {
            self.sweep_from(root)?;
        }
        self.epoch += 1;
        self.classify();
        Ok(())
    }

    fn sweep_from(&mut self, root: NodeId) -> Result<()> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.is_marked(id) || self.node(id).is_none() {
                continue;
            }
            let fanins = self.get(id)?.fanins.clone();
            for f in fanins {
                if let Some(fanin) = self.node_mut(f.node()) {
                    fanin.remove_fanout_of(id)?;
                    if fanin.fanouts.is_empty() {
                        stack.push(f.node());
                    }
                }
            }
            self.remove_node(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Aig;

    #[test]
    fn strash_merges_duplicate_pairs() {
        // 3 = and(1, 2), 4 = and(1, 2), 5 = and(3, 4)
        let src = "aag 5 2 0 1 3\n2\n4\n10\n6 2 4\n8 2 4\n10 6 8\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        let before = aig.simulate_patterns(&[0b1100, 0b1010]);

        aig.strash().unwrap();
        assert_eq!(aig.num_ands(), 2);
        assert!(aig.node(4).is_none());
        // 5 now reads node 3 through both fanins
        assert_eq!(
            aig.node(5).unwrap().fanins(),
            &[Lit::new(3, false), Lit::new(3, false)]
        );
        assert_eq!(aig.simulate_patterns(&[0b1100, 0b1010]), before);

        // idempotent: nothing left to merge
        aig.strash().unwrap();
        assert_eq!(aig.num_ands(), 2);
    }

    #[test]
    fn strash_keeps_polarity_distinct_pairs() {
        // and(1, 2) vs and(!1, 2) must not merge
        let src = "aag 4 2 0 2 2\n2\n4\n6\n8\n6 2 4\n8 3 4\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.strash().unwrap();
        assert_eq!(aig.num_ands(), 2);
    }

    #[test]
    fn optimize_complementary_fanins() {
        // 3 = and(1, !1), output observes !3, so it becomes constant true
        let src = "aag 3 1 0 1 1\n2\n7\n6 2 3\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.optimize().unwrap();
        assert_eq!(aig.num_ands(), 0);
        assert!(aig.node(3).is_none());
        assert_eq!(aig.output_lits(), vec![Lit::TRUE]);
        assert!(aig.cone().is_empty());
    }

    #[test]
    fn optimize_identical_fanins() {
        // 3 = and(!1, !1) == !1; output observes !3 == 1
        let src = "aag 3 1 0 1 1\n2\n7\n6 3 3\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.optimize().unwrap();
        assert_eq!(aig.output_lits(), vec![Lit::new(1, false)]);
        assert_eq!(aig.num_ands(), 0);
    }

    #[test]
    fn optimize_constant_fanins() {
        // 4 = and(1, true) == 1 and 5 = and(4, false) == false
        let src = "aag 5 1 0 2 2\n2\n8\n10\n8 2 1\n10 8 0\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        let before = aig.simulate_patterns(&[0b10]);
        aig.optimize().unwrap();
        assert_eq!(aig.num_ands(), 0);
        assert_eq!(aig.output_lits(), vec![Lit::new(1, false), Lit::FALSE]);
        assert_eq!(aig.simulate_patterns(&[0b10]), before);
    }

    #[test]
    fn optimize_cascades_through_consumers() {
        // 3 = and(1, 1) == 1, 4 = and(3, 2): after rewriting 3, gate 4 reads
        // the input directly
        let src = "aag 4 2 0 1 2\n2\n4\n8\n6 2 2\n8 6 4\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.optimize().unwrap();
        assert_eq!(aig.num_ands(), 1);
        let n4 = aig.node(4).unwrap();
        assert!(n4.fanins().contains(&Lit::new(1, false)));
        assert!(n4.fanins().contains(&Lit::new(2, false)));
    }

    #[test]
    fn optimize_is_idempotent() {
        let src = "aag 4 2 0 1 2\n2\n4\n8\n6 2 2\n8 6 4\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        aig.optimize().unwrap();
        let lits = aig.output_lits();
        let ands = aig.num_ands();
        aig.optimize().unwrap();
        assert_eq!(aig.output_lits(), lits);
        assert_eq!(aig.num_ands(), ands);
    }

    #[test]
    fn sweep_removes_dead_region() {
        // 3 = and(1, 2) feeds the output; 4 = and(3, 2) and 5 = and(4, 4)
        // are dead, 4 only through 5
        let src = "aag 5 2 0 1 3\n2\n4\n6\n6 2 4\n8 6 4\n10 8 8\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        assert_eq!(aig.unused(), &[5]);
        aig.sweep().unwrap();
        assert!(aig.node(5).is_none());
        assert!(aig.node(4).is_none());
        assert!(aig.node(3).is_some());
        assert!(aig.node(1).is_some());
        assert_eq!(aig.num_ands(), 1);
        assert!(aig.unused().is_empty());
    }

    #[test]
    fn sweep_keeps_shared_fanins_of_live_nodes() {
        // 3 feeds both the output and the dead gate 4: it must survive
        let src = "aag 4 2 0 1 2\n2\n4\n6\n6 2 4\n8 6 4\n";
        let mut aig = Aig::from_ascii(src.as_bytes()).unwrap();
        assert_eq!(aig.unused(), &[4]);
        aig.sweep().unwrap();
        assert!(aig.node(4).is_none());
        assert!(aig.node(3).is_some());
        // no stale back-reference left on 3
        assert_eq!(aig.node(3).unwrap().fanouts().len(), 1);
    }
}
