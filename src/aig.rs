//! Module defining the [`Aig`] manager, as well as [`AigNode`], [`Lit`] and some
//! other relevant structs.
//!
//! The manager owns every node in a dense table indexed by id; all cross
//! references are ids or literals, never pointers. Rewriting passes live in
//! [`crate::opt`], bit-parallel simulation in [`crate::sim`] and SAT sweeping
//! in [`crate::fraig`].

pub mod error;
pub mod lit;
pub mod node;
mod parser;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

pub use error::{AigError, ParserError, PatternError, Result};
pub use lit::{Lit, NodeId};
pub use node::{AigNode, NodeKind};

use crate::sim::FecGroup;

const DEFAULT_SEED: u64 = 0x5851_f42d_4c95_7f2d;

/// A whole AIG.
///
/// Nodes live in a dense table indexed by id. Id 0 is the constant node, ids
/// `1..=max_var` hold inputs and AND gates (with [`Undef`](NodeKind::Undef)
/// placeholders for ids that were referenced but never defined), and ids past
/// `max_var` hold the output nodes.
///
/// Deleting a node empties its table slot. A deleted slot can still be named
/// by a stale id during a destructive pass; lookups treat it as absent, and
/// every pass leaves no stale reference reachable from a live node.
///
/// The derived state (active cone, floating/unused lists, FEC partitions,
/// simulation signatures) is recomputed by the passes that invalidate it.
#[derive(Debug, Clone)]
pub struct Aig {
    pub(crate) nodes: Vec<Option<AigNode>>,
    /// The maximum variable index from the AIGER header. Never shrinks, even
    /// when rewrites delete nodes.
    pub(crate) max_var: NodeId,
    pub(crate) num_ands: usize,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) outputs: Vec<NodeId>,
    /// AND ids reachable from the outputs, in topological order.
    pub(crate) cone: Vec<NodeId>,
    pub(crate) floating: Vec<NodeId>,
    pub(crate) unused: Vec<NodeId>,
    /// Current liveness epoch; `node.mark == epoch` means marked.
    /// Bumping the epoch clears every mark at once.
    pub(crate) epoch: u64,
    pub(crate) groups: Vec<FecGroup>,
    /// Reverse index: member id to its group's index in `groups`.
    pub(crate) group_of: HashMap<NodeId, usize>,
    pub(crate) simulated: bool,
    pub(crate) fraiged: bool,
    pub(crate) rng: StdRng,
}

impl Aig {
    /// Creates an empty AIG able to hold variables `1..=max_var`
    /// (constant node included).
    pub fn new(max_var: NodeId) -> Self {
        let mut nodes: Vec<Option<AigNode>> = vec![None; max_var as usize + 1];
        nodes[0] = Some(AigNode::new(0, NodeKind::Const));
        Aig {
            nodes,
            max_var,
            num_ands: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            cone: Vec::new(),
            floating: Vec::new(),
            unused: Vec::new(),
            epoch: 1,
            groups: Vec::new(),
            group_of: HashMap::new(),
            simulated: false,
            fraiged: false,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
        }
    }

    /// Reseeds the internal RNG used by random simulation.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Retrieves a node from its id. Absent, deleted and out-of-range ids all
    /// yield [`None`].
    pub fn node(&self, id: NodeId) -> Option<&AigNode> {
        self.nodes.get(id as usize)?.as_ref()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut AigNode> {
        self.nodes.get_mut(id as usize)?.as_mut()
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&AigNode> {
        self.node(id).ok_or(AigError::NodeDoesNotExist(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut AigNode> {
        self.node_mut(id).ok_or(AigError::NodeDoesNotExist(id))
    }

    pub fn max_var(&self) -> NodeId {
        self.max_var
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_ands(&self) -> usize {
        self.num_ands
    }

    /// Primary input ids, in declaration order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Primary output node ids, in declaration order.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// The literal each output observes, in declaration order.
    pub fn output_lits(&self) -> Vec<Lit> {
        self.outputs
            .iter()
            .filter_map(|&id| self.node(id).and_then(|n| n.fanins.first().copied()))
            .collect()
    }

    /// AND ids reachable from the outputs, in topological order
    /// (as of the last [`update_cone`](Aig::update_cone)).
    pub fn cone(&self) -> &[NodeId] {
        &self.cone
    }

    /// Ids with at least one undefined fanin.
    pub fn floating(&self) -> &[NodeId] {
        &self.floating
    }

    /// Non-output ids feeding nothing.
    pub fn unused(&self) -> &[NodeId] {
        &self.unused
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a new primary input with the given id.
    pub fn add_input(&mut self, id: NodeId) -> Result<()> {
        self.check_var(id)?;
        if self.node(id).is_some() {
            return Err(AigError::DuplicateId(id));
        }
        self.nodes[id as usize] = Some(AigNode::new(id, NodeKind::Input));
        self.inputs.push(id);
        Ok(())
    }

    /// Create a new AND gate with the given id and fanin literals.
    ///
    /// Fanins naming an id with no definition yet materialize an
    /// [`Undef`](NodeKind::Undef) placeholder; defining that id later turns
    /// the placeholder into the real gate, keeping accumulated fanouts.
    pub fn add_and(&mut self, id: NodeId, fanin0: Lit, fanin1: Lit) -> Result<()> {
        self.check_var(id)?;
        // validate both fanins up front so a failure leaves no partial node
        for fanin in [fanin0, fanin1] {
            if fanin.node() > self.max_var {
                return Err(AigError::LitOutOfBounds(fanin.raw()));
            }
        }
        match self.node_mut(id) {
            None => self.nodes[id as usize] = Some(AigNode::new(id, NodeKind::And)),
            Some(n) => n.define_as_and()?,
        }
        for fanin in [fanin0, fanin1] {
            self.connect_fanin(id, fanin)?;
        }
        self.num_ands += 1;
        Ok(())
    }

    /// Create a new primary output observing the given literal.
    /// Output ids are allocated past `max_var`, in declaration order.
    pub fn add_output(&mut self, fanin: Lit) -> Result<NodeId> {
        if fanin.node() > self.max_var {
            return Err(AigError::LitOutOfBounds(fanin.raw()));
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Some(AigNode::new(id, NodeKind::Output)));
        self.connect_fanin(id, fanin)?;
        self.outputs.push(id);
        Ok(id)
    }

    /// Attach a symbolic name to a PI or a PO.
    pub fn set_symbol(&mut self, id: NodeId, symbol: String) -> Result<()> {
        self.get_mut(id)?.set_symbol(symbol)
    }

    fn check_var(&self, id: NodeId) -> Result<()> {
        if id == 0 {
            Err(AigError::IdZeroButNotConst)
        } else if id > self.max_var {
            Err(AigError::LitOutOfBounds(Lit::new(id, false).raw()))
        } else {
            Ok(())
        }
    }

    /// Wires `fanin` into `consumer`, creating an `Undef` placeholder if the
    /// fanin id has no definition, and recording the fanout back-reference.
    fn connect_fanin(&mut self, consumer: NodeId, fanin: Lit) -> Result<()> {
        if fanin.node() > self.max_var {
            return Err(AigError::LitOutOfBounds(fanin.raw()));
        }
        let slot = &mut self.nodes[fanin.node() as usize];
        let target = slot.get_or_insert_with(|| AigNode::new(fanin.node(), NodeKind::Undef));
        target.add_fanout(Lit::new(consumer, fanin.complement()));
        if let Some(c) = self.node_mut(consumer) {
            c.fanins.push(fanin);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Traversal and liveness
    // ------------------------------------------------------------------

    pub(crate) fn mark(&mut self, id: NodeId) {
        let epoch = self.epoch;
        if let Some(n) = self.node_mut(id) {
            n.mark = epoch;
        }
    }

    pub(crate) fn is_marked(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.mark) == Some(self.epoch)
    }

    /// Recomputes the active cone: a post-order DFS from every output,
    /// assigning each reachable AND a strictly increasing topological
    /// position (the constant node has position 0).
    ///
    /// Iterative on an explicit work stack, so deep chains cannot overflow
    /// the call stack. A node is expanded at most once: it is marked on first
    /// visit, before its fanins are pushed, which also stops self-referential
    /// fanins from looping.
    pub fn update_cone(&mut self) {
        self.cone.clear();
        self.epoch += 1;
        let epoch = self.epoch;
        if let Some(c) = self.nodes[0].as_mut() {
            c.mark = epoch;
            c.pos = 0;
        }
        let mut count: u32 = 1;
        for k in 0..self.outputs.len() {
            let mut stack: Vec<(NodeId, bool)> = vec![(self.outputs[k], false)];
            while let Some((id, children_done)) = stack.pop() {
                if children_done {
                    if let Some(n) = self.nodes.get_mut(id as usize).and_then(|s| s.as_mut()) {
                        if n.is_and() {
                            n.pos = count;
                            count += 1;
                            self.cone.push(id);
                        }
                    }
                    continue;
                }
                match self.nodes.get_mut(id as usize).and_then(|s| s.as_mut()) {
                    None => continue,
                    Some(n) if n.mark == epoch => continue,
                    Some(n) => {
                        n.mark = epoch;
                        stack.push((id, true));
                        for f in n.fanins.iter().rev() {
                            stack.push((f.node(), false));
                        }
                    }
                }
            }
        }
    }

    /// Recomputes the floating and unused diagnostic lists in one scan.
    pub fn classify(&mut self) {
        let mut floating = Vec::new();
        let mut unused = Vec::new();
        for id in 1..self.nodes.len() as NodeId {
            let Some(n) = self.node(id) else { continue };
            let is_floating = n
                .fanins
                .iter()
                .any(|f| self.node(f.node()).is_none_or(|g| g.is_undef()));
            if is_floating {
                floating.push(id);
            }
            if !n.is_output() && n.fanouts.is_empty() {
                unused.push(id);
            }
        }
        self.floating = floating;
        self.unused = unused;
    }

    // ------------------------------------------------------------------
    // Structural surgery shared by the rewriting passes
    // ------------------------------------------------------------------

    /// Repoints one fanin edge of `consumer` from node `old` to `new_lit`,
    /// keeping the fanout back-reference of the new target in sync.
    /// The stale back-reference on `old` is not touched; callers detach it
    /// (or delete `old` wholesale) themselves.
    pub(crate) fn repoint_fanin(&mut self, consumer: NodeId, old: NodeId, new_lit: Lit) -> Result<()> {
        {
            let c = self.get_mut(consumer)?;
            c.fanins.push(new_lit);
            let i = c
                .fanins
                .iter()
                .position(|f| f.node() == old)
                .ok_or_else(|| {
                    AigError::InvalidState(format!(
                        "node {} has no fanin to node {}",
                        consumer, old
                    ))
                })?;
            c.fanins.swap_remove(i);
        }
        if let Some(n) = self.node_mut(new_lit.node()) {
            n.add_fanout(Lit::new(consumer, new_lit.complement()));
        }
        Ok(())
    }

    /// Merges `dying` into `keeper`: every consumer of `dying` is repointed
    /// at `keeper`, with polarity additionally inverted when `flip` is set,
    /// then `dying` is detached from its fanins and deleted.
    pub(crate) fn merge_into(&mut self, dying: NodeId, keeper: NodeId, flip: bool) -> Result<()> {
        let consumers = self.get(dying)?.fanouts.clone();
        for c in consumers {
            let new_lit = Lit::new(keeper, c.complement() ^ flip);
            self.repoint_fanin(c.node(), dying, new_lit)?;
        }
        let fanins = self.get(dying)?.fanins.clone();
        for f in fanins {
            if let Some(n) = self.node_mut(f.node()) {
                n.remove_fanout_of(dying)?;
            }
        }
        self.remove_node(dying);
        Ok(())
    }

    /// Empties the table slot of `id`. The caller must have detached every
    /// edge first (except when deleting a whole dead region at once).
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<AigNode> {
        let n = self.nodes.get_mut(id as usize)?.take()?;
        if n.is_and() {
            self.num_ands -= 1;
        }
        Some(n)
    }

    pub(crate) fn clear_sim_state(&mut self) {
        self.groups.clear();
        self.group_of.clear();
        self.simulated = false;
    }

    /// Called by the rewriting passes after they changed the graph: cached
    /// partitions are stale and a previous fraig run no longer shields the
    /// network from re-simulation.
    pub(crate) fn structural_change(&mut self) {
        self.clear_sim_state();
        self.fraiged = false;
    }

    // ------------------------------------------------------------------
    // FEC reporting
    // ------------------------------------------------------------------

    /// Current FEC groups for reporting: members sorted ascending, polarity
    /// normalized so each group's first literal is positive, groups ordered
    /// by their first literal. Singletons are omitted.
    pub fn fec_groups(&self) -> Vec<Vec<Lit>> {
        let mut out: Vec<Vec<Lit>> = self
            .groups
            .iter()
            .filter(|g| !g.is_singleton())
            .map(|g| {
                let mut lits = g.lits.clone();
                lits.sort_unstable();
                if lits[0].complement() {
                    for l in &mut lits {
                        *l = !*l;
                    }
                }
                lits
            })
            .collect();
        out.sort_unstable_by_key(|g| g[0]);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // o = (i1 & i2) & !(i2 & i3), with an extra unused gate i1 & !i3
    fn sample() -> Aig {
        let mut aig = Aig::new(6);
        aig.add_input(1).unwrap();
        aig.add_input(2).unwrap();
        aig.add_input(3).unwrap();
        aig.add_and(4, Lit::new(1, false), Lit::new(2, false)).unwrap();
        aig.add_and(5, Lit::new(2, false), Lit::new(3, false)).unwrap();
        aig.add_and(6, Lit::new(4, false), Lit::new(5, true)).unwrap();
        aig.add_output(Lit::new(6, false)).unwrap();
        aig.update_cone();
        aig.classify();
        aig
    }

    #[test]
    fn construction_checks() {
        let mut aig = Aig::new(3);
        assert_eq!(aig.add_input(0), Err(AigError::IdZeroButNotConst));
        assert!(aig.add_input(1).is_ok());
        assert_eq!(aig.add_input(1), Err(AigError::DuplicateId(1)));
        assert_eq!(aig.add_input(4), Err(AigError::LitOutOfBounds(8)));
        assert!(aig.add_and(2, Lit::new(1, false), Lit::new(1, true)).is_ok());
        assert_eq!(
            aig.add_and(2, Lit::FALSE, Lit::FALSE),
            Err(AigError::DuplicateId(2))
        );
        assert_eq!(
            aig.add_and(3, Lit::from_raw(9), Lit::FALSE),
            Err(AigError::LitOutOfBounds(9))
        );
    }

    #[test]
    fn failed_add_and_leaves_no_partial_node() {
        let mut aig = Aig::new(3);
        aig.add_input(1).unwrap();
        // second fanin out of bounds: nothing must have been created
        assert_eq!(
            aig.add_and(2, Lit::new(1, false), Lit::from_raw(9)),
            Err(AigError::LitOutOfBounds(9))
        );
        assert!(aig.node(2).is_none());
        assert_eq!(aig.num_ands(), 0);
        assert!(aig.node(1).unwrap().fanouts().is_empty());
    }

    #[test]
    fn undef_placeholder_then_definition() {
        let mut aig = Aig::new(4);
        aig.add_input(1).unwrap();
        // gate 3 referenced before being defined
        aig.add_and(2, Lit::new(3, true), Lit::new(1, false)).unwrap();
        assert!(aig.node(3).unwrap().is_undef());
        aig.add_and(3, Lit::new(1, false), Lit::new(1, false)).unwrap();
        let n3 = aig.node(3).unwrap();
        assert!(n3.is_and());
        assert_eq!(n3.fanouts(), &[Lit::new(2, true)]);
    }

    #[test]
    fn cone_is_topological() {
        let aig = sample();
        assert_eq!(aig.cone(), &[4, 5, 6]);
        assert!(aig.node(4).unwrap().pos() < aig.node(6).unwrap().pos());
        assert!(aig.node(5).unwrap().pos() < aig.node(6).unwrap().pos());
        assert_eq!(aig.node(0).unwrap().pos(), 0);
    }

    #[test]
    fn classify_floating_and_unused() {
        let mut aig = Aig::new(8);
        aig.add_input(1).unwrap();
        aig.add_and(2, Lit::new(1, false), Lit::new(5, false)).unwrap(); // 5 undefined
        aig.add_output(Lit::new(2, false)).unwrap();
        aig.add_and(3, Lit::new(1, true), Lit::new(1, false)).unwrap(); // unused
        aig.update_cone();
        aig.classify();
        assert_eq!(aig.floating(), &[2]);
        // the placeholder 5 is consumed by gate 2, so it is not unused
        assert!(aig.node(5).unwrap().is_undef());
        assert_eq!(aig.unused(), &[3]);
    }

    #[test]
    fn output_literals() {
        let aig = sample();
        assert_eq!(aig.output_lits(), vec![Lit::new(6, false)]);
    }

    #[test]
    fn merge_repoints_consumers() {
        let mut aig = sample();
        // merge 5 into 4 with a polarity flip
        aig.merge_into(5, 4, true).unwrap();
        assert!(aig.node(5).is_none());
        let n6 = aig.node(6).unwrap();
        // 6 had fanins (4, !5); !5 becomes !(!4) = 4
        assert_eq!(n6.fanins().len(), 2);
        assert!(n6.fanins().contains(&Lit::new(4, false)));
        assert_eq!(
            n6.fanins().iter().filter(|f| f.node() == 4).count(),
            2
        );
        assert_eq!(aig.num_ands(), 2);
        // node 4 now carries both fanout entries of node 6
        assert_eq!(
            aig.node(4).unwrap().fanouts().iter().filter(|f| f.node() == 6).count(),
            2
        );
    }
}
