//! AIG nodes. See [`AigNode`].

use crate::aig::error::{AigError, Result};
use crate::aig::lit::{Lit, NodeId};

/// The variant tag of a node. Closed set: there is no other kind of node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The constant low/false signal, always id 0.
    Const,
    /// A primary input.
    Input,
    /// A primary output. Exactly one fanin, never feeds anything.
    Output,
    /// An AND gate with two fanins.
    And,
    /// A placeholder for an id that was referenced but never defined.
    Undef,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Const => "CONST",
            NodeKind::Input => "PI",
            NodeKind::Output => "PO",
            NodeKind::And => "AIG",
            NodeKind::Undef => "UNDEF",
        }
    }
}

/// An AIG node. Owned by the manager's table, referenced by id only.
///
/// Inversion lives on edges, so a node is fully described by its kind and its
/// fanin literals. `fanouts` is the derived back-reference list: one literal
/// `2 * consumer + p` per fanin edge of polarity `p` pointing at this node.
/// A consumer wired to both polarities therefore appears twice.
///
/// Internal note: nodes carry their fanouts with them. Make sure to update
/// this correctly on every structural mutation.
#[derive(Debug, Clone)]
pub struct AigNode {
    id: NodeId,
    kind: NodeKind,
    pub(crate) fanins: Vec<Lit>,
    pub(crate) fanouts: Vec<Lit>,
    /// Topological position within the active cone (0 for the constant).
    pub(crate) pos: u32,
    /// 64 parallel simulation patterns.
    pub(crate) sim: u64,
    /// Epoch stamp; marked iff equal to the manager's current epoch.
    pub(crate) mark: u64,
    symbol: Option<String>,
}

impl PartialEq for AigNode {
    /// Compares id, kind and fanins. Fanouts, positions and signatures are
    /// derived state and do not take part in equality.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind && self.fanins == other.fanins
    }
}

impl Eq for AigNode {}

impl AigNode {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        AigNode {
            id,
            kind,
            fanins: Vec::new(),
            fanouts: Vec::new(),
            pos: 0,
            sim: 0,
            mark: 0,
            symbol: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_const(&self) -> bool {
        self.kind == NodeKind::Const
    }

    pub fn is_input(&self) -> bool {
        self.kind == NodeKind::Input
    }

    pub fn is_output(&self) -> bool {
        self.kind == NodeKind::Output
    }

    pub fn is_and(&self) -> bool {
        self.kind == NodeKind::And
    }

    pub fn is_undef(&self) -> bool {
        self.kind == NodeKind::Undef
    }

    /// Fanin literals, in definition order. Empty for Const/Input/Undef,
    /// one literal for Output, two for And.
    pub fn fanins(&self) -> &[Lit] {
        &self.fanins
    }

    /// Back-references to consumers (see the struct doc for the encoding).
    pub fn fanouts(&self) -> &[Lit] {
        &self.fanouts
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Topological position from the last cone computation.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Current simulation signature.
    pub fn sim(&self) -> u64 {
        self.sim
    }

    pub(crate) fn set_symbol(&mut self, symbol: String) -> Result<()> {
        if !(self.is_input() || self.is_output()) {
            return Err(AigError::SymbolNotAllowed(self.id));
        }
        if self.symbol.is_some() {
            return Err(AigError::DuplicateSymbol(self.id));
        }
        self.symbol = Some(symbol);
        Ok(())
    }

    /// Turns an [`Undef`](NodeKind::Undef) placeholder into an AND gate,
    /// keeping the id and the fanouts accumulated so far.
    pub(crate) fn define_as_and(&mut self) -> Result<()> {
        if !self.is_undef() {
            return Err(AigError::DuplicateId(self.id));
        }
        self.kind = NodeKind::And;
        Ok(())
    }

    pub(crate) fn add_fanout(&mut self, consumer: Lit) {
        self.fanouts.push(consumer);
    }

    /// Removes one fanout entry pointing at `consumer`, whatever its polarity.
    /// A consumer wired to both polarities holds two entries, so a double
    /// detach needs two calls.
    pub(crate) fn remove_fanout_of(&mut self, consumer: NodeId) -> Result<()> {
        match self.fanouts.iter().position(|f| f.node() == consumer) {
            Some(i) => {
                self.fanouts.swap_remove(i);
                Ok(())
            }
            None => Err(AigError::InvalidState(format!(
                "node {} has no fanout to node {}",
                self.id, consumer
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fanout_detach_by_id() {
        let mut n = AigNode::new(3, NodeKind::And);
        n.add_fanout(Lit::new(7, false));
        n.add_fanout(Lit::new(7, true));
        n.add_fanout(Lit::new(8, false));
        assert!(n.remove_fanout_of(7).is_ok());
        assert!(n.remove_fanout_of(7).is_ok());
        assert!(n.remove_fanout_of(7).is_err());
        assert_eq!(n.fanouts(), &[Lit::new(8, false)]);
    }

    #[test]
    fn undef_redefinition() {
        let mut n = AigNode::new(5, NodeKind::Undef);
        n.add_fanout(Lit::new(9, true));
        assert!(n.define_as_and().is_ok());
        assert!(n.is_and());
        // fanouts accumulated while undefined survive
        assert_eq!(n.fanouts(), &[Lit::new(9, true)]);
        assert!(n.define_as_and().is_err());
    }

    #[test]
    fn symbols_restricted_to_ios() {
        let mut pi = AigNode::new(1, NodeKind::Input);
        assert!(pi.set_symbol("reset".to_string()).is_ok());
        assert!(pi.set_symbol("again".to_string()).is_err());
        let mut and = AigNode::new(2, NodeKind::And);
        assert!(and.set_symbol("nope".to_string()).is_err());
    }
}
