//! A [`Lit`] refers to an [`AigNode`] by id and can be complemented
//! (indicates the presence of a NOT on the edge).
//!
//! [`AigNode`]: crate::AigNode

use std::fmt;
use std::ops::Not;

/// A node id.
///
/// The constant node has id 0 by convention. Also, id must be unique.
pub type NodeId = u32;

/// A literal: `2 * id + polarity`.
///
/// This is the AIGER encoding. Every edge of the graph (fanin, fanout
/// back-reference, primary-output target) is stored as a literal, so inversion
/// lives on the edge and not on the node.
///
/// ```rust
/// use fraig::Lit;
/// let x = Lit::new(3, false);
/// assert_eq!(x.raw(), 6);
/// assert_eq!((!x).raw(), 7);
/// assert_eq!(!!x, x);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    /// The constant-false literal (node 0, non-inverted).
    pub const FALSE: Lit = Lit(0);
    /// The constant-true literal (node 0, inverted).
    pub const TRUE: Lit = Lit(1);

    pub fn new(id: NodeId, complement: bool) -> Self {
        Lit(2 * id + complement as u32)
    }

    /// Builds a literal from its AIGER encoding.
    pub fn from_raw(raw: u32) -> Self {
        Lit(raw)
    }

    /// The AIGER encoding of the literal.
    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn node(self) -> NodeId {
        self.0 >> 1
    }

    pub fn complement(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn is_cst_false(self) -> bool {
        self == Lit::FALSE
    }

    pub fn is_cst_true(self) -> bool {
        self == Lit::TRUE
    }

    pub fn is_complement_of(self, other: Lit) -> bool {
        self.0 ^ other.0 == 1
    }
}

impl Not for Lit {
    type Output = Self;

    fn not(self) -> Self::Output {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.complement() { "!" } else { "" }, self.node())
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lit_encoding() {
        let x = Lit::new(21, true);
        assert_eq!(x.raw(), 43);
        assert_eq!(x.node(), 21);
        assert!(x.complement());
        assert_eq!(Lit::from_raw(43), x);
    }

    #[test]
    fn lit_not() {
        let x = Lit::new(4, false);
        assert_eq!(!x, Lit::new(4, true));
        assert_eq!(!!x, x);
        assert!(x.is_complement_of(!x));
        assert!(!x.is_complement_of(Lit::new(5, true)));
    }

    #[test]
    fn lit_constants() {
        assert_eq!(Lit::FALSE.raw(), 0);
        assert_eq!(Lit::TRUE.raw(), 1);
        assert!(Lit::FALSE.is_cst_false());
        assert!(Lit::TRUE.is_cst_true());
        assert_eq!(!Lit::FALSE, Lit::TRUE);
    }
}
