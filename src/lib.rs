pub mod aig;
pub mod fraig;
pub mod opt;
pub mod sat;
pub mod sim;

// Re-exporting symbols and modules.
pub use aig::{
    Aig, AigError, AigNode, Lit, NodeId, NodeKind, ParserError, PatternError, Result,
};
pub use sat::{SatOracle, SatVar, VarisatOracle};
pub use sim::FecGroup;
