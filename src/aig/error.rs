use thiserror::Error;

use super::NodeId;

/// The result of an AIG operation.
pub type Result<T> = std::result::Result<T, AigError>;

/// Error returned when an AIG operation failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AigError {
    /// A different node with the given id already exists.
    #[error("a different node with id={0} already exists")]
    DuplicateId(NodeId),

    /// The id 0 is reserved for the constant node only.
    #[error("id=0 is for the constant node only")]
    IdZeroButNotConst,

    /// The node with given id does not exist.
    #[error("node with id={0} does not exist")]
    NodeDoesNotExist(NodeId),

    /// A literal refers past the declared maximum variable index.
    #[error("literal {0} exceeds the maximum variable index")]
    LitOutOfBounds(u32),

    /// Symbols can only be attached to primary inputs and outputs.
    #[error("node {0} is not a PI or a PO and cannot carry a symbol")]
    SymbolNotAllowed(NodeId),

    /// The node already carries a symbolic name.
    #[error("node {0} already carries a symbolic name")]
    DuplicateSymbol(NodeId),

    /// The AIG has reached an invalid state. This should never happen.
    /// For example, a fanout back-reference should always have a matching
    /// fanin edge. If this error is raised, my code is garbage.
    #[error("the AIG has reached an invalid state - this should not happen - error: {0}")]
    InvalidState(String),

    /// Just forwarding a [`ParserError`].
    #[error("{0}")]
    ParserError(#[from] ParserError),

    /// Just forwarding a [`PatternError`].
    #[error("{0}")]
    PatternError(#[from] PatternError),

    /// The SAT backend failed to solve a query.
    #[error("sat solver error: {0}")]
    SatError(String),
}

/// Error returned when parsing from file failed.
///
/// It is defined here because the `parser` module is private.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParserError {
    /// All features are not supported (only the basics in fact).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Invalid token, something else was expected.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// An IO error occured (file doesn't exist, or doesn't have the right extension, ...).
    #[error("io error: {0}")]
    IoError(String),
}

/// Error returned on a malformed line of a simulation pattern file.
///
/// Recoverable: batches completed before the offending line are kept,
/// see [`Aig::file_sim`].
///
/// [`Aig::file_sim`]: super::Aig::file_sim
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern width does not match the number of primary inputs.
    #[error("pattern '{pattern}' length does not match the number of inputs ({expected})")]
    WidthMismatch { pattern: String, expected: usize },

    /// The pattern contains a character other than '0' or '1'.
    #[error("pattern '{pattern}' contains a non-0/1 value '{found}'")]
    NonBinary { pattern: String, found: char },
}
