//! Error type shared by the whole crate.

use std::io;

use thiserror::Error;

/// Errors raised while fixing weights, evaluating circuits or reading examples.
///
/// Atoms that are missing from a compiled circuit are not errors: they are reported
/// through [`Reporter`][crate::report::Reporter] and skipped.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw weight or parameter does not have any recognised shape.
    #[error("schema error: {0}")]
    Schema(String),

    /// An example block has observations but no total utility, e.g. `utility(5).`
    #[error("example block {block} is missing the total utility, e.g. utility(5).")]
    MissingUtility { block: usize },

    /// An annotated disjunction mixes decision and probabilistic alternatives.
    #[error("annotated disjunction mixes decisions and probabilities")]
    InvalidDecisionMix,

    /// The evidence has zero probability.
    #[error("inconsistent evidence: the evidence has probability zero")]
    InconsistentEvidence,

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
