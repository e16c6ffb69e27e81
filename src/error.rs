//! Error types for chain validation and mining.

use thiserror::Error;

use crate::types::Position;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("missing parent {parent} for block {block}")]
    MissingParent { block: String, parent: String },

    #[error("pixel at {position} already mined")]
    PixelMined { position: Position },

    #[error("coinbase at {position} has no adjacent pixel")]
    NotAdjacent { position: Position },

    #[error("signature mismatch for transaction {txid} at index {index} of block {block}")]
    SignatureMismatch {
        txid: String,
        block: String,
        index: usize,
    },

    #[error("cannot sign a transaction without previous transaction info")]
    NoPreviousTxInfo,

    #[error("invalid proof of work: {0}")]
    InvalidProofOfWork(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
