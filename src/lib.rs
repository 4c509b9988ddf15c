//! Barter core library.
//!
//! A commitment-verified escrow for bilateral asset swaps: one party records
//! the terms of an exchange as a hash commitment, the counterparty settles by
//! resupplying those exact terms, and both sides' assets (plus an optional
//! currency sweetener) move atomically through a kind-dispatched transfer
//! layer. The registry never stores a proposal, only its commitment; callers
//! reconstruct proposals from the emitted event log.

use thiserror::Error;

pub mod asset;
pub mod consensus;
pub mod events;
mod hash;
pub mod ledger;
pub mod registry;
pub mod swap;

/// A list of possible errors when operating the escrow through the **Barter**
/// software stack. Each error can have multiple levels down to the external
/// asset contracts.
#[derive(Error, Debug)]
pub enum Error {
    /// A consensus error during an encoding/decoding operation or a data type
    /// mismatch.
    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus::Error),
    /// An asset parameter validation or transfer dispatch error.
    #[error("Asset error: {0}")]
    Asset(#[from] asset::Error),
    /// A registry state machine error.
    #[error("Registry error: {0}")]
    Registry(#[from] registry::Error),
}
