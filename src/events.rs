//! Notifications emitted by the registry.
//!
//! The registry stores commitments, never proposals, so the initiation event
//! is the one place a counterparty can recover the full terms it must later
//! resupply. Settled and voided swaps read as "does not exist" from the
//! registry; outcome tracking belongs to this log.

use serde::{Deserialize, Serialize};

use crate::swap::{Address, SwapId, SwapProposal};

/// Everything the registry tells the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapEvent {
    /// A proposal was recorded. The carried proposal must be resupplied
    /// verbatim to complete, remove or query the swap.
    Initiated {
        swap_id: SwapId,
        initiator: Address,
        acceptor: Address,
        proposal: SwapProposal,
    },
    /// Both legs settled. `acceptor` is the resolved party, even when the
    /// proposal was open.
    Complete {
        swap_id: SwapId,
        initiator: Address,
        acceptor: Address,
        proposal: SwapProposal,
    },
    /// The initiator withdrew the proposal before completion.
    Removed { swap_id: SwapId, initiator: Address },
    /// A party drained their currency balance.
    BalanceWithdrawn { party: Address, amount: u128 },
}
