//! The escrow state machine.
//!
//! A [`SwapRegistry`] records each proposed exchange as a commitment keyed by
//! a fresh identifier, verifies resupplied terms against that commitment on
//! every later call, settles or voids the swap, and accounts the currency
//! owed to each party until they withdraw it.
//!
//! Every operation executes to completion before another is observed: the
//! registry is deliberately `!Sync`, so admission order is the program order
//! of calls at the API boundary. For open swaps this is the tie-break policy:
//! strict first-in-first-out, the first qualifying `complete` wins.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::asset::{self, AssetHost, TransferContext};
use crate::events::SwapEvent;
use crate::ledger::BalanceLedger;
use crate::swap::{Address, AssetKind, SwapCommitment, SwapId, SwapProposal, FIRST_SWAP_ID};

/// Registry state machine errors. Lookup failures deliberately do not
/// distinguish "never existed", "already settled" and "tampered proposal":
/// all three read as [`Error::UnknownSwap`].
#[derive(Error, Debug)]
pub enum Error {
    /// The caller is not the party this operation belongs to.
    #[error("Caller is not allowed to perform this operation")]
    WrongCaller,
    /// A proposal must expire strictly in the future.
    #[error("Expiry must be strictly in the future")]
    NotFutureExpiry,
    /// The proposal's expiry has passed.
    #[error("The proposal has expired")]
    Expired,
    /// At most one side of a proposal may carry a currency portion.
    #[error("At most one side may carry a currency portion")]
    BothCurrencyPortions,
    /// The attached currency does not match the expected portion.
    #[error("Attached currency {attached} does not match the expected portion {expected}")]
    CurrencyMismatch {
        /// The portion the proposal requires.
        expected: u128,
        /// What the caller attached.
        attached: u128,
    },
    /// An open swap cannot offer a unique item to an unnamed acceptor.
    #[error("An open swap cannot ask for a unique item")]
    OpenUniqueAcceptor,
    /// No live commitment matches the identifier and the supplied terms.
    #[error("No live swap matches identifier {0} and the supplied terms")]
    UnknownSwap(SwapId),
    /// A guarded operation was re-entered from a transfer callback.
    #[error("Reentrant call rejected")]
    ReentrantCall,
    /// The caller has no balance to withdraw.
    #[error("Nothing to withdraw")]
    EmptyWithdrawal,
    /// The withdrawal payout failed. The balance entry is already zero; this
    /// error is the caller's only notice.
    #[error("Payout of {amount} to {party} failed: {reason}")]
    PayoutFailed {
        /// The party whose payout failed.
        party: Address,
        /// The amount that was not paid out.
        amount: u128,
        /// The payout rail's own failure.
        reason: asset::HostError,
    },
    /// An asset validation or transfer dispatch error.
    #[error("Asset error: {0}")]
    Asset(#[from] asset::Error),
}

/// Readiness report for a live swap, as returned by [`SwapRegistry::status`].
/// Each flag names something still missing; `is_ready` is the conjunction of
/// all four checks, vacuously true for bare sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStatus {
    pub needs_ownership_initiator: bool,
    pub needs_authority_initiator: bool,
    pub needs_ownership_acceptor: bool,
    pub needs_authority_acceptor: bool,
    pub is_ready: bool,
}

/// Owns every piece of durable escrow state: the commitment map, the
/// identifier counter, the balance ledger and the event log, plus the two
/// call-scoped flags that only live for the duration of one guarded
/// operation.
///
/// Caller identity, the current time and attached currency are execution
/// environment side channels in spirit; here they are explicit parameters.
pub struct SwapRegistry {
    operator: Address,
    commitments: RefCell<HashMap<SwapId, SwapCommitment>>,
    next_id: Cell<u64>,
    ledger: RefCell<BalanceLedger>,
    events: RefCell<Vec<SwapEvent>>,
    /// Set while a guarded operation is on the stack.
    entered: Cell<bool>,
    /// Set while settling a swap whose legs share one asset contract.
    same_counterparty: Cell<bool>,
}

/// Call-scoped guard: flips the entered flag and the same-counterparty
/// scratch on entry and restores both on every exit path, early returns
/// included, through `Drop`.
struct CallScope<'a> {
    entered: &'a Cell<bool>,
    same_counterparty: &'a Cell<bool>,
}

impl<'a> CallScope<'a> {
    fn enter(registry: &'a SwapRegistry, same_counterparty: bool) -> Result<Self, Error> {
        if registry.entered.get() {
            return Err(Error::ReentrantCall);
        }
        registry.entered.set(true);
        registry.same_counterparty.set(same_counterparty);
        Ok(CallScope {
            entered: &registry.entered,
            same_counterparty: &registry.same_counterparty,
        })
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.entered.set(false);
        self.same_counterparty.set(false);
    }
}

impl SwapRegistry {
    /// Create a registry acting under `operator`'s transfer authority. The
    /// operator identity is what asset contracts see as the party moving
    /// assets on the participants' behalf.
    pub fn new(operator: Address) -> Self {
        SwapRegistry {
            operator,
            commitments: RefCell::new(HashMap::new()),
            next_id: Cell::new(FIRST_SWAP_ID.0),
            ledger: RefCell::new(BalanceLedger::new()),
            events: RefCell::new(Vec::new()),
            entered: Cell::new(false),
            same_counterparty: Cell::new(false),
        }
    }

    /// The identity under whose authority this registry moves assets.
    pub fn operator(&self) -> Address {
        self.operator
    }

    /// True while the registry is settling a swap whose two legs reference
    /// the same asset contract. Only meaningful from within a transfer
    /// callback; always false between operations.
    pub fn same_counterparty(&self) -> bool {
        self.same_counterparty.get()
    }

    /// Current withdrawable balance of `party`.
    pub fn balance_of(&self, party: Address) -> u128 {
        self.ledger.borrow().balance_of(party)
    }

    /// Drain the accumulated notifications in emission order.
    pub fn drain_events(&self) -> Vec<SwapEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    fn emit(&self, event: SwapEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Verify that a live commitment binds `swap_id` to exactly `proposal`,
    /// returning the commitment for later use.
    fn verify(&self, swap_id: SwapId, proposal: &SwapProposal) -> Result<SwapCommitment, Error> {
        let commitment = proposal.commitment();
        match self.commitments.borrow().get(&swap_id) {
            Some(stored) if *stored == commitment => Ok(commitment),
            _ => Err(Error::UnknownSwap(swap_id)),
        }
    }

    /// Record a new proposal and return its identifier.
    ///
    /// `attached` is the currency the caller locks alongside the proposal;
    /// it must equal the initiator portion exactly, and is the only way that
    /// portion can ever be funded. The emitted [`SwapEvent::Initiated`]
    /// carries the normalized proposal the counterparty must resupply.
    pub fn initiate(
        &self,
        caller: Address,
        now: u64,
        proposal: &SwapProposal,
        attached: u128,
    ) -> Result<SwapId, Error> {
        if caller != proposal.initiator {
            return Err(Error::WrongCaller);
        }
        if proposal.expiry <= now {
            return Err(Error::NotFutureExpiry);
        }
        if proposal.initiator_currency != 0 && proposal.acceptor_currency != 0 {
            return Err(Error::BothCurrencyPortions);
        }
        if attached != proposal.initiator_currency {
            return Err(Error::CurrencyMismatch {
                expected: proposal.initiator_currency,
                attached,
            });
        }
        if proposal.is_open() && proposal.acceptor_leg.kind == AssetKind::Unique {
            return Err(Error::OpenUniqueAcceptor);
        }
        // At most one portion is non-zero at this point.
        let currency = proposal.initiator_currency + proposal.acceptor_currency;
        asset::validate_leg(&proposal.initiator_leg, currency)?;
        asset::validate_leg(&proposal.acceptor_leg, currency)?;

        let proposal = proposal.normalized();
        let swap_id = SwapId(self.next_id.get());
        self.next_id.set(swap_id.0 + 1);
        self.commitments
            .borrow_mut()
            .insert(swap_id, proposal.commitment());

        debug!(swap_id = swap_id.0, "proposal recorded");
        self.emit(SwapEvent::Initiated {
            swap_id,
            initiator: proposal.initiator,
            acceptor: proposal.acceptor,
            proposal,
        });
        Ok(swap_id)
    }

    /// Settle a live swap: verify the resupplied terms, credit both currency
    /// portions, and move both legs through the host.
    ///
    /// The commitment is erased before any external call, so a second
    /// completion attempt, reentrant or not, reads "no commitment" from that
    /// point on. If a transfer fails, the registry's own mutations are rolled
    /// back and the dispatch error is surfaced; voiding an already-executed
    /// external leg is the host's concern.
    pub fn complete(
        &self,
        host: &dyn AssetHost,
        caller: Address,
        now: u64,
        swap_id: SwapId,
        proposal: &SwapProposal,
        attached: u128,
    ) -> Result<(), Error> {
        let _scope = CallScope::enter(self, proposal.same_counterparty_contract())?;

        if now > proposal.expiry {
            return Err(Error::Expired);
        }
        let commitment = self.verify(swap_id, proposal)?;
        let acceptor = if proposal.is_open() {
            caller
        } else {
            proposal.acceptor
        };
        if caller != acceptor {
            return Err(Error::WrongCaller);
        }
        if proposal.initiator_currency != 0 && attached != 0 {
            return Err(Error::BothCurrencyPortions);
        }
        if attached != proposal.acceptor_currency {
            return Err(Error::CurrencyMismatch {
                expected: proposal.acceptor_currency,
                attached,
            });
        }

        self.commitments.borrow_mut().remove(&swap_id);
        {
            let mut ledger = self.ledger.borrow_mut();
            ledger.credit(proposal.initiator, attached);
            ledger.credit(acceptor, proposal.initiator_currency);
        }

        let ctx = TransferContext {
            operator: self.operator,
            same_counterparty: self.same_counterparty.get(),
        };

        // No RefCell borrow is held across the host calls: a hostile
        // callback re-entering the registry must reach the guard, not a
        // borrow failure.
        let outcome = asset::execute_transfer(
            host,
            &proposal.initiator_leg,
            proposal.initiator,
            acceptor,
            &ctx,
        )
        .and_then(|()| {
            asset::execute_transfer(host, &proposal.acceptor_leg, acceptor, proposal.initiator, &ctx)
        });

        if let Err(err) = outcome {
            {
                let mut ledger = self.ledger.borrow_mut();
                ledger.revert_credit(proposal.initiator, attached);
                ledger.revert_credit(acceptor, proposal.initiator_currency);
            }
            self.commitments.borrow_mut().insert(swap_id, commitment);
            return Err(err.into());
        }

        info!(swap_id = swap_id.0, "swap settled");
        self.emit(SwapEvent::Complete {
            swap_id,
            initiator: proposal.initiator,
            acceptor,
            proposal: proposal.normalized(),
        });
        Ok(())
    }

    /// Void a live swap. Only the initiator may remove, and removal is the
    /// only recovery path for a currency portion locked at initiation. There
    /// is no expiry check: an expired swap is unwound exactly this way.
    pub fn remove(
        &self,
        caller: Address,
        swap_id: SwapId,
        proposal: &SwapProposal,
    ) -> Result<(), Error> {
        let _scope = CallScope::enter(self, proposal.same_counterparty_contract())?;

        self.verify(swap_id, proposal)?;
        if caller != proposal.initiator {
            return Err(Error::WrongCaller);
        }

        self.commitments.borrow_mut().remove(&swap_id);
        self.ledger
            .borrow_mut()
            .credit(proposal.initiator, proposal.initiator_currency);

        debug!(swap_id = swap_id.0, "proposal removed");
        self.emit(SwapEvent::Removed {
            swap_id,
            initiator: proposal.initiator,
        });
        Ok(())
    }

    /// Drain the caller's currency balance and pay it out through the host.
    ///
    /// The entry is zeroed before the payout, so a repeated or reentrant
    /// withdrawal observes nothing left. A failed payout is terminal: the
    /// entry stays zero and [`Error::PayoutFailed`] is the caller's notice,
    /// never a phantom balance.
    pub fn withdraw(&self, host: &dyn AssetHost, caller: Address) -> Result<u128, Error> {
        let amount = self.ledger.borrow_mut().take(caller);
        if amount == 0 {
            return Err(Error::EmptyWithdrawal);
        }
        host.pay(caller, amount).map_err(|reason| Error::PayoutFailed {
            party: caller,
            amount,
            reason,
        })?;

        info!(party = %caller, amount = amount, "balance withdrawn");
        self.emit(SwapEvent::BalanceWithdrawn {
            party: caller,
            amount,
        });
        Ok(amount)
    }

    /// Report whether both sides of a live swap could settle right now: per
    /// non-bare side, whether the named party holds enough of the asset and
    /// whether this registry's transfer authority over it suffices. For an
    /// open proposal the acceptor side is checked against the wildcard
    /// identity and reports insufficiency until a concrete acceptor exists.
    pub fn status(
        &self,
        host: &dyn AssetHost,
        swap_id: SwapId,
        proposal: &SwapProposal,
    ) -> Result<SwapStatus, Error> {
        self.verify(swap_id, proposal)?;

        let initiator = asset::leg_status(
            host,
            &proposal.initiator_leg,
            proposal.initiator,
            self.operator,
        );
        let acceptor = asset::leg_status(
            host,
            &proposal.acceptor_leg,
            proposal.acceptor,
            self.operator,
        );

        Ok(SwapStatus {
            needs_ownership_initiator: initiator.needs_ownership,
            needs_authority_initiator: initiator.needs_authority,
            needs_ownership_acceptor: acceptor.needs_ownership,
            needs_authority_acceptor: acceptor.needs_authority,
            is_ready: initiator.ready() && acceptor.ready(),
        })
    }
}
