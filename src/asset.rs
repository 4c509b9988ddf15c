//! Asset-transfer dispatch.
//!
//! The escrow core never talks to an asset contract directly; it goes through
//! the [`AssetHost`] capability surface and selects the right validate, check
//! and transfer behavior by matching on [`AssetKind`]. The four kinds are a
//! closed set, so the dispatch is an exhaustive match rather than a trait
//! object per kind, and adding a kind is a localized change.

use std::error;

use thiserror::Error;

use crate::swap::{Address, AssetKind, AssetLeg, TokenId};

/// Failure payload surfaced by host transfer and payout calls.
pub type HostError = Box<dyn error::Error + Send + Sync>;

/// Validation and transfer dispatch errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The leg requires an asset contract but none was given.
    #[error("Missing asset contract on a {0:?} leg")]
    MissingContract(AssetKind),
    /// The leg requires a positive quantity.
    #[error("Zero quantity on a {0:?} leg")]
    ZeroQuantity(AssetKind),
    /// A bare leg is only meaningful when the proposal moves currency.
    #[error("A bare leg must be balanced by a currency portion")]
    UnbackedBareLeg,
    /// The fungible transfer was rejected by the asset contract.
    #[error("Fungible transfer of {quantity} via {contract} failed: {reason}")]
    FungibleTransferFailed {
        /// The fungible contract that rejected the transfer.
        contract: Address,
        /// The quantity that failed to move.
        quantity: u128,
        /// The contract's own failure.
        reason: HostError,
    },
    /// The underlying unique or semi-fungible transfer call failed.
    #[error("Transfer rejected: {0}")]
    TransferRejected(HostError),
}

/// Read-only context handed to every transfer callback.
#[derive(Debug, Clone, Copy)]
pub struct TransferContext {
    /// The registry identity under whose authority the transfer executes.
    pub operator: Address,
    /// True when both legs of the swap being settled reference the same
    /// asset contract.
    pub same_counterparty: bool,
}

/// Capabilities the escrow core needs from the outside world: "transfer
/// asset A from X to Y", "does X hold/allow asset A", and a native-currency
/// payout rail for withdrawals.
///
/// Host methods take `&self`; implementations carry their own interior
/// mutability. A transfer callback is therefore free to attempt a nested
/// call back into the registry, and it is the registry's guard, not the
/// borrow checker, that rejects it.
pub trait AssetHost {
    /// Fungible balance of `owner` on `contract`.
    fn fungible_balance(&self, contract: Address, owner: Address) -> u128;
    /// Quantity `operator` may currently move out of `owner`'s balance.
    fn fungible_allowance(&self, contract: Address, owner: Address, operator: Address) -> u128;
    /// Move `quantity` fungible units from `from` to `to`.
    fn transfer_fungible(
        &self,
        contract: Address,
        from: Address,
        to: Address,
        quantity: u128,
        ctx: &TransferContext,
    ) -> Result<(), HostError>;

    /// Current owner of a unique item, if the item exists.
    fn unique_owner(&self, contract: Address, token_id: TokenId) -> Option<Address>;
    /// Whether `operator` is approved to move the given unique item.
    fn unique_approved(&self, contract: Address, token_id: TokenId, operator: Address) -> bool;
    /// Move a unique item from `from` to `to`.
    fn transfer_unique(
        &self,
        contract: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
        ctx: &TransferContext,
    ) -> Result<(), HostError>;

    /// Balance of `owner` in item `token_id` on a semi-fungible contract.
    fn semi_fungible_balance(&self, contract: Address, owner: Address, token_id: TokenId)
        -> u128;
    /// Whether `operator` is an approved operator for `owner` on `contract`.
    fn semi_fungible_operator(&self, contract: Address, owner: Address, operator: Address)
        -> bool;
    /// Move `quantity` of item `token_id` from `from` to `to`.
    fn transfer_semi_fungible(
        &self,
        contract: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
        quantity: u128,
        ctx: &TransferContext,
    ) -> Result<(), HostError>;

    /// Pay out `amount` of native currency to `to`.
    fn pay(&self, to: Address, amount: u128) -> Result<(), HostError>;
}

/// Ownership and authority snapshot for one leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegStatus {
    /// The named owner does not currently hold enough of the asset.
    pub needs_ownership: bool,
    /// The operator's transfer authority over the asset is insufficient.
    pub needs_authority: bool,
}

impl LegStatus {
    /// True when neither check found anything missing.
    pub fn ready(&self) -> bool {
        !self.needs_ownership && !self.needs_authority
    }
}

/// Validate a leg's parameters at initiation time. `proposal_currency` is
/// the currency the proposal as a whole moves (at most one side's portion is
/// non-zero): a bare leg is only admitted when that value is positive, so a
/// proposal can never exchange nothing for nothing.
pub fn validate_leg(leg: &AssetLeg, proposal_currency: u128) -> Result<(), Error> {
    match leg.kind {
        AssetKind::None => {
            if proposal_currency == 0 {
                return Err(Error::UnbackedBareLeg);
            }
            Ok(())
        }
        AssetKind::Fungible | AssetKind::SemiFungible => {
            if leg.contract.is_zero() {
                return Err(Error::MissingContract(leg.kind));
            }
            if leg.quantity == 0 {
                return Err(Error::ZeroQuantity(leg.kind));
            }
            Ok(())
        }
        AssetKind::Unique => {
            // Quantity is implicitly one and normalized away.
            if leg.contract.is_zero() {
                return Err(Error::MissingContract(leg.kind));
            }
            Ok(())
        }
    }
}

/// Query the host for whether `owner` could settle `leg` right now under
/// `operator`'s authority. Bare legs are vacuously ready.
pub fn leg_status(
    host: &dyn AssetHost,
    leg: &AssetLeg,
    owner: Address,
    operator: Address,
) -> LegStatus {
    match leg.kind {
        AssetKind::None => LegStatus::default(),
        AssetKind::Fungible => LegStatus {
            needs_ownership: host.fungible_balance(leg.contract, owner) < leg.quantity,
            needs_authority: host.fungible_allowance(leg.contract, owner, operator)
                < leg.quantity,
        },
        AssetKind::SemiFungible => LegStatus {
            needs_ownership: host.semi_fungible_balance(leg.contract, owner, leg.token_id)
                < leg.quantity,
            needs_authority: !host.semi_fungible_operator(leg.contract, owner, operator),
        },
        AssetKind::Unique => LegStatus {
            needs_ownership: host.unique_owner(leg.contract, leg.token_id) != Some(owner),
            needs_authority: !host.unique_approved(leg.contract, leg.token_id, operator),
        },
    }
}

/// Move `leg` from `from` to `to` through the host. Bare legs are a no-op.
/// A failed fungible transfer is wrapped with the contract and quantity for
/// diagnosis; unique and semi-fungible failures propagate the host's own
/// error.
pub fn execute_transfer(
    host: &dyn AssetHost,
    leg: &AssetLeg,
    from: Address,
    to: Address,
    ctx: &TransferContext,
) -> Result<(), Error> {
    match leg.kind {
        AssetKind::None => Ok(()),
        AssetKind::Fungible => host
            .transfer_fungible(leg.contract, from, to, leg.quantity, ctx)
            .map_err(|reason| Error::FungibleTransferFailed {
                contract: leg.contract,
                quantity: leg.quantity,
                reason,
            }),
        AssetKind::SemiFungible => host
            .transfer_semi_fungible(leg.contract, from, to, leg.token_id, leg.quantity, ctx)
            .map_err(Error::TransferRejected),
        AssetKind::Unique => host
            .transfer_unique(leg.contract, from, to, leg.token_id, ctx)
            .map_err(Error::TransferRejected),
    }
}
