//! Swap proposals and their commitments.
//!
//! A [`SwapProposal`] carries the full terms of an exchange: both parties'
//! asset legs and the optional currency portion exactly one side may attach.
//! The registry persists only the proposal's [`SwapCommitment`]; parties keep
//! the proposal itself (recovered from the initiation event if needed) and
//! resupply it verbatim on every later call, where it is re-hashed and
//! compared before anything is trusted.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Keccak};

use crate::consensus::{self, serialize, Decodable, Encodable};
use crate::hash::HexString;

fixed_hash::construct_fixed_hash!(
    /// Identity of a party or of an asset contract.
    pub struct Address(20);
);

fixed_hash::construct_fixed_hash!(
    /// Binds a swap identifier to the exact content of a proposal: the
    /// Keccak-256 hash of the proposal's consensus serialization.
    pub struct SwapCommitment(32);
);

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{:#x}", self).as_ref())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        Address::from_str(&deserializer.deserialize_string(HexString(40))?)
            .map_err(de::Error::custom)
    }
}

impl Serialize for SwapCommitment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{:#x}", self).as_ref())
    }
}

impl<'de> Deserialize<'de> for SwapCommitment {
    fn deserialize<D>(deserializer: D) -> Result<SwapCommitment, D::Error>
    where
        D: Deserializer<'de>,
    {
        SwapCommitment::from_str(&deserializer.deserialize_string(HexString(64))?)
            .map_err(de::Error::custom)
    }
}

/// The wildcard acceptor: a proposal carrying it can be completed by the
/// first caller satisfying its terms. Rejected at initiation when the
/// acceptor's leg offers a unique item, which cannot go to an unnamed party.
pub const OPEN_ACCEPTOR: Address = Address([0u8; 20]);

/// The first identifier a registry ever assigns. Zero is reserved so that
/// "no entry" can never be confused with a valid identifier.
pub const FIRST_SWAP_ID: SwapId = SwapId(1);

/// Registry-assigned swap identifier. Identifiers strictly increase from
/// [`FIRST_SWAP_ID`] and are never reused, even after settlement or removal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SwapId(pub u64);

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encodable for SwapId {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(writer)
    }
}

impl Decodable for SwapId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(SwapId(Decodable::consensus_decode(d)?))
    }
}

/// Identifier of a unique or semi-fungible item within its contract.
pub type TokenId = u128;

/// The kinds of asset a swap leg can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// No asset on this side; the side participates through a currency
    /// portion only.
    None,
    /// Divisible balances held per account, moved under an allowance.
    Fungible,
    /// Item-scoped balances held per account and item identifier, moved
    /// under an operator approval.
    SemiFungible,
    /// A single owned item, moved under a per-item approval.
    Unique,
}

impl Encodable for AssetKind {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            AssetKind::None => 0x01u8.consensus_encode(writer),
            AssetKind::Fungible => 0x02u8.consensus_encode(writer),
            AssetKind::SemiFungible => 0x03u8.consensus_encode(writer),
            AssetKind::Unique => 0x04u8.consensus_encode(writer),
        }
    }
}

impl Decodable for AssetKind {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(AssetKind::None),
            0x02u8 => Ok(AssetKind::Fungible),
            0x03u8 => Ok(AssetKind::SemiFungible),
            0x04u8 => Ok(AssetKind::Unique),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

/// One side of a proposal: which contract, which kind of asset, and how much
/// of it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLeg {
    /// The asset contract this leg refers to. Zeroed in the committed form
    /// when `kind` is [`AssetKind::None`].
    pub contract: Address,
    /// The asset behavior this leg dispatches on.
    pub kind: AssetKind,
    /// Item identifier for unique and semi-fungible legs.
    pub token_id: TokenId,
    /// Quantity moved. Unique legs always commit with a quantity of one.
    pub quantity: u128,
}

impl AssetLeg {
    /// A bare leg: no asset, only a currency portion on this side.
    pub fn bare() -> Self {
        AssetLeg {
            contract: Address::zero(),
            kind: AssetKind::None,
            token_id: 0,
            quantity: 0,
        }
    }

    /// A fungible leg moving `quantity` units of `contract`.
    pub fn fungible(contract: Address, quantity: u128) -> Self {
        AssetLeg {
            contract,
            kind: AssetKind::Fungible,
            token_id: 0,
            quantity,
        }
    }

    /// A semi-fungible leg moving `quantity` of item `token_id`.
    pub fn semi_fungible(contract: Address, token_id: TokenId, quantity: u128) -> Self {
        AssetLeg {
            contract,
            kind: AssetKind::SemiFungible,
            token_id,
            quantity,
        }
    }

    /// A unique leg moving item `token_id`.
    pub fn unique(contract: Address, token_id: TokenId) -> Self {
        AssetLeg {
            contract,
            kind: AssetKind::Unique,
            token_id,
            quantity: 1,
        }
    }

    /// The leg as committed. Bare legs have every unused field zeroed so that
    /// stray values cannot produce distinct commitments for the same terms,
    /// and unique legs pin their quantity to one.
    pub fn normalized(&self) -> Self {
        match self.kind {
            AssetKind::None => AssetLeg::bare(),
            AssetKind::Unique => AssetLeg { quantity: 1, ..*self },
            AssetKind::Fungible | AssetKind::SemiFungible => *self,
        }
    }
}

impl Encodable for AssetLeg {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.contract.0.consensus_encode(s)?;
        len += self.kind.consensus_encode(s)?;
        len += self.token_id.consensus_encode(s)?;
        Ok(len + self.quantity.consensus_encode(s)?)
    }
}

impl Decodable for AssetLeg {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(AssetLeg {
            contract: Address(Decodable::consensus_decode(d)?),
            kind: Decodable::consensus_decode(d)?,
            token_id: Decodable::consensus_decode(d)?,
            quantity: Decodable::consensus_decode(d)?,
        })
    }
}

/// The full terms of a proposed exchange, shared between the parties off
/// channel and resupplied verbatim on every call touching the swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapProposal {
    /// Timestamp after which the proposal is void.
    pub expiry: u64,
    /// The party opening the swap and funding the initiator leg.
    pub initiator: Address,
    /// The party allowed to complete the swap, or [`OPEN_ACCEPTOR`] to let
    /// the first qualifying caller claim it.
    pub acceptor: Address,
    /// What the initiator gives.
    pub initiator_leg: AssetLeg,
    /// What the acceptor gives.
    pub acceptor_leg: AssetLeg,
    /// Currency the initiator locks at initiation. At most one of the two
    /// currency portions may be non-zero.
    pub initiator_currency: u128,
    /// Currency the acceptor must attach at completion.
    pub acceptor_currency: u128,
}

impl SwapProposal {
    /// True when the acceptor is left open for the first qualifying caller.
    pub fn is_open(&self) -> bool {
        self.acceptor == OPEN_ACCEPTOR
    }

    /// True when both legs reference the same asset contract. Exposed to
    /// transfer callbacks while the swap settles, since some contracts behave
    /// differently when they sit on both ends of one settlement.
    pub fn same_counterparty_contract(&self) -> bool {
        self.initiator_leg.kind != AssetKind::None
            && self.acceptor_leg.kind != AssetKind::None
            && self.initiator_leg.contract == self.acceptor_leg.contract
    }

    /// The proposal as committed, with both legs normalized.
    pub fn normalized(&self) -> Self {
        SwapProposal {
            initiator_leg: self.initiator_leg.normalized(),
            acceptor_leg: self.acceptor_leg.normalized(),
            ..self.clone()
        }
    }

    /// Derive the commitment binding these exact terms, by hashing the
    /// consensus serialization of the normalized proposal. Normalization runs
    /// first so that every entry point derives the same value for the same
    /// terms.
    pub fn commitment(&self) -> SwapCommitment {
        let mut keccak = Keccak::v256();
        let mut out = [0u8; 32];
        keccak.update(&serialize(&self.normalized()));
        keccak.finalize(&mut out);
        SwapCommitment(out)
    }
}

impl Encodable for SwapProposal {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.expiry.consensus_encode(s)?;
        len += self.initiator.0.consensus_encode(s)?;
        len += self.acceptor.0.consensus_encode(s)?;
        len += self.initiator_leg.consensus_encode(s)?;
        len += self.acceptor_leg.consensus_encode(s)?;
        len += self.initiator_currency.consensus_encode(s)?;
        Ok(len + self.acceptor_currency.consensus_encode(s)?)
    }
}

impl Decodable for SwapProposal {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(SwapProposal {
            expiry: Decodable::consensus_decode(d)?,
            initiator: Address(Decodable::consensus_decode(d)?),
            acceptor: Address(Decodable::consensus_decode(d)?),
            initiator_leg: Decodable::consensus_decode(d)?,
            acceptor_leg: Decodable::consensus_decode(d)?,
            initiator_currency: Decodable::consensus_decode(d)?,
            acceptor_currency: Decodable::consensus_decode(d)?,
        })
    }
}
