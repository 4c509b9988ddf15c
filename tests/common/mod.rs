//! Shared in-memory asset host for the scenario tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use barter_core::asset::{AssetHost, HostError, TransferContext};
use barter_core::swap::{Address, TokenId};

/// In-memory stand-in for the external asset contracts and the native
/// currency rail. Interior mutability keeps every method `&self`, matching
/// what the registry expects from a host.
#[derive(Default)]
pub struct MemoryHost {
    state: RefCell<HostState>,
}

#[derive(Default)]
struct HostState {
    fungible: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
    unique: HashMap<(Address, TokenId), Address>,
    unique_approvals: HashMap<(Address, TokenId), Address>,
    semi: HashMap<(Address, Address, TokenId), u128>,
    semi_operators: HashMap<(Address, Address, Address), bool>,
    payouts: Vec<(Address, u128)>,
    failing_contracts: Vec<Address>,
    failing_payouts: bool,
    same_counterparty_seen: Vec<bool>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint_fungible(&self, contract: Address, owner: Address, amount: u128) {
        let mut state = self.state.borrow_mut();
        *state.fungible.entry((contract, owner)).or_insert(0) += amount;
    }

    pub fn approve_fungible(
        &self,
        contract: Address,
        owner: Address,
        operator: Address,
        amount: u128,
    ) {
        self.state
            .borrow_mut()
            .allowances
            .insert((contract, owner, operator), amount);
    }

    pub fn mint_unique(&self, contract: Address, token_id: TokenId, owner: Address) {
        self.state.borrow_mut().unique.insert((contract, token_id), owner);
    }

    pub fn approve_unique(&self, contract: Address, token_id: TokenId, operator: Address) {
        self.state
            .borrow_mut()
            .unique_approvals
            .insert((contract, token_id), operator);
    }

    pub fn mint_semi_fungible(
        &self,
        contract: Address,
        owner: Address,
        token_id: TokenId,
        amount: u128,
    ) {
        let mut state = self.state.borrow_mut();
        *state.semi.entry((contract, owner, token_id)).or_insert(0) += amount;
    }

    pub fn set_semi_fungible_operator(&self, contract: Address, owner: Address, operator: Address) {
        self.state
            .borrow_mut()
            .semi_operators
            .insert((contract, owner, operator), true);
    }

    /// Make every transfer touching `contract` fail until cleared.
    pub fn fail_transfers_on(&self, contract: Address) {
        self.state.borrow_mut().failing_contracts.push(contract);
    }

    pub fn clear_failing_contracts(&self) {
        self.state.borrow_mut().failing_contracts.clear();
    }

    /// Make every payout fail.
    pub fn fail_payouts(&self) {
        self.state.borrow_mut().failing_payouts = true;
    }

    /// Payouts performed so far, in order.
    pub fn payouts(&self) -> Vec<(Address, u128)> {
        self.state.borrow().payouts.clone()
    }

    /// The same-counterparty signal observed by each executed transfer.
    pub fn same_counterparty_seen(&self) -> Vec<bool> {
        self.state.borrow().same_counterparty_seen.clone()
    }
}

impl AssetHost for MemoryHost {
    fn fungible_balance(&self, contract: Address, owner: Address) -> u128 {
        self.state
            .borrow()
            .fungible
            .get(&(contract, owner))
            .copied()
            .unwrap_or(0)
    }

    fn fungible_allowance(&self, contract: Address, owner: Address, operator: Address) -> u128 {
        self.state
            .borrow()
            .allowances
            .get(&(contract, owner, operator))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_fungible(
        &self,
        contract: Address,
        from: Address,
        to: Address,
        quantity: u128,
        ctx: &TransferContext,
    ) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.failing_contracts.contains(&contract) {
            return Err("the asset contract rejected the transfer".into());
        }
        let allowance = state
            .allowances
            .get(&(contract, from, ctx.operator))
            .copied()
            .unwrap_or(0);
        if allowance < quantity {
            return Err("insufficient allowance".into());
        }
        let balance = state.fungible.get(&(contract, from)).copied().unwrap_or(0);
        if balance < quantity {
            return Err("insufficient balance".into());
        }
        state.allowances.insert((contract, from, ctx.operator), allowance - quantity);
        state.fungible.insert((contract, from), balance - quantity);
        *state.fungible.entry((contract, to)).or_insert(0) += quantity;
        state.same_counterparty_seen.push(ctx.same_counterparty);
        Ok(())
    }

    fn unique_owner(&self, contract: Address, token_id: TokenId) -> Option<Address> {
        self.state.borrow().unique.get(&(contract, token_id)).copied()
    }

    fn unique_approved(&self, contract: Address, token_id: TokenId, operator: Address) -> bool {
        self.state
            .borrow()
            .unique_approvals
            .get(&(contract, token_id))
            .copied()
            == Some(operator)
    }

    fn transfer_unique(
        &self,
        contract: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
        ctx: &TransferContext,
    ) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.failing_contracts.contains(&contract) {
            return Err("the asset contract rejected the transfer".into());
        }
        if state.unique.get(&(contract, token_id)) != Some(&from) {
            return Err("not the item owner".into());
        }
        if state.unique_approvals.get(&(contract, token_id)).copied() != Some(ctx.operator) {
            return Err("missing item approval".into());
        }
        state.unique.insert((contract, token_id), to);
        state.unique_approvals.remove(&(contract, token_id));
        state.same_counterparty_seen.push(ctx.same_counterparty);
        Ok(())
    }

    fn semi_fungible_balance(
        &self,
        contract: Address,
        owner: Address,
        token_id: TokenId,
    ) -> u128 {
        self.state
            .borrow()
            .semi
            .get(&(contract, owner, token_id))
            .copied()
            .unwrap_or(0)
    }

    fn semi_fungible_operator(&self, contract: Address, owner: Address, operator: Address) -> bool {
        self.state
            .borrow()
            .semi_operators
            .get(&(contract, owner, operator))
            .copied()
            .unwrap_or(false)
    }

    fn transfer_semi_fungible(
        &self,
        contract: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
        quantity: u128,
        ctx: &TransferContext,
    ) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.failing_contracts.contains(&contract) {
            return Err("the asset contract rejected the transfer".into());
        }
        if !state
            .semi_operators
            .get(&(contract, from, ctx.operator))
            .copied()
            .unwrap_or(false)
        {
            return Err("missing operator approval".into());
        }
        let balance = state.semi.get(&(contract, from, token_id)).copied().unwrap_or(0);
        if balance < quantity {
            return Err("insufficient item balance".into());
        }
        state.semi.insert((contract, from, token_id), balance - quantity);
        *state.semi.entry((contract, to, token_id)).or_insert(0) += quantity;
        state.same_counterparty_seen.push(ctx.same_counterparty);
        Ok(())
    }

    fn pay(&self, to: Address, amount: u128) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.failing_payouts {
            return Err("the payout rail is down".into());
        }
        state.payouts.push((to, amount));
        Ok(())
    }
}
