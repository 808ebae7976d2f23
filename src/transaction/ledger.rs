use std::collections::HashMap;

use thiserror::Error;

use super::model::{Sender, Transaction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds: balance {balance}, requested {amount}")]
    InsufficientFunds { balance: u64, amount: u64 },
    #[error("credit to {0} overflows")]
    Overflow(String),
}

/// Account balances keyed by address.
///
/// Every sender is seeded with the full supply the first time it spends;
/// the reward sender draws from its own pool seeded the same way. This is a
/// demonstration convention, not a minting rule.
#[derive(Debug, Clone)]
pub struct Ledger {
    total_supply: u64,
    balances: HashMap<String, u64>,
    reward_pool: Option<u64>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(super::TOTAL_SUPPLY)
    }
}

impl Ledger {
    pub fn new(total_supply: u64) -> Self {
        Self {
            total_supply,
            balances: HashMap::new(),
            reward_pool: None,
        }
    }

    /// Rebuild balances from a transaction history. Transfers that fail are
    /// skipped, exactly as they were when first applied.
    pub fn replay<'a>(
        total_supply: u64,
        history: impl IntoIterator<Item = &'a Transaction>,
    ) -> Self {
        let mut ledger = Self::new(total_supply);
        for tx in history {
            // failures are part of history too
            let _ = ledger.apply(tx);
        }
        ledger
    }

    /// Move `amount` from `sender` to `receiver`. On failure nothing changes.
    pub fn apply_transaction(
        &mut self,
        sender: &Sender,
        receiver: &str,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let balance = self.sender_balance(sender);
        if balance < amount {
            return Err(LedgerError::InsufficientFunds { balance, amount });
        }
        let debited = balance - amount;

        // Same account on both sides nets out to a no-op
        if sender.address() == Some(receiver) {
            self.set_sender_balance(sender, balance);
            return Ok(());
        }

        let credited = self
            .get_balance(receiver)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(receiver.to_string()))?;

        self.set_sender_balance(sender, debited);
        self.balances.insert(receiver.to_string(), credited);
        Ok(())
    }

    pub fn apply(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        self.apply_transaction(&tx.sender, &tx.receiver, tx.amount)
    }

    /// Recorded balance, zero for unseen addresses.
    pub fn get_balance(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// What is left for future mining rewards.
    pub fn reward_pool(&self) -> u64 {
        self.reward_pool.unwrap_or(self.total_supply)
    }

    fn sender_balance(&self, sender: &Sender) -> u64 {
        match sender {
            Sender::Reward => self.reward_pool(),
            Sender::Address(a) => self.balances.get(a).copied().unwrap_or(self.total_supply),
        }
    }

    fn set_sender_balance(&mut self, sender: &Sender, balance: u64) {
        match sender {
            Sender::Reward => self.reward_pool = Some(balance),
            Sender::Address(a) => {
                self.balances.insert(a.clone(), balance);
            }
        }
    }
}
