//! Persistence port.
//!
//! A group document carries its member list and balance snapshot; expenses
//! and payments are stored next to it, keyed by group. Every write goes
//! through [`GroupStore::commit`], which applies the group and its changed
//! records atomically and only if the group is still at the version it was
//! read at.

use engine::{Expense, Group, Transaction};

use crate::StoreError;

mod memory;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// One atomic write: the refreshed group plus the records that changed.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteBatch {
    /// Must still carry the version it was read with.
    pub group: Group,
    pub expenses: Vec<Expense>,
    pub transactions: Vec<Transaction>,
}

impl WriteBatch {
    pub fn group(group: Group) -> Self {
        Self {
            group,
            expenses: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn with_expense(mut self, expense: Expense) -> Self {
        self.expenses.push(expense);
        self
    }

    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }
}

pub trait GroupStore: Send + Sync {
    fn group(&self, group_id: &str) -> impl Future<Output = StoreResult<Group>> + Send;

    /// Every expense of the group, soft-deleted ones included.
    fn expenses(&self, group_id: &str) -> impl Future<Output = StoreResult<Vec<Expense>>> + Send;

    /// Every settlement payment of the group, soft-deleted ones included.
    fn transactions(
        &self,
        group_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<Transaction>>> + Send;

    fn expense(
        &self,
        group_id: &str,
        expense_id: &str,
    ) -> impl Future<Output = StoreResult<Expense>> + Send;

    fn transaction(
        &self,
        group_id: &str,
        transaction_id: &str,
    ) -> impl Future<Output = StoreResult<Transaction>> + Send;

    /// Inserts a new group; fails with [`StoreError::AlreadyExists`] on a
    /// taken id.
    fn create_group(&self, group: Group) -> impl Future<Output = StoreResult<Group>> + Send;

    /// Writes `batch` and returns the group with its bumped version, or
    /// [`StoreError::Conflict`] when someone else wrote first.
    fn commit(&self, batch: WriteBatch) -> impl Future<Output = StoreResult<Group>> + Send;

    /// Drops the group and all its records, with the same version check as
    /// [`GroupStore::commit`].
    fn delete_group(
        &self,
        group_id: &str,
        version: u64,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
