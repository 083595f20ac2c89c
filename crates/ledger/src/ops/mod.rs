use std::fmt::Display;

use chrono::Utc;
use engine::{BalanceSheet, Expense, Group, Notice, Transaction, balance_sheet};

use crate::{
    GroupStore, LedgerResult, LogNotifier, Notifier, Settings, Strategy, WriteBatch,
    notifier::dispatch,
};

mod balances;
mod expenses;
mod groups;
mod transactions;

/// Group balance service.
///
/// Every mutation reads the group, checks the change against the engine's
/// validation and membership guards, refreshes the balance snapshot and
/// commits group and record together. A commit that loses a race or hits a
/// transient store error is retried from the read.
#[derive(Debug)]
pub struct Ledger<S, N = LogNotifier> {
    store: S,
    notifier: N,
    settings: Settings,
}

impl Ledger<(), LogNotifier> {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder<(), LogNotifier> {
        LedgerBuilder::default()
    }
}

/// What a mutation changes, for [`Ledger::rebalance`].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Change<'a> {
    /// Only the member list moved.
    Membership,
    Expense {
        old: Option<&'a Expense>,
        new: &'a Expense,
    },
    Transaction {
        old: Option<&'a Transaction>,
        new: &'a Transaction,
    },
}

impl<S, N> Ledger<S, N> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<S: GroupStore, N: Notifier> Ledger<S, N> {
    /// Balance sheet of `group` once `change` is applied, following the
    /// configured [`Strategy`].
    pub(crate) async fn rebalance(
        &self,
        group: &Group,
        change: Change<'_>,
    ) -> LedgerResult<BalanceSheet> {
        let mut sheet = match self.settings.balances.strategy {
            Strategy::Incremental => {
                let mut sheet = BalanceSheet::from_snapshot(&group.members, &group.balances);
                match change {
                    Change::Membership => {}
                    Change::Expense { old, new } => sheet.replace_expense(old, Some(new)),
                    Change::Transaction { old, new } => sheet.replace_transaction(old, Some(new)),
                }
                sheet
            }
            Strategy::Full => {
                let mut expenses = self.store.expenses(&group.id).await?;
                let mut transactions = self.store.transactions(&group.id).await?;
                match change {
                    Change::Membership => {}
                    Change::Expense { new, .. } => upsert(&mut expenses, new, |e| e.id.as_str()),
                    Change::Transaction { new, .. } => {
                        upsert(&mut transactions, new, |t| t.id.as_str())
                    }
                }
                tracing::debug!(
                    "replaying {} expenses and {} payments of group {}",
                    expenses.len(),
                    transactions.len(),
                    group.id
                );
                balance_sheet(&group.members, &expenses, &transactions)
            }
        };
        sheet.prune(|member| group.has_member(member));
        Ok(sheet)
    }

    /// Balance sheet replayed from the group's whole history.
    pub(crate) async fn replay(&self, group: &Group) -> LedgerResult<BalanceSheet> {
        let expenses = self.store.expenses(&group.id).await?;
        let transactions = self.store.transactions(&group.id).await?;
        let mut sheet = balance_sheet(&group.members, &expenses, &transactions);
        sheet.prune(|member| group.has_member(member));
        Ok(sheet)
    }

    /// Stores `sheet` as the snapshot of `batch.group` and commits.
    pub(crate) async fn commit(
        &self,
        mut batch: WriteBatch,
        sheet: &BalanceSheet,
    ) -> LedgerResult<Group> {
        batch.group.balances = sheet.snapshot();
        batch.group.updated_at = Some(Utc::now());
        Ok(self.store.commit(batch).await?)
    }

    pub(crate) async fn notify(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let delivered = dispatch(&self.notifier, &self.settings.retry, &notices).await;
        tracing::debug!("delivered {delivered}/{} notices", notices.len());
    }
}

/// Logs a mutation the engine or the store refused.
fn rejected(label: &str, err: &dyn Display) {
    tracing::warn!("{label} rejected: {err}");
}

fn upsert<T: Clone>(records: &mut Vec<T>, record: &T, id: impl Fn(&T) -> &str) {
    match records.iter_mut().find(|r| id(r) == id(record)) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
}

/// The builder for `Ledger`
#[derive(Debug)]
pub struct LedgerBuilder<S, N> {
    store: S,
    notifier: N,
    settings: Settings,
}

impl Default for LedgerBuilder<(), LogNotifier> {
    fn default() -> Self {
        Self {
            store: (),
            notifier: LogNotifier,
            settings: Settings::default(),
        }
    }
}

impl<S, N> LedgerBuilder<S, N> {
    /// Pass the required store
    pub fn store<T: GroupStore>(self, store: T) -> LedgerBuilder<T, N> {
        LedgerBuilder {
            store,
            notifier: self.notifier,
            settings: self.settings,
        }
    }

    /// Replace the default [`LogNotifier`]
    pub fn notifier<M: Notifier>(self, notifier: M) -> LedgerBuilder<S, M> {
        LedgerBuilder {
            store: self.store,
            notifier,
            settings: self.settings,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }
}

impl<S: GroupStore, N: Notifier> LedgerBuilder<S, N> {
    /// Construct `Ledger`
    pub fn build(self) -> Ledger<S, N> {
        tracing::info!(
            "ledger ready, {:?} balance updates",
            self.settings.balances.strategy
        );
        Ledger {
            store: self.store,
            notifier: self.notifier,
            settings: self.settings,
        }
    }
}
