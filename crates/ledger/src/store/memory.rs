use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicU32, Ordering},
};

use engine::{Expense, Group, Transaction};
use tokio::sync::RwLock;

use super::{GroupStore, StoreResult, WriteBatch};
use crate::StoreError;

#[derive(Clone, Debug)]
struct GroupDocuments {
    group: Group,
    expenses: BTreeMap<String, Expense>,
    transactions: BTreeMap<String, Transaction>,
}

/// In-process [`GroupStore`], used by tests and single-node setups.
///
/// [`MemoryStore::fail_next_commits`] makes writes fail on purpose to
/// exercise the retry path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    groups: RwLock<HashMap<String, GroupDocuments>>,
    failing_commits: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` commits or deletes fail with
    /// [`StoreError::Unavailable`] without touching any data.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    async fn read<T>(
        &self,
        group_id: &str,
        f: impl FnOnce(&GroupDocuments) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let groups = self.groups.read().await;
        let documents = groups
            .get(group_id)
            .ok_or_else(|| StoreError::NotFound(group_id.to_string()))?;
        f(documents)
    }
}

fn check_version(documents: &GroupDocuments, expected: u64) -> StoreResult<()> {
    let found = documents.group.version;
    if found != expected {
        return Err(StoreError::Conflict {
            id: documents.group.id.clone(),
            expected,
            found,
        });
    }
    Ok(())
}

impl GroupStore for MemoryStore {
    async fn group(&self, group_id: &str) -> StoreResult<Group> {
        self.read(group_id, |documents| Ok(documents.group.clone()))
            .await
    }

    async fn expenses(&self, group_id: &str) -> StoreResult<Vec<Expense>> {
        self.read(group_id, |documents| {
            Ok(documents.expenses.values().cloned().collect())
        })
        .await
    }

    async fn transactions(&self, group_id: &str) -> StoreResult<Vec<Transaction>> {
        self.read(group_id, |documents| {
            Ok(documents.transactions.values().cloned().collect())
        })
        .await
    }

    async fn expense(&self, group_id: &str, expense_id: &str) -> StoreResult<Expense> {
        self.read(group_id, |documents| {
            documents
                .expenses
                .get(expense_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(expense_id.to_string()))
        })
        .await
    }

    async fn transaction(&self, group_id: &str, transaction_id: &str) -> StoreResult<Transaction> {
        self.read(group_id, |documents| {
            documents
                .transactions
                .get(transaction_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(transaction_id.to_string()))
        })
        .await
    }

    async fn create_group(&self, mut group: Group) -> StoreResult<Group> {
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.id) {
            return Err(StoreError::AlreadyExists(group.id));
        }
        group.version = 1;
        groups.insert(
            group.id.clone(),
            GroupDocuments {
                group: group.clone(),
                expenses: BTreeMap::new(),
                transactions: BTreeMap::new(),
            },
        );
        Ok(group)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<Group> {
        if self.take_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        let mut groups = self.groups.write().await;
        let documents = groups
            .get_mut(&batch.group.id)
            .ok_or_else(|| StoreError::NotFound(batch.group.id.clone()))?;
        check_version(documents, batch.group.version)?;

        let mut group = batch.group;
        group.version += 1;
        documents.group = group.clone();
        for expense in batch.expenses {
            documents.expenses.insert(expense.id.clone(), expense);
        }
        for transaction in batch.transactions {
            documents
                .transactions
                .insert(transaction.id.clone(), transaction);
        }
        Ok(group)
    }

    async fn delete_group(&self, group_id: &str, version: u64) -> StoreResult<()> {
        if self.take_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        let mut groups = self.groups.write().await;
        let documents = groups
            .get(group_id)
            .ok_or_else(|| StoreError::NotFound(group_id.to_string()))?;
        check_version(documents, version)?;
        groups.remove(group_id);
        Ok(())
    }
}
