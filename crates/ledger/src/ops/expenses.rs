use chrono::Utc;
use engine::{
    EngineError, Expense, NoticeKind, ensure_members_present, expense_notices, validate_expense,
};
use uuid::Uuid;

use crate::{GroupStore, LedgerResult, Notifier, StoreError, WriteBatch, retry::retry};

use super::{Change, Ledger, rejected};

impl<S: GroupStore, N: Notifier> Ledger<S, N> {
    /// Records a new expense in `group_id` on behalf of `actor`.
    ///
    /// An empty `expense.id` gets a generated one. Every payer and
    /// participant must be a current member.
    pub async fn add_expense(
        &self,
        group_id: &str,
        mut expense: Expense,
        actor: &str,
    ) -> LedgerResult<Expense> {
        if expense.id.is_empty() {
            expense.id = Uuid::new_v4().to_string();
        }
        expense.group_id = group_id.to_string();
        expense.is_active = true;
        expense.added_by = Some(actor.to_string());
        expense.added_at = Some(Utc::now());
        expense.updated_by = None;
        expense.updated_at = None;
        validate_expense(&expense).inspect_err(|err| rejected("add_expense", err))?;

        let expense = &expense;
        retry(&self.settings.retry, "add_expense", move || {
            self.try_add_expense(expense)
        })
        .await
        .inspect_err(|err| rejected("add_expense", err))?;
        tracing::info!(
            "expense {} added to group {group_id}: {} {}",
            expense.id,
            expense.amount,
            expense.currency
        );

        self.notify(expense_notices(expense, NoticeKind::ExpenseAdded, actor))
            .await;
        Ok(expense.clone())
    }

    async fn try_add_expense(&self, expense: &Expense) -> LedgerResult<()> {
        let group = self.store.group(&expense.group_id).await?;
        ensure_members_present(&group, expense.members())?;
        match self.store.expense(&group.id, &expense.id).await {
            Ok(_) => return Err(EngineError::ExistingKey(expense.id.clone()).into()),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let sheet = self
            .rebalance(&group, Change::Expense { old: None, new: expense })
            .await?;
        self.commit(WriteBatch::group(group).with_expense(expense.clone()), &sheet)
            .await?;
        Ok(())
    }

    /// Replaces the stored expense with the same id by `expense`.
    ///
    /// The record keeps its creation audit fields; deleted expenses must be
    /// restored before they can be edited.
    pub async fn edit_expense(
        &self,
        group_id: &str,
        expense: Expense,
        actor: &str,
    ) -> LedgerResult<Expense> {
        validate_expense(&expense).inspect_err(|err| rejected("edit_expense", err))?;

        let expense = &expense;
        let edited = retry(&self.settings.retry, "edit_expense", move || {
            self.try_edit_expense(group_id, expense, actor)
        })
        .await
        .inspect_err(|err| rejected("edit_expense", err))?;
        tracing::info!("expense {} updated in group {group_id}", edited.id);

        self.notify(expense_notices(&edited, NoticeKind::ExpenseUpdated, actor))
            .await;
        Ok(edited)
    }

    async fn try_edit_expense(
        &self,
        group_id: &str,
        expense: &Expense,
        actor: &str,
    ) -> LedgerResult<Expense> {
        let group = self.store.group(group_id).await?;
        let old = self.store.expense(group_id, &expense.id).await?;
        if !old.is_active {
            return Err(EngineError::InactiveRecord(old.id).into());
        }
        ensure_members_present(&group, old.members().into_iter().chain(expense.members()))?;

        let new = Expense {
            group_id: group.id.clone(),
            is_active: true,
            added_by: old.added_by.clone(),
            added_at: old.added_at,
            updated_by: Some(actor.to_string()),
            updated_at: Some(Utc::now()),
            ..expense.clone()
        };
        let sheet = self
            .rebalance(
                &group,
                Change::Expense {
                    old: Some(&old),
                    new: &new,
                },
            )
            .await?;
        self.commit(WriteBatch::group(group).with_expense(new.clone()), &sheet)
            .await?;
        Ok(new)
    }

    /// Soft-deletes an expense: it stays stored but stops counting.
    pub async fn delete_expense(
        &self,
        group_id: &str,
        expense_id: &str,
        actor: &str,
    ) -> LedgerResult<Expense> {
        self.set_expense_active(group_id, expense_id, false, actor)
            .await
    }

    /// Brings a soft-deleted expense back into the balances.
    pub async fn restore_expense(
        &self,
        group_id: &str,
        expense_id: &str,
        actor: &str,
    ) -> LedgerResult<Expense> {
        self.set_expense_active(group_id, expense_id, true, actor)
            .await
    }

    async fn set_expense_active(
        &self,
        group_id: &str,
        expense_id: &str,
        active: bool,
        actor: &str,
    ) -> LedgerResult<Expense> {
        let (label, kind) = if active {
            ("restore_expense", NoticeKind::ExpenseRestored)
        } else {
            ("delete_expense", NoticeKind::ExpenseDeleted)
        };
        let expense = retry(&self.settings.retry, label, move || {
            self.try_set_expense_active(group_id, expense_id, active, actor)
        })
        .await
        .inspect_err(|err| rejected(label, err))?;
        tracing::info!("{label}: expense {expense_id} in group {group_id}");

        self.notify(expense_notices(&expense, kind, actor)).await;
        Ok(expense)
    }

    async fn try_set_expense_active(
        &self,
        group_id: &str,
        expense_id: &str,
        active: bool,
        actor: &str,
    ) -> LedgerResult<Expense> {
        let group = self.store.group(group_id).await?;
        let old = self.store.expense(group_id, expense_id).await?;
        match (old.is_active, active) {
            (false, false) => return Err(EngineError::InactiveRecord(old.id).into()),
            (true, true) => return Err(EngineError::ActiveRecord(old.id).into()),
            _ => {}
        }
        ensure_members_present(&group, old.members())?;

        let new = Expense {
            is_active: active,
            updated_by: Some(actor.to_string()),
            updated_at: Some(Utc::now()),
            ..old.clone()
        };
        let sheet = self
            .rebalance(
                &group,
                Change::Expense {
                    old: Some(&old),
                    new: &new,
                },
            )
            .await?;
        self.commit(WriteBatch::group(group).with_expense(new.clone()), &sheet)
            .await?;
        Ok(new)
    }
}
