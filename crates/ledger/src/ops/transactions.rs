use chrono::Utc;
use engine::{
    EngineError, NoticeKind, Transaction, ensure_members_present, transaction_notices,
    validate_transaction,
};
use uuid::Uuid;

use crate::{GroupStore, LedgerResult, Notifier, StoreError, WriteBatch, retry::retry};

use super::{Change, Ledger, rejected};

impl<S: GroupStore, N: Notifier> Ledger<S, N> {
    /// Records a settlement payment from `payer_id` to `receiver_id`.
    pub async fn add_transaction(
        &self,
        group_id: &str,
        mut transaction: Transaction,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        if transaction.id.is_empty() {
            transaction.id = Uuid::new_v4().to_string();
        }
        transaction.group_id = group_id.to_string();
        transaction.is_active = true;
        transaction.added_by = Some(actor.to_string());
        transaction.added_at = Some(Utc::now());
        transaction.updated_by = None;
        transaction.updated_at = None;
        validate_transaction(&transaction).inspect_err(|err| rejected("add_transaction", err))?;

        let transaction = &transaction;
        retry(&self.settings.retry, "add_transaction", move || {
            self.try_add_transaction(transaction)
        })
        .await
        .inspect_err(|err| rejected("add_transaction", err))?;
        tracing::info!(
            "payment {} added to group {group_id}: {} -> {} {} {}",
            transaction.id,
            transaction.payer_id,
            transaction.receiver_id,
            transaction.amount,
            transaction.currency
        );

        self.notify(transaction_notices(
            transaction,
            NoticeKind::PaymentAdded,
            actor,
        ))
        .await;
        Ok(transaction.clone())
    }

    async fn try_add_transaction(&self, transaction: &Transaction) -> LedgerResult<()> {
        let group = self.store.group(&transaction.group_id).await?;
        ensure_members_present(&group, transaction.members())?;
        match self.store.transaction(&group.id, &transaction.id).await {
            Ok(_) => return Err(EngineError::ExistingKey(transaction.id.clone()).into()),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let sheet = self
            .rebalance(
                &group,
                Change::Transaction {
                    old: None,
                    new: transaction,
                },
            )
            .await?;
        self.commit(
            WriteBatch::group(group).with_transaction(transaction.clone()),
            &sheet,
        )
        .await?;
        Ok(())
    }

    /// Replaces the stored payment with the same id by `transaction`.
    pub async fn edit_transaction(
        &self,
        group_id: &str,
        transaction: Transaction,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        validate_transaction(&transaction).inspect_err(|err| rejected("edit_transaction", err))?;

        let transaction = &transaction;
        let edited = retry(&self.settings.retry, "edit_transaction", move || {
            self.try_edit_transaction(group_id, transaction, actor)
        })
        .await
        .inspect_err(|err| rejected("edit_transaction", err))?;
        tracing::info!("payment {} updated in group {group_id}", edited.id);

        self.notify(transaction_notices(
            &edited,
            NoticeKind::PaymentUpdated,
            actor,
        ))
        .await;
        Ok(edited)
    }

    async fn try_edit_transaction(
        &self,
        group_id: &str,
        transaction: &Transaction,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        let group = self.store.group(group_id).await?;
        let old = self.store.transaction(group_id, &transaction.id).await?;
        if !old.is_active {
            return Err(EngineError::InactiveRecord(old.id).into());
        }
        ensure_members_present(
            &group,
            old.members().into_iter().chain(transaction.members()),
        )?;

        let new = Transaction {
            group_id: group.id.clone(),
            is_active: true,
            added_by: old.added_by.clone(),
            added_at: old.added_at,
            updated_by: Some(actor.to_string()),
            updated_at: Some(Utc::now()),
            ..transaction.clone()
        };
        let sheet = self
            .rebalance(
                &group,
                Change::Transaction {
                    old: Some(&old),
                    new: &new,
                },
            )
            .await?;
        self.commit(
            WriteBatch::group(group).with_transaction(new.clone()),
            &sheet,
        )
        .await?;
        Ok(new)
    }

    /// Soft-deletes a payment.
    pub async fn delete_transaction(
        &self,
        group_id: &str,
        transaction_id: &str,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        self.set_transaction_active(group_id, transaction_id, false, actor)
            .await
    }

    pub async fn restore_transaction(
        &self,
        group_id: &str,
        transaction_id: &str,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        self.set_transaction_active(group_id, transaction_id, true, actor)
            .await
    }

    async fn set_transaction_active(
        &self,
        group_id: &str,
        transaction_id: &str,
        active: bool,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        let (label, kind) = if active {
            ("restore_transaction", NoticeKind::PaymentRestored)
        } else {
            ("delete_transaction", NoticeKind::PaymentDeleted)
        };
        let transaction = retry(&self.settings.retry, label, move || {
            self.try_set_transaction_active(group_id, transaction_id, active, actor)
        })
        .await
        .inspect_err(|err| rejected(label, err))?;
        tracing::info!("{label}: payment {transaction_id} in group {group_id}");

        self.notify(transaction_notices(&transaction, kind, actor))
            .await;
        Ok(transaction)
    }

    async fn try_set_transaction_active(
        &self,
        group_id: &str,
        transaction_id: &str,
        active: bool,
        actor: &str,
    ) -> LedgerResult<Transaction> {
        let group = self.store.group(group_id).await?;
        let old = self.store.transaction(group_id, transaction_id).await?;
        match (old.is_active, active) {
            (false, false) => return Err(EngineError::InactiveRecord(old.id).into()),
            (true, true) => return Err(EngineError::ActiveRecord(old.id).into()),
            _ => {}
        }
        ensure_members_present(&group, old.members())?;

        let new = Transaction {
            is_active: active,
            updated_by: Some(actor.to_string()),
            updated_at: Some(Utc::now()),
            ..old.clone()
        };
        let sheet = self
            .rebalance(
                &group,
                Change::Transaction {
                    old: Some(&old),
                    new: &new,
                },
            )
            .await?;
        self.commit(
            WriteBatch::group(group).with_transaction(new.clone()),
            &sheet,
        )
        .await?;
        Ok(new)
    }
}
