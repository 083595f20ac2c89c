use chrono::Utc;
use engine::{CurrencyCode, EngineError, Group, ensure_group_settled, ensure_settled};
use uuid::Uuid;

use crate::{GroupStore, LedgerResult, Notifier, WriteBatch, retry::retry};

use super::{Change, Ledger, rejected};

impl<S: GroupStore, N: Notifier> Ledger<S, N> {
    /// Creates a group owned by `created_by`, who is always a member.
    pub async fn create_group(
        &self,
        name: &str,
        created_by: &str,
        members: &[&str],
        default_currency: CurrencyCode,
    ) -> LedgerResult<Group> {
        if default_currency.currency().is_none() {
            let err = EngineError::UnknownCurrency(default_currency.to_string());
            rejected("create_group", &err);
            return Err(err.into());
        }
        let id = Uuid::new_v4().to_string();
        let mut group = Group::new(&id, name, created_by, members, default_currency);
        group.updated_at = Some(Utc::now());

        let group = &group;
        let created = retry(&self.settings.retry, "create_group", move || {
            self.store.create_group(group.clone())
        })
        .await?;
        tracing::info!(
            "group {} created by {created_by} with {} members",
            created.id,
            created.members.len()
        );
        Ok(created)
    }

    pub async fn group(&self, group_id: &str) -> LedgerResult<Group> {
        Ok(self.store.group(group_id).await?)
    }

    /// Adds `member_id` with a zero balance in every currency of the group.
    pub async fn add_member(
        &self,
        group_id: &str,
        member_id: &str,
        actor: &str,
    ) -> LedgerResult<Group> {
        let group = retry(&self.settings.retry, "add_member", move || {
            self.try_add_member(group_id, member_id)
        })
        .await
        .inspect_err(|err| rejected("add_member", err))?;
        tracing::info!("{actor} added {member_id} to group {group_id}");
        Ok(group)
    }

    async fn try_add_member(&self, group_id: &str, member_id: &str) -> LedgerResult<Group> {
        let mut group = self.store.group(group_id).await?;
        group.add_member(member_id)?;
        let sheet = self.rebalance(&group, Change::Membership).await?;
        self.commit(WriteBatch::group(group), &sheet).await
    }

    /// Removes `member_id`, which must be settled in every currency.
    pub async fn remove_member(
        &self,
        group_id: &str,
        member_id: &str,
        actor: &str,
    ) -> LedgerResult<Group> {
        let group = retry(&self.settings.retry, "remove_member", move || {
            self.try_remove_member(group_id, member_id)
        })
        .await
        .inspect_err(|err| rejected("remove_member", err))?;
        tracing::info!("{actor} removed {member_id} from group {group_id}");
        Ok(group)
    }

    async fn try_remove_member(&self, group_id: &str, member_id: &str) -> LedgerResult<Group> {
        let mut group = self.store.group(group_id).await?;
        if !group.has_member(member_id) {
            return Err(EngineError::MemberNotInGroup(member_id.to_string()).into());
        }
        let mut sheet = self.rebalance(&group, Change::Membership).await?;
        ensure_settled(&sheet, member_id)?;
        group.remove_member(member_id)?;
        sheet.remove_member(member_id);
        self.commit(WriteBatch::group(group), &sheet).await
    }

    /// `member_id` leaves on its own; same rules as [`Ledger::remove_member`].
    pub async fn leave_group(&self, group_id: &str, member_id: &str) -> LedgerResult<Group> {
        self.remove_member(group_id, member_id, member_id).await
    }

    /// Deletes the group and its records once nobody owes anything.
    pub async fn delete_group(&self, group_id: &str, actor: &str) -> LedgerResult<()> {
        retry(&self.settings.retry, "delete_group", move || {
            self.try_delete_group(group_id)
        })
        .await
        .inspect_err(|err| rejected("delete_group", err))?;
        tracing::info!("{actor} deleted group {group_id}");
        Ok(())
    }

    async fn try_delete_group(&self, group_id: &str) -> LedgerResult<()> {
        let group = self.store.group(group_id).await?;
        let sheet = self.rebalance(&group, Change::Membership).await?;
        ensure_group_settled(&sheet)?;
        Ok(self.store.delete_group(&group.id, group.version).await?)
    }
}
