use std::collections::BTreeMap;

use engine::{
    BalanceSheet, CurrencyCode, EngineError, Group, GroupBalances, MemberId, Money, simplify_group,
};

use crate::{GroupStore, LedgerResult, Notifier, WriteBatch, retry::retry};

use super::{Ledger, rejected};

impl<S: GroupStore, N: Notifier> Ledger<S, N> {
    /// Rebuilds the stored snapshot from the group's whole history,
    /// regardless of the configured strategy.
    ///
    /// Repairs a snapshot that drifted, e.g. after records were imported
    /// straight into the store.
    pub async fn recompute_balances(&self, group_id: &str) -> LedgerResult<GroupBalances> {
        let group = retry(&self.settings.retry, "recompute_balances", move || {
            self.try_recompute_balances(group_id)
        })
        .await
        .inspect_err(|err| rejected("recompute_balances", err))?;
        tracing::info!(
            "recomputed balances of group {group_id} in {} currencies",
            group.balances.len()
        );
        Ok(group.balances)
    }

    async fn try_recompute_balances(&self, group_id: &str) -> LedgerResult<Group> {
        let group = self.store.group(group_id).await?;
        let sheet = self.replay(&group).await?;
        if sheet.snapshot() != group.balances {
            tracing::debug!("stored balances of group {group_id} were out of date");
        }
        self.commit(WriteBatch::group(group), &sheet).await
    }

    /// The stored balance snapshot of the group.
    pub async fn balances(&self, group_id: &str) -> LedgerResult<GroupBalances> {
        Ok(self.store.group(group_id).await?.balances)
    }

    /// `member_id`'s balance in every currency of the group.
    pub async fn member_balance(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> LedgerResult<BTreeMap<CurrencyCode, Money>> {
        let group = self.store.group(group_id).await?;
        if !group.has_member(member_id) {
            return Err(EngineError::MemberNotInGroup(member_id.to_string()).into());
        }
        Ok(group.member_balance(member_id))
    }

    /// Settle-up suggestions for `viewer_id`, per currency: positive
    /// amounts are owed to the viewer, negative ones the viewer owes.
    pub async fn settle_up(
        &self,
        group_id: &str,
        viewer_id: &str,
    ) -> LedgerResult<BTreeMap<CurrencyCode, BTreeMap<MemberId, Money>>> {
        let group = self.store.group(group_id).await?;
        if !group.has_member(viewer_id) {
            return Err(EngineError::MemberNotInGroup(viewer_id.to_string()).into());
        }
        let sheet = BalanceSheet::from_snapshot(&group.members, &group.balances);
        Ok(simplify_group(&sheet, viewer_id))
    }
}
