//! The `Group` owns the member list, the default currency and the cached
//! balance snapshot recomputed after every expense or payment change.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, EngineError, MemberId, Money, ResultEngine};

/// One member's signed net balance in a currency.
///
/// Positive: the group owes this member. Negative: the member owes the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub id: MemberId,
    pub balance: Money,
}

/// Persisted balance snapshot: currency code to per-member balances.
///
/// For every currency the balances sum to zero.
pub type GroupBalances = BTreeMap<CurrencyCode, Vec<MemberBalance>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub members: Vec<MemberId>,
    pub default_currency: CurrencyCode,
    #[serde(default)]
    pub balances: GroupBalances,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<MemberId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every committed write.
    #[serde(default)]
    pub version: u64,
}

impl Group {
    /// Creates a group; duplicate member ids are dropped, first one wins.
    pub fn new(
        id: &str,
        name: &str,
        created_by: &str,
        members: &[&str],
        default_currency: CurrencyCode,
    ) -> Self {
        let mut group = Self {
            id: id.to_string(),
            name: name.to_string(),
            members: Vec::with_capacity(members.len() + 1),
            default_currency,
            balances: GroupBalances::new(),
            created_by: Some(created_by.to_string()),
            updated_at: None,
            version: 0,
        };
        for member in std::iter::once(&created_by).chain(members) {
            if !group.has_member(member) {
                group.members.push(member.to_string());
            }
        }
        group
    }

    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m == member_id)
    }

    pub fn add_member(&mut self, member_id: &str) -> ResultEngine<()> {
        if self.has_member(member_id) {
            return Err(EngineError::ExistingKey(member_id.to_string()));
        }
        self.members.push(member_id.to_string());
        Ok(())
    }

    /// Drops `member_id` from the member list.
    ///
    /// Does not check balances; see [`crate::ensure_settled`].
    pub fn remove_member(&mut self, member_id: &str) -> ResultEngine<()> {
        let position = self
            .members
            .iter()
            .position(|m| m == member_id)
            .ok_or_else(|| EngineError::MemberNotInGroup(member_id.to_string()))?;
        self.members.remove(position);
        Ok(())
    }

    /// Snapshot balance of `member_id` in every currency where it is
    /// recorded.
    pub fn member_balance(&self, member_id: &str) -> BTreeMap<CurrencyCode, Money> {
        self.balances
            .iter()
            .filter_map(|(currency, entries)| {
                entries
                    .iter()
                    .find(|entry| entry.id == member_id)
                    .map(|entry| (currency.clone(), entry.balance))
            })
            .collect()
    }
}
