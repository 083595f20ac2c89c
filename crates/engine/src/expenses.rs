//! Shared expenses.
//!
//! An [`Expense`] is money one or more members paid on behalf of a set of
//! participants. How the amount is divided among participants depends on
//! its [`SplitType`]; see [`crate::split`] for the formulas.
//!
//! The struct is also the persisted document shape, with camelCase field
//! names (`splitType`, `splitTo`, `splitData`, `paidBy`, `isActive`).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, MemberId, Money};

/// Strategy for dividing an expense among its participants.
///
/// Document values other than the four known strategies deserialize to
/// [`SplitType::Unknown`], whose shares are all zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplitType {
    #[default]
    Equally,
    FixedAmount,
    Percentage,
    Shares,
    #[serde(other)]
    Unknown,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equally => "equally",
            Self::FixedAmount => "fixedAmount",
            Self::Percentage => "percentage",
            Self::Shares => "shares",
            Self::Unknown => "unknown",
        }
    }

    /// Whether `split_data` carries meaning for this strategy.
    pub fn uses_split_data(self) -> bool {
        matches!(self, Self::FixedAmount | Self::Percentage | Self::Shares)
    }
}

pub(crate) fn default_active() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub name: String,
    pub amount: Money,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub split_type: SplitType,
    pub split_to: Vec<MemberId>,
    /// Per-member weight; fixed amounts, percentages or share counts.
    #[serde(default)]
    pub split_data: BTreeMap<MemberId, Decimal>,
    pub paid_by: BTreeMap<MemberId, Money>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<MemberId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<MemberId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Creates an active expense with a single payer.
    pub fn new(
        amount: Money,
        currency: CurrencyCode,
        payer: &str,
        split_type: SplitType,
        split_to: Vec<MemberId>,
        split_data: BTreeMap<MemberId, Decimal>,
    ) -> Self {
        Self {
            id: String::new(),
            group_id: String::new(),
            name: String::new(),
            amount,
            currency,
            split_type,
            split_to,
            split_data,
            paid_by: BTreeMap::from([(payer.to_string(), amount)]),
            is_active: true,
            note: None,
            added_by: None,
            added_at: None,
            updated_by: None,
            updated_at: None,
        }
    }

    /// Creates an active expense split equally among `split_to`.
    pub fn equally(amount: Money, currency: CurrencyCode, payer: &str, split_to: &[&str]) -> Self {
        Self::new(
            amount,
            currency,
            payer,
            SplitType::Equally,
            split_to.iter().map(ToString::to_string).collect(),
            BTreeMap::new(),
        )
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Replaces the payer map.
    pub fn paid_by(mut self, paid_by: impl IntoIterator<Item = (MemberId, Money)>) -> Self {
        self.paid_by = paid_by.into_iter().collect();
        self
    }

    /// Distinct participants in member-id order.
    pub fn participants(&self) -> BTreeSet<&str> {
        self.split_to.iter().map(String::as_str).collect()
    }

    pub fn is_participant(&self, member_id: &str) -> bool {
        self.split_to.iter().any(|m| m == member_id)
    }

    /// Amount `member_id` paid towards this expense.
    pub fn paid_amount(&self, member_id: &str) -> Money {
        self.paid_by.get(member_id).copied().unwrap_or(Money::ZERO)
    }

    /// Every member this expense touches: participants, payers and split
    /// data keys.
    pub fn members(&self) -> BTreeSet<&str> {
        self.split_to
            .iter()
            .chain(self.paid_by.keys())
            .chain(self.split_data.keys())
            .map(String::as_str)
            .collect()
    }
}
