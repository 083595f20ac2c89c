//! Settlement payments.
//!
//! A `Transaction` is money that actually moved from `payer_id` to
//! `receiver_id`. It is a pure balance transfer: the payer's balance goes up
//! by `amount` (their debt shrinks) and the receiver's goes down by the same.
//! No split logic applies.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, MemberId, Money, expenses::default_active};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub group_id: String,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub payer_id: MemberId,
    pub receiver_id: MemberId,
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

impl Transaction {
    /// Creates an active payment of `amount` from `payer` to `receiver`.
    pub fn new(amount: Money, currency: CurrencyCode, payer: &str, receiver: &str) -> Self {
        Self {
            id: String::new(),
            group_id: String::new(),
            amount,
            currency,
            payer_id: payer.to_string(),
            receiver_id: receiver.to_string(),
            is_active: true,
            note: None,
            added_by: None,
            added_at: None,
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn members(&self) -> BTreeSet<&str> {
        BTreeSet::from([self.payer_id.as_str(), self.receiver_id.as_str()])
    }
}
