//! Notification planning.
//!
//! Works out who should hear about an expense or payment change and by how
//! much it moves their balance. Shares come from the same
//! [`split_shares`] the accumulator uses, so a notice can never disagree
//! with the balances. Rendering the notice into text is the delivery
//! layer's business.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, Expense, MemberId, Money, Transaction, split::split_shares};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    ExpenseAdded,
    ExpenseUpdated,
    ExpenseDeleted,
    ExpenseRestored,
    PaymentAdded,
    PaymentUpdated,
    PaymentDeleted,
    PaymentRestored,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpenseAdded => "expense_added",
            Self::ExpenseUpdated => "expense_updated",
            Self::ExpenseDeleted => "expense_deleted",
            Self::ExpenseRestored => "expense_restored",
            Self::PaymentAdded => "payment_added",
            Self::PaymentUpdated => "payment_updated",
            Self::PaymentDeleted => "payment_deleted",
            Self::PaymentRestored => "payment_restored",
        }
    }
}

/// One member's view of a change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub recipient: MemberId,
    pub kind: NoticeKind,
    pub group_id: String,
    pub record_id: String,
    pub currency: CurrencyCode,
    /// The recipient's net position in the record: positive when the group
    /// owes them (they paid more than their share), negative when they owe.
    pub amount: Money,
}

/// Net position of every member involved in `expense`: paid minus share.
pub fn expense_effects(expense: &Expense) -> BTreeMap<MemberId, Money> {
    let mut effects: BTreeMap<MemberId, Money> = expense
        .paid_by
        .iter()
        .map(|(payer, paid)| (payer.clone(), *paid))
        .collect();
    for (participant, share) in split_shares(expense) {
        *effects.entry(participant).or_insert(Money::ZERO) -= share;
    }
    effects
}

/// Notices for everyone involved in `expense` except `actor`.
pub fn expense_notices(expense: &Expense, kind: NoticeKind, actor: &str) -> Vec<Notice> {
    expense_effects(expense)
        .into_iter()
        .filter(|(member, _)| member != actor)
        .map(|(recipient, amount)| Notice {
            recipient,
            kind,
            group_id: expense.group_id.clone(),
            record_id: expense.id.clone(),
            currency: expense.currency.clone(),
            amount,
        })
        .collect()
}

/// Notices for the payer and receiver of `transaction`, except `actor`.
pub fn transaction_notices(
    transaction: &Transaction,
    kind: NoticeKind,
    actor: &str,
) -> Vec<Notice> {
    [
        (&transaction.payer_id, transaction.amount),
        (&transaction.receiver_id, -transaction.amount),
    ]
    .into_iter()
    .filter(|(member, _)| member.as_str() != actor)
    .map(|(recipient, amount)| Notice {
        recipient: recipient.clone(),
        kind,
        group_id: transaction.group_id.clone(),
        record_id: transaction.id.clone(),
        currency: transaction.currency.clone(),
        amount,
    })
    .collect()
}
