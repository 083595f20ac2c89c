//! Debt simplifier.
//!
//! Turns net balances (creditors positive, debtors negative) into a short
//! list of transfers that settles everyone: repeatedly match the largest
//! creditor with the largest debtor and move the smaller of the two
//! magnitudes. Each step zeroes at least one member, so `N` non-zero
//! balances need at most `N - 1` transfers. Equal magnitudes are taken in
//! ascending member-id order.
//!
//! Currencies are never netted against each other; callers simplify one
//! currency at a time, or use [`simplify_group`].

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
};

use serde::{Deserialize, Serialize};

use crate::{BalanceSheet, CurrencyCode, MemberBalances, MemberId, Money};

/// A suggested payment from a debtor to a creditor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}

/// Greedy settlement plan for one currency.
///
/// If the input does not sum to zero, the unmatched remainder is left out of
/// the plan.
pub fn simplify_debts(balances: &MemberBalances) -> Vec<Transfer> {
    let mut creditors: BinaryHeap<(Money, Reverse<&str>)> = BinaryHeap::new();
    let mut debtors: BinaryHeap<(Money, Reverse<&str>)> = BinaryHeap::new();
    for (member, balance) in balances {
        if balance.is_positive() {
            creditors.push((*balance, Reverse(member.as_str())));
        } else if balance.is_negative() {
            debtors.push((balance.abs(), Reverse(member.as_str())));
        }
    }

    let mut transfers = Vec::new();
    while let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) =
        (creditors.pop(), debtors.pop())
    {
        let amount = credit.min(debt);
        transfers.push(Transfer {
            from: debtor.to_string(),
            to: creditor.to_string(),
            amount,
        });
        if credit > amount {
            creditors.push((credit - amount, Reverse(creditor)));
        }
        if debt > amount {
            debtors.push((debt - amount, Reverse(debtor)));
        }
    }
    transfers
}

/// What everyone else owes `viewer_id` (positive) or is owed by them
/// (negative) once the balances are simplified.
///
/// Members with nothing to settle with the viewer are omitted. The values
/// add up to the viewer's own net balance.
pub fn simplify(balances: &MemberBalances, viewer_id: &str) -> BTreeMap<MemberId, Money> {
    let mut view: BTreeMap<MemberId, Money> = BTreeMap::new();
    for transfer in simplify_debts(balances) {
        if transfer.to == viewer_id {
            *view.entry(transfer.from).or_insert(Money::ZERO) += transfer.amount;
        } else if transfer.from == viewer_id {
            *view.entry(transfer.to).or_insert(Money::ZERO) -= transfer.amount;
        }
    }
    view.retain(|_, amount| !amount.is_zero());
    view
}

/// [`simplify`] applied to each currency of a sheet independently.
///
/// Currencies where the viewer has nothing to settle are omitted.
pub fn simplify_group(
    sheet: &BalanceSheet,
    viewer_id: &str,
) -> BTreeMap<CurrencyCode, BTreeMap<MemberId, Money>> {
    sheet
        .currencies()
        .map(|(currency, balances)| (currency.clone(), simplify(balances, viewer_id)))
        .filter(|(_, view)| !view.is_empty())
        .collect()
}
