//! Balance accumulator.
//!
//! Folds expenses and settlement payments into signed per-member,
//! per-currency net balances:
//!
//! - an active expense credits every payer with what they paid and debits
//!   every participant with their [`split_share`](crate::split_share);
//! - an active payment credits the payer and debits the receiver.
//!
//! Inactive (soft-deleted) records contribute nothing. Every change is
//! applied through [`BalanceSheet::replace_expense`] and
//! [`BalanceSheet::replace_transaction`], and the full recompute is a fold of
//! those same primitives, so an incremental update always lands on the same
//! balances as a recompute from history.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    CurrencyCode, Expense, GroupBalances, MemberBalance, MemberId, Money, Transaction,
    split::split_shares,
};

/// Per-member balances for one currency.
pub type MemberBalances = BTreeMap<MemberId, Money>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Apply,
    Revert,
}

/// Running balances of a group, per currency and member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    members: Vec<MemberId>,
    currencies: BTreeMap<CurrencyCode, MemberBalances>,
}

impl BalanceSheet {
    /// An empty sheet for `members`.
    pub fn new<S: AsRef<str>>(members: &[S]) -> Self {
        let mut sheet = Self::default();
        for member in members {
            sheet.add_member(member.as_ref());
        }
        sheet
    }

    /// Rebuilds a sheet from a persisted snapshot.
    pub fn from_snapshot<S: AsRef<str>>(members: &[S], snapshot: &GroupBalances) -> Self {
        let mut sheet = Self::new(members);
        for (currency, entries) in snapshot {
            let balances = sheet.ensure_currency(currency);
            for entry in entries {
                balances.insert(entry.id.clone(), entry.balance);
            }
        }
        sheet
    }

    /// Tracks a new member at zero in every known currency.
    pub fn add_member(&mut self, member_id: &str) {
        if self.members.iter().any(|m| m == member_id) {
            return;
        }
        self.members.push(member_id.to_string());
        for balances in self.currencies.values_mut() {
            balances.entry(member_id.to_string()).or_insert(Money::ZERO);
        }
    }

    /// Stops tracking a member whose balance is zero everywhere.
    ///
    /// Members with an outstanding balance are kept; rejecting their removal
    /// is up to the caller (see [`crate::ensure_settled`]).
    pub fn remove_member(&mut self, member_id: &str) -> bool {
        let settled = self
            .currencies
            .values()
            .all(|balances| balances.get(member_id).is_none_or(|b| b.is_zero()));
        if !settled {
            return false;
        }
        self.members.retain(|m| m != member_id);
        for balances in self.currencies.values_mut() {
            balances.remove(member_id);
        }
        true
    }

    /// Drops settled balances of anyone `is_member` rejects, e.g. people who
    /// left the group but still show up in old records.
    pub fn prune(&mut self, is_member: impl Fn(&str) -> bool) {
        let departed: BTreeSet<MemberId> = self
            .currencies
            .values()
            .flat_map(|balances| balances.keys())
            .chain(&self.members)
            .filter(|member| !is_member(member))
            .cloned()
            .collect();
        for member in departed {
            self.remove_member(&member);
        }
    }

    pub fn apply_expense(&mut self, expense: &Expense) {
        self.fold_expense(expense, Direction::Apply);
    }

    pub fn revert_expense(&mut self, expense: &Expense) {
        self.fold_expense(expense, Direction::Revert);
    }

    pub fn apply_transaction(&mut self, transaction: &Transaction) {
        self.fold_transaction(transaction, Direction::Apply);
    }

    pub fn revert_transaction(&mut self, transaction: &Transaction) {
        self.fold_transaction(transaction, Direction::Revert);
    }

    /// Delta update for one expense: takes out the contribution of `old`
    /// and adds the contribution of `new`.
    ///
    /// `(None, Some)` is an add, `(Some, Some)` an edit, and a delete or
    /// restore is an edit flipping `is_active`.
    pub fn replace_expense(&mut self, old: Option<&Expense>, new: Option<&Expense>) {
        if let Some(old) = old {
            self.revert_expense(old);
        }
        if let Some(new) = new {
            self.apply_expense(new);
        }
    }

    /// Delta update for one settlement payment, see
    /// [`BalanceSheet::replace_expense`].
    pub fn replace_transaction(&mut self, old: Option<&Transaction>, new: Option<&Transaction>) {
        if let Some(old) = old {
            self.revert_transaction(old);
        }
        if let Some(new) = new {
            self.apply_transaction(new);
        }
    }

    /// Balances for one currency.
    pub fn currency(&self, currency: &str) -> Option<&MemberBalances> {
        self.currencies.get(currency)
    }

    pub fn currencies(&self) -> impl Iterator<Item = (&CurrencyCode, &MemberBalances)> {
        self.currencies.iter()
    }

    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    pub fn balance(&self, currency: &str, member_id: &str) -> Money {
        self.currencies
            .get(currency)
            .and_then(|balances| balances.get(member_id))
            .copied()
            .unwrap_or(Money::ZERO)
    }

    /// Balance of `member_id` in every currency.
    pub fn member_balance(&self, member_id: &str) -> BTreeMap<CurrencyCode, Money> {
        self.currencies
            .iter()
            .filter_map(|(currency, balances)| {
                balances
                    .get(member_id)
                    .map(|balance| (currency.clone(), *balance))
            })
            .collect()
    }

    /// Sum over all members; zero for a consistent sheet.
    pub fn total(&self, currency: &str) -> Money {
        self.currencies
            .get(currency)
            .map(|balances| balances.values().sum())
            .unwrap_or(Money::ZERO)
    }

    /// Whether every balance in every currency is zero.
    pub fn is_settled(&self) -> bool {
        self.currencies
            .values()
            .all(|balances| balances.values().all(|b| b.is_zero()))
    }

    /// Persisted form, rounded to each currency's minor units.
    pub fn snapshot(&self) -> GroupBalances {
        self.currencies
            .iter()
            .map(|(currency, balances)| {
                let minor_units = currency.minor_units();
                let entries = balances
                    .iter()
                    .map(|(id, balance)| MemberBalance {
                        id: id.clone(),
                        balance: balance.round_to(minor_units),
                    })
                    .collect();
                (currency.clone(), entries)
            })
            .collect()
    }

    pub fn into_currencies(self) -> BTreeMap<CurrencyCode, MemberBalances> {
        self.currencies
    }

    fn ensure_currency(&mut self, currency: &CurrencyCode) -> &mut MemberBalances {
        let members = &self.members;
        self.currencies.entry(currency.clone()).or_insert_with(|| {
            members
                .iter()
                .map(|member| (member.clone(), Money::ZERO))
                .collect()
        })
    }

    fn fold_expense(&mut self, expense: &Expense, direction: Direction) {
        let balances = self.ensure_currency(&expense.currency);
        if !expense.is_active {
            return;
        }
        let sign = |amount: Money| match direction {
            Direction::Apply => amount,
            Direction::Revert => -amount,
        };
        for (payer, paid) in &expense.paid_by {
            *balances.entry(payer.clone()).or_insert(Money::ZERO) += sign(*paid);
        }
        for (participant, share) in split_shares(expense) {
            *balances.entry(participant).or_insert(Money::ZERO) -= sign(share);
        }
    }

    fn fold_transaction(&mut self, transaction: &Transaction, direction: Direction) {
        let balances = self.ensure_currency(&transaction.currency);
        if !transaction.is_active {
            return;
        }
        let amount = match direction {
            Direction::Apply => transaction.amount,
            Direction::Revert => -transaction.amount,
        };
        *balances
            .entry(transaction.payer_id.clone())
            .or_insert(Money::ZERO) += amount;
        *balances
            .entry(transaction.receiver_id.clone())
            .or_insert(Money::ZERO) -= amount;
    }
}

/// Recomputes every balance of a group from its full history.
///
/// Every member starts at zero in every currency found in `expenses` or
/// `transactions` (active or not). Members absent from `members` but present
/// in a record still get a balance; flagging them is the caller's job.
pub fn compute_group_balances<S: AsRef<str>>(
    members: &[S],
    expenses: &[Expense],
    transactions: &[Transaction],
) -> BTreeMap<CurrencyCode, MemberBalances> {
    balance_sheet(members, expenses, transactions).into_currencies()
}

/// Same as [`compute_group_balances`], keeping the [`BalanceSheet`] for
/// further delta updates.
pub fn balance_sheet<S: AsRef<str>>(
    members: &[S],
    expenses: &[Expense],
    transactions: &[Transaction],
) -> BalanceSheet {
    let mut sheet = BalanceSheet::new(members);
    for expense in expenses {
        sheet.apply_expense(expense);
    }
    for transaction in transactions {
        sheet.apply_transaction(transaction);
    }
    sheet
}
