//! Record validation and group consistency guards.
//!
//! The split calculator and the accumulator accept anything and fall back
//! to zero shares; these checks are what the calling layer runs before it
//! writes a record or changes a group's membership.

use rust_decimal::Decimal;

use crate::{
    BalanceSheet, EngineError, Expense, Group, Money, ResultEngine, SplitType, Transaction,
    currency::require_known,
};

/// Validates an expense before it is stored.
pub fn validate_expense(expense: &Expense) -> ResultEngine<()> {
    let currency = require_known(&expense.currency)?;
    if !expense.amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "expense amount must be > 0, got {}",
            expense.amount
        )));
    }
    if expense.amount.scale() > currency.minor_units {
        return Err(EngineError::InvalidAmount(format!(
            "{} allows {} decimals, got {}",
            currency.code, currency.minor_units, expense.amount
        )));
    }
    if expense.split_to.is_empty() {
        return Err(EngineError::InvalidSplit(
            "expense must have at least one participant".to_string(),
        ));
    }
    if expense.split_type == SplitType::Unknown {
        return Err(EngineError::InvalidSplit("unknown split type".to_string()));
    }

    if let Some((payer, paid)) = expense.paid_by.iter().find(|(_, paid)| paid.is_negative()) {
        return Err(EngineError::InvalidAmount(format!(
            "payer '{payer}' has a negative amount {paid}"
        )));
    }
    if let Some((payer, paid)) = expense
        .paid_by
        .iter()
        .find(|(_, paid)| paid.scale() > currency.minor_units)
    {
        return Err(EngineError::InvalidAmount(format!(
            "{} allows {} decimals, payer '{payer}' has {paid}",
            currency.code, currency.minor_units
        )));
    }
    let paid = expense
        .paid_by
        .values()
        .try_fold(Money::ZERO, |total, paid| total.checked_add(*paid))
        .ok_or_else(|| EngineError::InvalidAmount("payer amounts are out of range".to_string()))?;
    if paid != expense.amount {
        return Err(EngineError::InvalidAmount(format!(
            "payers cover {paid}, expense amount is {}",
            expense.amount
        )));
    }

    if !expense.split_type.uses_split_data() {
        return Ok(());
    }
    if let Some(outsider) = expense
        .split_data
        .keys()
        .find(|member| !expense.is_participant(member))
    {
        return Err(EngineError::InvalidSplit(format!(
            "split data references non-participant '{outsider}'"
        )));
    }
    if let Some((member, weight)) = expense.split_data.iter().find(|(_, w)| **w < Decimal::ZERO) {
        return Err(EngineError::InvalidSplit(format!(
            "negative split value {weight} for '{member}'"
        )));
    }

    if expense.split_type == SplitType::FixedAmount
        && let Some((member, value)) = expense
            .split_data
            .iter()
            .find(|(_, v)| v.normalize().scale() > currency.minor_units)
    {
        return Err(EngineError::InvalidSplit(format!(
            "{} allows {} decimals, '{member}' owes {value}",
            currency.code, currency.minor_units
        )));
    }
    // Every proportional share must be computable as amount * weight.
    if let Some((member, weight)) = expense
        .split_data
        .iter()
        .find(|(_, w)| expense.amount.value().checked_mul(**w).is_none())
    {
        return Err(EngineError::InvalidSplit(format!(
            "split value {weight} for '{member}' is out of range"
        )));
    }

    let total = expense
        .split_data
        .values()
        .try_fold(Decimal::ZERO, |total, weight| total.checked_add(*weight))
        .ok_or_else(|| EngineError::InvalidSplit("split values are out of range".to_string()))?;
    match expense.split_type {
        SplitType::FixedAmount if total != expense.amount.value() => {
            Err(EngineError::InvalidSplit(format!(
                "fixed amounts add up to {total}, expense amount is {}",
                expense.amount
            )))
        }
        SplitType::Percentage if total != Decimal::ONE_HUNDRED => Err(EngineError::InvalidSplit(
            format!("percentages add up to {total}, expected 100"),
        )),
        SplitType::Shares if total <= Decimal::ZERO => Err(EngineError::InvalidSplit(
            "shares must add up to more than 0".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validates a settlement payment before it is stored.
pub fn validate_transaction(transaction: &Transaction) -> ResultEngine<()> {
    let currency = require_known(&transaction.currency)?;
    if !transaction.amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "payment amount must be > 0, got {}",
            transaction.amount
        )));
    }
    if transaction.amount.scale() > currency.minor_units {
        return Err(EngineError::InvalidAmount(format!(
            "{} allows {} decimals, got {}",
            currency.code, currency.minor_units, transaction.amount
        )));
    }
    if transaction.payer_id == transaction.receiver_id {
        return Err(EngineError::InvalidTransaction(format!(
            "'{}' cannot pay themselves",
            transaction.payer_id
        )));
    }
    Ok(())
}

/// Rejects a mutation of `members` when one of them has left `group`.
pub fn ensure_members_present<'a>(
    group: &Group,
    members: impl IntoIterator<Item = &'a str>,
) -> ResultEngine<()> {
    match members.into_iter().find(|member| !group.has_member(member)) {
        Some(missing) => Err(EngineError::MemberNotInGroup(missing.to_string())),
        None => Ok(()),
    }
}

/// Rejects removing `member_id` while it still owes or is owed money.
pub fn ensure_settled(sheet: &BalanceSheet, member_id: &str) -> ResultEngine<()> {
    let outstanding: Vec<String> = sheet
        .member_balance(member_id)
        .into_iter()
        .filter(|(_, balance)| !balance.is_zero())
        .map(|(currency, balance)| format!("{balance} {currency}"))
        .collect();
    if outstanding.is_empty() {
        return Ok(());
    }
    Err(EngineError::OutstandingBalance(format!(
        "'{member_id}' has {}",
        outstanding.join(", ")
    )))
}

/// Rejects deleting a group while any balance is non-zero.
pub fn ensure_group_settled(sheet: &BalanceSheet) -> ResultEngine<()> {
    for (currency, balances) in sheet.currencies() {
        if let Some((member, balance)) = balances.iter().find(|(_, b)| !b.is_zero()) {
            return Err(EngineError::OutstandingBalance(format!(
                "'{member}' has {balance} {currency}"
            )));
        }
    }
    Ok(())
}
