//! Split calculator.
//!
//! Computes how much of an [`Expense`] each participant owes. This is the
//! single implementation shared by the balance accumulator and the
//! notification planner.
//!
//! | split type    | share of participant `m`                          |
//! |---------------|---------------------------------------------------|
//! | `equally`     | `amount / participants`                           |
//! | `fixedAmount` | `splitData[m]` (0 when absent)                    |
//! | `percentage`  | `amount * splitData[m] / sum(splitData)`          |
//! | `shares`      | same as `percentage`                              |
//! | unknown       | 0                                                 |
//!
//! Proportional shares are allocated in whole minor units of the expense
//! currency: each participant gets the truncated quotient, then leftover
//! minor units go one by one to the largest truncated fractions, ties broken
//! by member id. Shares therefore sum to `amount` exactly and each one is
//! within a minor unit of the exact quotient. For `equally` the leftover
//! cents land on the first participants in member-id order.
//!
//! Invalid input never errors here: non-participants owe 0, weights of
//! non-participants and negative weights are ignored, a zero weight sum
//! yields zero shares.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::{Expense, MemberId, Money, SplitType};

/// Share of `member_id` in `expense`. Zero for non-participants.
pub fn split_share(expense: &Expense, member_id: &str) -> Money {
    if !expense.is_participant(member_id) {
        return Money::ZERO;
    }
    split_shares(expense)
        .get(member_id)
        .copied()
        .unwrap_or(Money::ZERO)
}

/// Shares of every participant, keyed by member id.
pub fn split_shares(expense: &Expense) -> BTreeMap<MemberId, Money> {
    let participants = expense.participants();
    match expense.split_type {
        SplitType::Equally => {
            let weights = participants.iter().map(|m| (*m, Decimal::ONE));
            allocate(expense, weights)
        }
        SplitType::FixedAmount => participants
            .iter()
            .map(|m| {
                let share = expense.split_data.get(*m).copied().unwrap_or_default();
                (m.to_string(), Money::new(share))
            })
            .collect(),
        SplitType::Percentage | SplitType::Shares => {
            let weights = participants.iter().map(|m| {
                let weight = expense.split_data.get(*m).copied().unwrap_or_default();
                (*m, weight.max(Decimal::ZERO))
            });
            allocate(expense, weights)
        }
        SplitType::Unknown => participants
            .iter()
            .map(|m| (m.to_string(), Money::ZERO))
            .collect(),
    }
}

/// Largest-remainder allocation of `expense.amount` in proportion to
/// `weights`, in whole minor units of the expense currency.
fn allocate<'a>(
    expense: &Expense,
    weights: impl Iterator<Item = (&'a str, Decimal)>,
) -> BTreeMap<MemberId, Money> {
    let weights: Vec<(&str, Decimal)> = weights.collect();
    let total_weight = weights
        .iter()
        .try_fold(Decimal::ZERO, |total, (_, w)| total.checked_add(*w));
    let Some(total_weight) = total_weight.filter(|total| *total > Decimal::ZERO) else {
        return weights
            .into_iter()
            .map(|(m, _)| (m.to_string(), Money::ZERO))
            .collect();
    };

    let minor_units = expense.currency.minor_units();
    let unit = Money::from_minor(1, minor_units);
    let amount = expense.amount.abs();

    struct Slot<'a> {
        member: &'a str,
        share: Money,
        fraction: Money,
    }

    let mut slots: Vec<Slot<'_>> = weights
        .iter()
        .map(|&(member, weight)| {
            let exact = Money::new(proportion(amount.value(), weight, total_weight));
            let share = exact.truncate_to(minor_units);
            Slot {
                member,
                share,
                fraction: exact - share,
            }
        })
        .collect();

    let allocated = slots
        .iter()
        .try_fold(Money::ZERO, |total, slot| total.checked_add(slot.share));
    let Some(mut leftover) = allocated.and_then(|allocated| amount.checked_sub(allocated)) else {
        return weights
            .into_iter()
            .map(|(m, _)| (m.to_string(), Money::ZERO))
            .collect();
    };

    // Members come in id order, so a stable sort keeps id order among ties.
    let mut order: Vec<usize> = (0..slots.len()).collect();
    order.sort_by(|a, b| slots[*b].fraction.cmp(&slots[*a].fraction));

    let mut next = order.iter().cycle();
    while leftover >= unit {
        if let Some(&idx) = next.next() {
            slots[idx].share += unit;
            leftover -= unit;
        }
    }
    // Sub-unit residue (amounts finer than the currency allows) goes to the
    // first slot in allocation order.
    if !leftover.is_zero()
        && let Some(&idx) = order.first()
    {
        slots[idx].share += leftover;
    }

    let negate = expense.amount.is_negative();
    slots
        .into_iter()
        .map(|slot| {
            let share = if negate { -slot.share } else { slot.share };
            (slot.member.to_string(), share)
        })
        .collect()
}

/// `amount * weight / total`. Falls back to scaling by the ratio first when
/// the product overflows, and to 0 when neither fits.
fn proportion(amount: Decimal, weight: Decimal, total: Decimal) -> Decimal {
    amount
        .checked_mul(weight)
        .and_then(|product| product.checked_div(total))
        .or_else(|| {
            weight
                .checked_div(total)
                .and_then(|ratio| ratio.checked_mul(amount))
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurrencyCode;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn expense(
        amount: Decimal,
        split_type: SplitType,
        split_to: &[&str],
        split_data: &[(&str, Decimal)],
    ) -> Expense {
        Expense::new(
            Money::new(amount),
            CurrencyCode::new("INR"),
            "A",
            split_type,
            split_to.iter().map(ToString::to_string).collect(),
            split_data
                .iter()
                .map(|(m, w)| (m.to_string(), *w))
                .collect(),
        )
    }

    fn shares(expense: &Expense) -> Vec<(String, Decimal)> {
        split_shares(expense)
            .into_iter()
            .map(|(m, s)| (m, s.value()))
            .collect()
    }

    #[rstest]
    #[case::even(dec!(90), &["A", "B", "C"], &[dec!(30), dec!(30), dec!(30)])]
    #[case::one_cent_left(dec!(100), &["A", "B", "C"], &[dec!(33.34), dec!(33.33), dec!(33.33)])]
    #[case::two_cents_left(dec!(0.05), &["C", "B", "A"], &[dec!(0.02), dec!(0.02), dec!(0.01)])]
    #[case::single(dec!(12.34), &["B"], &[dec!(12.34)])]
    fn equally_hands_leftover_cents_to_first_ids(
        #[case] amount: Decimal,
        #[case] split_to: &[&str],
        #[case] expected: &[Decimal],
    ) {
        let e = expense(amount, SplitType::Equally, split_to, &[]);
        let got: Vec<Decimal> = shares(&e).into_iter().map(|(_, s)| s).collect();
        assert_eq!(got, expected);
        assert_eq!(got.iter().sum::<Decimal>(), amount);
    }

    #[test]
    fn fixed_amount_uses_literal_values() {
        let e = expense(
            dec!(100),
            SplitType::FixedAmount,
            &["A", "B", "C"],
            &[("A", dec!(70)), ("B", dec!(30))],
        );
        assert_eq!(split_share(&e, "A"), Money::from(70));
        assert_eq!(split_share(&e, "B"), Money::from(30));
        assert_eq!(split_share(&e, "C"), Money::ZERO);
    }

    #[rstest]
    #[case::percentage(SplitType::Percentage, [dec!(50), dec!(25), dec!(25)])]
    #[case::shares(SplitType::Shares, [dec!(2), dec!(1), dec!(1)])]
    fn proportional_splits(#[case] split_type: SplitType, #[case] weights: [Decimal; 3]) {
        let e = expense(
            dec!(200),
            split_type,
            &["A", "B", "C"],
            &[("A", weights[0]), ("B", weights[1]), ("C", weights[2])],
        );
        assert_eq!(
            shares(&e),
            vec![
                ("A".to_string(), dec!(100)),
                ("B".to_string(), dec!(50)),
                ("C".to_string(), dec!(50)),
            ]
        );
    }

    #[test]
    fn proportional_leftover_goes_to_largest_fraction() {
        // 10 * 1/6 = 1.666.., 10 * 2/6 = 3.333.., 10 * 3/6 = 5
        let e = expense(
            dec!(10),
            SplitType::Shares,
            &["A", "B", "C"],
            &[("A", dec!(1)), ("B", dec!(2)), ("C", dec!(3))],
        );
        assert_eq!(
            shares(&e),
            vec![
                ("A".to_string(), dec!(1.67)),
                ("B".to_string(), dec!(3.33)),
                ("C".to_string(), dec!(5.00)),
            ]
        );
    }

    #[test]
    fn zero_weight_sum_yields_zero_shares() {
        let e = expense(
            dec!(50),
            SplitType::Percentage,
            &["A", "B"],
            &[("A", dec!(0)), ("B", dec!(0))],
        );
        assert!(split_shares(&e).values().all(|s| s.is_zero()));
    }

    #[test]
    fn weights_of_non_participants_and_negatives_are_ignored() {
        let e = expense(
            dec!(60),
            SplitType::Shares,
            &["A", "B"],
            &[("A", dec!(1)), ("B", dec!(2)), ("Z", dec!(100)), ("Y", dec!(-3))],
        );
        assert_eq!(split_share(&e, "A"), Money::from(20));
        assert_eq!(split_share(&e, "B"), Money::from(40));
        assert_eq!(split_share(&e, "Z"), Money::ZERO);

        let negative = expense(
            dec!(60),
            SplitType::Shares,
            &["A", "B"],
            &[("A", dec!(-1)), ("B", dec!(2))],
        );
        assert_eq!(split_share(&negative, "A"), Money::ZERO);
        assert_eq!(split_share(&negative, "B"), Money::from(60));
    }

    #[test]
    fn non_participant_and_unknown_type_owe_nothing() {
        let e = expense(dec!(90), SplitType::Equally, &["A", "B"], &[]);
        assert_eq!(split_share(&e, "C"), Money::ZERO);

        let unknown = expense(dec!(90), SplitType::Unknown, &["A", "B"], &[]);
        assert_eq!(split_share(&unknown, "A"), Money::ZERO);
        assert_eq!(split_shares(&unknown).len(), 2);
    }

    #[test]
    fn zero_decimal_currency_allocates_whole_units() {
        let mut e = expense(dec!(100), SplitType::Equally, &["A", "B", "C"], &[]);
        e.currency = CurrencyCode::new("JPY");
        assert_eq!(
            shares(&e).into_iter().map(|(_, s)| s).collect::<Vec<_>>(),
            vec![dec!(34), dec!(33), dec!(33)]
        );
    }

    #[test]
    fn huge_weights_do_not_overflow() {
        let huge = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        let e = expense(
            dec!(100),
            SplitType::Shares,
            &["A", "B"],
            &[("A", huge), ("B", dec!(1))],
        );
        assert_eq!(
            shares(&e),
            vec![("A".to_string(), dec!(100)), ("B".to_string(), dec!(0))]
        );

        let e = expense(
            dec!(100),
            SplitType::Shares,
            &["A", "B"],
            &[("A", Decimal::MAX), ("B", Decimal::MAX)],
        );
        assert!(split_shares(&e).values().all(|s| s.is_zero()));
    }

    #[test]
    fn sub_unit_residue_is_not_lost() {
        let e = expense(dec!(10.005), SplitType::Equally, &["A", "B"], &[]);
        let total: Money = split_shares(&e).values().sum();
        assert_eq!(total, Money::new(dec!(10.005)));
    }
}
