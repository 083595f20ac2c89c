//! Group balance engine.
//!
//! Pure computation over plain records: no I/O, no async, no shared state.
//!
//! - [`split_share`] / [`split_shares`]: what each participant owes for one
//!   [`Expense`].
//! - [`compute_group_balances`] and [`BalanceSheet`]: per-member,
//!   per-currency net balances from expenses and settlement
//!   [`Transaction`]s, either recomputed from history or updated one record
//!   at a time.
//! - [`simplify`] / [`simplify_debts`]: the fewest transfers that settle a
//!   currency, for settle-up suggestions.
//!
//! Callers that persist a [`Group`] run the [`validate_expense`],
//! [`ensure_members_present`] and [`ensure_settled`] checks before writing.
//!
//! ```rust
//! use engine::{Expense, Money, Transaction, compute_group_balances, simplify};
//!
//! let dinner = Expense::equally(Money::from(90), "INR".into(), "A", &["A", "B", "C"]);
//! let payback = Transaction::new(Money::from(30), "INR".into(), "B", "A");
//! let balances = compute_group_balances(&["A", "B", "C"], &[dinner], &[payback]);
//!
//! let inr = &balances["INR"];
//! assert_eq!(inr["A"], Money::from(30));
//! assert_eq!(inr["B"], Money::ZERO);
//! assert_eq!(simplify(inr, "A")["C"], Money::from(30));
//! ```

pub use balances::{BalanceSheet, MemberBalances, balance_sheet, compute_group_balances};
pub use currency::{Currency, CurrencyCode, DEFAULT_MINOR_UNITS};
pub use error::EngineError;
pub use expenses::{Expense, SplitType};
pub use group::{Group, GroupBalances, MemberBalance};
pub use money::Money;
pub use notices::{Notice, NoticeKind, expense_effects, expense_notices, transaction_notices};
pub use simplify::{Transfer, simplify, simplify_debts, simplify_group};
pub use split::{split_share, split_shares};
pub use transactions::Transaction;
pub use validation::{
    ensure_group_settled, ensure_members_present, ensure_settled, validate_expense,
    validate_transaction,
};

mod balances;
mod currency;
mod error;
mod expenses;
mod group;
mod money;
mod notices;
mod simplify;
mod split;
mod transactions;
mod validation;

/// Opaque member identifier (a user id owned outside the engine).
pub type MemberId = String;

pub type ResultEngine<T> = Result<T, EngineError>;
