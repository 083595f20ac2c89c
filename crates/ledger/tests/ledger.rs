use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use engine::{EngineError, Expense, Group, Money, Notice, NoticeKind, SplitType, Transaction};
use ledger::{
    BalanceSettings, GroupStore, Ledger, LedgerError, MemoryStore, Notifier, NotifyError,
    RetrySettings, Settings, StoreError, Strategy, WriteBatch,
};
use rstest::rstest;
use rust_decimal_macros::dec;

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct DownNotifier {
    attempts: Arc<AtomicU32>,
}

impl Notifier for DownNotifier {
    async fn deliver(&self, _notice: &Notice) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Unavailable("push gateway down".to_string()))
    }
}

fn settings(strategy: Strategy) -> Settings {
    Settings {
        balances: BalanceSettings { strategy },
        retry: RetrySettings {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 4,
            multiplier: 2.0,
        },
        ..Settings::default()
    }
}

fn ledger_with(strategy: Strategy) -> (Ledger<MemoryStore, RecordingNotifier>, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let ledger = Ledger::builder()
        .store(MemoryStore::new())
        .notifier(notifier.clone())
        .settings(settings(strategy))
        .build();
    (ledger, notifier)
}

fn inr(amount: i64) -> Money {
    Money::from(amount)
}

fn balance(group: &Group, currency: &str, member: &str) -> Money {
    group
        .member_balance(member)
        .get(currency)
        .copied()
        .unwrap_or(Money::ZERO)
}

fn snapshot(group: &Group, currency: &str) -> BTreeMap<String, Money> {
    group.balances[currency]
        .iter()
        .map(|entry| (entry.id.clone(), entry.balance))
        .collect()
}

#[tokio::test]
async fn expense_then_payment() {
    let (ledger, notifier) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B", "C"], "INR".into())
        .await
        .unwrap();

    let dinner = ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(90), "INR".into(), "A", &["A", "B", "C"]).with_name("Dinner"),
            "A",
        )
        .await
        .unwrap();
    assert!(!dinner.id.is_empty());
    assert_eq!(dinner.added_by.as_deref(), Some("A"));

    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "A"), inr(60));
    assert_eq!(balance(&stored, "INR", "B"), inr(-30));
    assert_eq!(balance(&stored, "INR", "C"), inr(-30));

    let notices = notifier.take();
    let got: Vec<(&str, Money)> = notices
        .iter()
        .map(|n| (n.recipient.as_str(), n.amount))
        .collect();
    assert_eq!(got, vec![("B", inr(-30)), ("C", inr(-30))]);
    assert!(notices.iter().all(|n| n.kind == NoticeKind::ExpenseAdded));

    ledger
        .add_transaction(
            &group.id,
            Transaction::new(inr(30), "INR".into(), "B", "A"),
            "B",
        )
        .await
        .unwrap();
    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "A"), inr(30));
    assert_eq!(balance(&stored, "INR", "B"), Money::ZERO);
    assert_eq!(balance(&stored, "INR", "C"), inr(-30));

    let notices = notifier.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient, "A");
    assert_eq!(notices[0].kind, NoticeKind::PaymentAdded);

    let for_a = ledger.settle_up(&group.id, "A").await.unwrap();
    assert_eq!(for_a["INR"], BTreeMap::from([("C".to_string(), inr(30))]));
    let for_c = ledger.settle_up(&group.id, "C").await.unwrap();
    assert_eq!(for_c["INR"], BTreeMap::from([("A".to_string(), inr(-30))]));
    assert!(ledger.settle_up(&group.id, "B").await.unwrap().is_empty());
}

async fn busy_history(ledger: &Ledger<MemoryStore, RecordingNotifier>) -> String {
    let group = ledger
        .create_group("Flat", "A", &["B", "C", "D"], "INR".into())
        .await
        .unwrap();
    let id = group.id.as_str();

    let rent = ledger
        .add_expense(
            id,
            Expense::equally(inr(100), "INR".into(), "A", &["A", "B", "C"]),
            "A",
        )
        .await
        .unwrap();
    let groceries = ledger
        .add_expense(
            id,
            Expense::new(
                inr(250),
                "INR".into(),
                "B",
                SplitType::Percentage,
                vec!["A".to_string(), "B".to_string(), "D".to_string()],
                BTreeMap::from([
                    ("A".to_string(), dec!(50)),
                    ("B".to_string(), dec!(30)),
                    ("D".to_string(), dec!(20)),
                ]),
            ),
            "B",
        )
        .await
        .unwrap();
    ledger
        .add_expense(
            id,
            Expense::new(
                Money::from_minor(4550, 2),
                "USD".into(),
                "C",
                SplitType::Shares,
                vec!["C".to_string(), "D".to_string()],
                BTreeMap::from([("C".to_string(), dec!(1)), ("D".to_string(), dec!(2))]),
            ),
            "C",
        )
        .await
        .unwrap();
    let payment = ledger
        .add_transaction(id, Transaction::new(inr(20), "INR".into(), "D", "B"), "D")
        .await
        .unwrap();

    let mut edited = rent.clone();
    edited.amount = inr(120);
    edited.paid_by = BTreeMap::from([("A".to_string(), inr(70)), ("D".to_string(), inr(50))]);
    edited.split_to.push("D".to_string());
    ledger.edit_expense(id, edited, "A").await.unwrap();

    ledger.delete_expense(id, &groceries.id, "B").await.unwrap();
    ledger.restore_expense(id, &groceries.id, "B").await.unwrap();
    ledger.delete_transaction(id, &payment.id, "D").await.unwrap();

    let mut repaid = payment.clone();
    repaid.amount = inr(35);
    ledger.restore_transaction(id, &payment.id, "D").await.unwrap();
    ledger.edit_transaction(id, repaid, "D").await.unwrap();

    group.id
}

#[tokio::test]
async fn strategies_agree_with_a_replay() {
    let (incremental, _) = ledger_with(Strategy::Incremental);
    let (full, _) = ledger_with(Strategy::Full);
    let incremental_id = busy_history(&incremental).await;
    let full_id = busy_history(&full).await;

    let incremental_balances = incremental.balances(&incremental_id).await.unwrap();
    let full_balances = full.balances(&full_id).await.unwrap();
    assert_eq!(incremental_balances, full_balances);
    assert_eq!(
        incremental.recompute_balances(&incremental_id).await.unwrap(),
        incremental_balances
    );

    for entries in incremental_balances.values() {
        let total: Money = entries.iter().map(|entry| entry.balance).sum();
        assert_eq!(total, Money::ZERO);
    }
    let group = incremental.group(&incremental_id).await.unwrap();
    // 120 paid by A 70 and D 50, split by four; 250 paid by B, 50/30/20 for
    // A/B/D; D then paid B 35.
    assert_eq!(balance(&group, "INR", "A"), Money::from(-85));
    assert_eq!(balance(&group, "INR", "B"), Money::from(110));
    assert_eq!(balance(&group, "INR", "C"), Money::from(-30));
    assert_eq!(balance(&group, "INR", "D"), Money::from(5));
    assert_eq!(balance(&group, "USD", "C"), Money::from_minor(3033, 2));
    assert_eq!(balance(&group, "USD", "D"), Money::from_minor(-3033, 2));
    assert_eq!(balance(&group, "USD", "A"), Money::ZERO);
}

#[tokio::test]
async fn recompute_repairs_a_drifted_snapshot() {
    let (ledger, _) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B"], "INR".into())
        .await
        .unwrap();
    ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(50), "INR".into(), "A", &["A", "B"]),
            "A",
        )
        .await
        .unwrap();

    let mut drifted = ledger.group(&group.id).await.unwrap();
    drifted.balances.clear();
    ledger
        .store()
        .commit(WriteBatch::group(drifted))
        .await
        .unwrap();

    let balances = ledger.recompute_balances(&group.id).await.unwrap();
    let repaired = ledger.group(&group.id).await.unwrap();
    assert_eq!(balances, repaired.balances);
    assert_eq!(
        snapshot(&repaired, "INR"),
        BTreeMap::from([("A".to_string(), inr(25)), ("B".to_string(), inr(-25))])
    );
}

#[rstest]
#[case(Strategy::Incremental)]
#[case(Strategy::Full)]
#[tokio::test]
async fn members_leave_only_when_settled(#[case] strategy: Strategy) {
    let (ledger, _) = ledger_with(strategy);
    let group = ledger
        .create_group("Trip", "A", &["B", "C"], "INR".into())
        .await
        .unwrap();
    ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(90), "INR".into(), "A", &["A", "B", "C"]).with_id("dinner"),
            "A",
        )
        .await
        .unwrap();

    let err = ledger.leave_group(&group.id, "B").await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::Engine(EngineError::OutstandingBalance(
            "'B' has -30.00 INR".to_string()
        ))
    );

    ledger
        .add_transaction(
            &group.id,
            Transaction::new(inr(30), "INR".into(), "B", "A"),
            "B",
        )
        .await
        .unwrap();
    let after = ledger.leave_group(&group.id, "B").await.unwrap();
    assert_eq!(after.members, vec!["A", "C"]);
    assert!(snapshot(&after, "INR").get("B").is_none());
    assert_eq!(snapshot(&after, "INR")["A"], inr(30));

    let err = ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(10), "INR".into(), "A", &["A", "B"]),
            "A",
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Engine(EngineError::MemberNotInGroup("B".to_string()))
    );
    let err = ledger
        .delete_expense(&group.id, "dinner", "A")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Engine(EngineError::MemberNotInGroup("B".to_string()))
    );
    assert_eq!(
        ledger.member_balance(&group.id, "B").await.unwrap_err(),
        LedgerError::Engine(EngineError::MemberNotInGroup("B".to_string()))
    );
}

#[tokio::test]
async fn new_members_start_at_zero() {
    let (ledger, _) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B"], "INR".into())
        .await
        .unwrap();
    ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(40), "INR".into(), "A", &["A", "B"]),
            "A",
        )
        .await
        .unwrap();

    let group = ledger.add_member(&group.id, "C", "A").await.unwrap();
    assert_eq!(snapshot(&group, "INR")["C"], Money::ZERO);
    assert_eq!(
        ledger.member_balance(&group.id, "C").await.unwrap(),
        BTreeMap::from([("INR".into(), Money::ZERO)])
    );
    assert_eq!(
        ledger.add_member(&group.id, "C", "A").await.unwrap_err(),
        LedgerError::Engine(EngineError::ExistingKey("C".to_string()))
    );
}

#[tokio::test]
async fn groups_are_deleted_only_when_settled() {
    let (ledger, _) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B"], "INR".into())
        .await
        .unwrap();
    ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(40), "INR".into(), "A", &["A", "B"]),
            "A",
        )
        .await
        .unwrap();

    assert!(matches!(
        ledger.delete_group(&group.id, "A").await,
        Err(LedgerError::Engine(EngineError::OutstandingBalance(_)))
    ));
    ledger
        .add_transaction(
            &group.id,
            Transaction::new(inr(20), "INR".into(), "B", "A"),
            "B",
        )
        .await
        .unwrap();
    ledger.delete_group(&group.id, "A").await.unwrap();
    assert_eq!(
        ledger.group(&group.id).await.unwrap_err(),
        LedgerError::Store(StoreError::NotFound(group.id.clone()))
    );
}

#[tokio::test]
async fn delete_and_restore_toggle_once() {
    let (ledger, notifier) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B"], "INR".into())
        .await
        .unwrap();
    let expense = ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(40), "INR".into(), "A", &["A", "B"]),
            "A",
        )
        .await
        .unwrap();

    let deleted = ledger
        .delete_expense(&group.id, &expense.id, "A")
        .await
        .unwrap();
    assert!(!deleted.is_active);
    assert_eq!(deleted.updated_by.as_deref(), Some("A"));
    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "A"), Money::ZERO);

    assert_eq!(
        ledger
            .delete_expense(&group.id, &expense.id, "A")
            .await
            .unwrap_err(),
        LedgerError::Engine(EngineError::InactiveRecord(expense.id.clone()))
    );
    let mut edit = expense.clone();
    edit.amount = inr(50);
    edit.paid_by = BTreeMap::from([("A".to_string(), inr(50))]);
    assert_eq!(
        ledger.edit_expense(&group.id, edit, "A").await.unwrap_err(),
        LedgerError::Engine(EngineError::InactiveRecord(expense.id.clone()))
    );

    ledger
        .restore_expense(&group.id, &expense.id, "B")
        .await
        .unwrap();
    assert_eq!(
        ledger
            .restore_expense(&group.id, &expense.id, "B")
            .await
            .unwrap_err(),
        LedgerError::Engine(EngineError::ActiveRecord(expense.id.clone()))
    );
    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "A"), inr(20));

    let kinds: Vec<NoticeKind> = notifier.take().into_iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NoticeKind::ExpenseAdded,
            NoticeKind::ExpenseDeleted,
            NoticeKind::ExpenseRestored
        ]
    );
}

#[tokio::test]
async fn invalid_records_never_reach_the_store() {
    let (ledger, notifier) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B"], "INR".into())
        .await
        .unwrap();

    let lopsided = Expense::new(
        inr(100),
        "INR".into(),
        "A",
        SplitType::Percentage,
        vec!["A".to_string(), "B".to_string()],
        BTreeMap::from([("A".to_string(), dec!(70)), ("B".to_string(), dec!(20))]),
    );
    assert!(matches!(
        ledger.add_expense(&group.id, lopsided, "A").await,
        Err(LedgerError::Engine(EngineError::InvalidSplit(_)))
    ));
    assert!(matches!(
        ledger
            .add_transaction(
                &group.id,
                Transaction::new(inr(10), "INR".into(), "A", "A"),
                "A"
            )
            .await,
        Err(LedgerError::Engine(EngineError::InvalidTransaction(_)))
    ));
    assert!(matches!(
        ledger
            .create_group("Trip", "A", &[], "XYZ".into())
            .await,
        Err(LedgerError::Engine(EngineError::UnknownCurrency(_)))
    ));

    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(stored.version, group.version);
    assert!(stored.balances.is_empty());
    assert!(notifier.take().is_empty());
}

async fn cent_history(ledger: &Ledger<MemoryStore, RecordingNotifier>) -> String {
    let group = ledger
        .create_group("Snacks", "C", &["A", "B"], "INR".into())
        .await
        .unwrap();
    let cent = Money::new(dec!(0.01));

    let halves = Expense::new(
        cent,
        "INR".into(),
        "C",
        SplitType::FixedAmount,
        vec!["A".to_string(), "B".to_string()],
        BTreeMap::from([("A".to_string(), dec!(0.005)), ("B".to_string(), dec!(0.005))]),
    );
    assert!(matches!(
        ledger.add_expense(&group.id, halves, "C").await,
        Err(LedgerError::Engine(EngineError::InvalidSplit(_)))
    ));
    let shared_payers = Expense::equally(cent, "INR".into(), "A", &["C"]).paid_by([
        ("A".to_string(), Money::new(dec!(0.005))),
        ("B".to_string(), Money::new(dec!(0.005))),
    ]);
    assert!(matches!(
        ledger.add_expense(&group.id, shared_payers, "A").await,
        Err(LedgerError::Engine(EngineError::InvalidAmount(_)))
    ));

    for _ in 0..2 {
        ledger
            .add_expense(
                &group.id,
                Expense::equally(cent, "INR".into(), "C", &["A", "B"]),
                "C",
            )
            .await
            .unwrap();
    }
    group.id
}

#[tokio::test]
async fn sub_cent_splits_cannot_unbalance_a_group() {
    let (incremental, _) = ledger_with(Strategy::Incremental);
    let (full, _) = ledger_with(Strategy::Full);
    let incremental_id = cent_history(&incremental).await;
    let full_id = cent_history(&full).await;

    let incremental_balances = incremental.balances(&incremental_id).await.unwrap();
    assert_eq!(incremental_balances, full.balances(&full_id).await.unwrap());
    let total: Money = incremental_balances["INR"]
        .iter()
        .map(|entry| entry.balance)
        .sum();
    assert_eq!(total, Money::ZERO);

    // Each cent lands on A, the first participant by id.
    let group = incremental.group(&incremental_id).await.unwrap();
    assert_eq!(balance(&group, "INR", "A"), Money::new(dec!(-0.02)));
    assert_eq!(balance(&group, "INR", "B"), Money::ZERO);
    assert_eq!(balance(&group, "INR", "C"), Money::new(dec!(0.02)));
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let (ledger, _) = ledger_with(Strategy::Incremental);
    let group = ledger
        .create_group("Trip", "A", &["B"], "INR".into())
        .await
        .unwrap();

    ledger.store().fail_next_commits(2);
    ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(40), "INR".into(), "A", &["A", "B"]),
            "A",
        )
        .await
        .unwrap();
    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "B"), inr(-20));

    ledger.store().fail_next_commits(10);
    let err = ledger
        .add_transaction(
            &group.id,
            Transaction::new(inr(20), "INR".into(), "B", "A"),
            "B",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Store(StoreError::Unavailable(_))));
    ledger.store().fail_next_commits(0);

    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "B"), inr(-20));
}

#[tokio::test]
async fn concurrent_writers_do_not_lose_updates() {
    let ledger = Ledger::builder()
        .store(MemoryStore::new())
        .notifier(RecordingNotifier::default())
        .settings(Settings {
            retry: RetrySettings {
                max_attempts: 16,
                initial_delay_ms: 1,
                max_delay_ms: 4,
                multiplier: 2.0,
            },
            ..Settings::default()
        })
        .build();
    let group = ledger
        .create_group("Trip", "A", &["B", "C"], "INR".into())
        .await
        .unwrap();
    let id = group.id.as_str();
    let shared = &ledger;
    let add = move |payer: &'static str, amount: i64| {
        shared.add_expense(
            id,
            Expense::equally(inr(amount), "INR".into(), payer, &["A", "B", "C"]),
            payer,
        )
    };

    let (a, b, c, d) = tokio::join!(add("A", 30), add("B", 60), add("C", 90), add("A", 120));
    for result in [a, b, c, d] {
        result.unwrap();
    }

    let stored = ledger.group(id).await.unwrap();
    assert_eq!(ledger.store().expenses(id).await.unwrap().len(), 4);
    assert_eq!(balance(&stored, "INR", "A"), inr(50));
    assert_eq!(balance(&stored, "INR", "B"), inr(-40));
    assert_eq!(balance(&stored, "INR", "C"), inr(-10));
    assert_eq!(
        ledger.recompute_balances(id).await.unwrap(),
        ledger.group(id).await.unwrap().balances
    );
}

#[tokio::test]
async fn failed_notices_do_not_fail_the_write() {
    let notifier = DownNotifier::default();
    let ledger = Ledger::builder()
        .store(MemoryStore::new())
        .notifier(notifier.clone())
        .settings(settings(Strategy::Incremental))
        .build();
    let group = ledger
        .create_group("Trip", "A", &["B", "C"], "INR".into())
        .await
        .unwrap();

    ledger
        .add_expense(
            &group.id,
            Expense::equally(inr(90), "INR".into(), "A", &["A", "B", "C"]),
            "A",
        )
        .await
        .unwrap();
    // Two recipients, three attempts each.
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 6);
    let stored = ledger.group(&group.id).await.unwrap();
    assert_eq!(balance(&stored, "INR", "A"), inr(60));
}
