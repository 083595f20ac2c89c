//! Group balance service.
//!
//! Wraps the pure [`engine`] with persistence, concurrency control and
//! notifications:
//!
//! - [`Ledger`]: the operations (groups, members, expenses, payments,
//!   balances, settle-up), built with [`Ledger::builder`].
//! - [`GroupStore`]: the persistence port, with the in-process
//!   [`MemoryStore`].
//! - [`Notifier`]: where notices go once a change is committed.
//! - [`Settings`]: balance strategy, retry policy and log level, loaded with
//!   `config`.
//!
//! ```rust,no_run
//! use ledger::{Ledger, MemoryStore, Settings, telemetry};
//!
//! # async fn run() -> ledger::LedgerResult<()> {
//! let settings = Settings::new(None)?;
//! telemetry::init(&settings.log.level);
//! let ledger = Ledger::builder()
//!     .store(MemoryStore::new())
//!     .settings(settings)
//!     .build();
//! let group = ledger.create_group("Trip", "A", &["B", "C"], "INR".into()).await?;
//! println!("{:?}", ledger.balances(&group.id).await?);
//! # Ok(())
//! # }
//! ```

pub use error::{LedgerError, LedgerResult, NotifyError, StoreError, Transient};
pub use notifier::{LogNotifier, Notifier};
pub use ops::{Ledger, LedgerBuilder};
pub use settings::{BalanceSettings, LogSettings, RetrySettings, Settings, Strategy};
pub use store::{GroupStore, MemoryStore, StoreResult, WriteBatch};

mod error;
mod notifier;
mod ops;
pub mod retry;
mod settings;
mod store;
pub mod telemetry;
