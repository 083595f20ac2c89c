//! Delivery of [`Notice`]s to group members.
//!
//! Notices go out after the write that produced them has been committed. A
//! notice that cannot be delivered is logged and dropped; it never fails or
//! rolls back the mutation.

use engine::Notice;

use crate::{NotifyError, RetrySettings, retry::retry};

pub trait Notifier: Send + Sync {
    fn deliver(&self, notice: &Notice) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Writes every notice to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        tracing::info!(
            "notify {}: {} {} {} {} in group {}",
            notice.recipient,
            notice.kind.as_str(),
            notice.record_id,
            notice.amount,
            notice.currency,
            notice.group_id
        );
        Ok(())
    }
}

/// Delivers `notices` one by one, retrying transient failures.
///
/// Returns how many were delivered.
pub(crate) async fn dispatch<N: Notifier>(
    notifier: &N,
    policy: &RetrySettings,
    notices: &[Notice],
) -> usize {
    let mut delivered = 0;
    for notice in notices {
        match retry(policy, "notify", move || notifier.deliver(notice)).await {
            Ok(()) => delivered += 1,
            Err(err) => tracing::warn!(
                "dropping {} notice for {}: {err}",
                notice.kind.as_str(),
                notice.recipient
            ),
        }
    }
    delivered
}
