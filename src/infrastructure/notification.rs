//! Best-effort email notification delivery.
//!
//! Delivery runs on a spawned task with a small bounded retry and jittered
//! backoff. Failures are logged and swallowed; the realtime send path never
//! waits on or fails because of a notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::domain::repository::NotificationDispatcher;

pub struct RetryingNotifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryingNotifier {
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatcher>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            dispatcher,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Fire-and-forget delivery; returns immediately.
    pub fn spawn_send(&self, to_email: String, from_name: String, from_email: String, body: String) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let max_attempts = self.max_attempts;
        let backoff = self.backoff;
        tokio::spawn(async move {
            for attempt in 1..=max_attempts {
                match dispatcher
                    .send_inquiry_email(&to_email, &from_name, &from_email, &body)
                    .await
                {
                    Ok(()) => {
                        debug!(to = %to_email, attempt, "inquiry email dispatched");
                        return;
                    }
                    Err(err) => {
                        warn!(to = %to_email, attempt, error = %err, "inquiry email failed");
                    }
                }
                if attempt < max_attempts {
                    let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                    tokio::time::sleep(backoff * attempt + Duration::from_millis(jitter)).await;
                }
            }
            warn!(to = %to_email, attempts = max_attempts, "giving up on inquiry email");
        });
    }
}

/// Dispatcher that only logs; stands in when no mailer is wired.
#[derive(Default)]
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn send_inquiry_email(
        &self,
        to_email: &str,
        from_name: &str,
        _from_email: &str,
        _body: &str,
    ) -> anyhow::Result<()> {
        info!(to = %to_email, from = %from_name, "inquiry email (logging dispatcher)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct FlakyDispatcher {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl NotificationDispatcher for FlakyDispatcher {
        async fn send_inquiry_email(
            &self,
            _to_email: &str,
            _from_name: &str,
            _from_email: &str,
            _body: &str,
        ) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let dispatcher = Arc::new(FlakyDispatcher {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let notifier = RetryingNotifier::new(dispatcher.clone(), 3, Duration::from_millis(5));
        notifier.spawn_send(
            "owner@example.com".into(),
            "Tenant".into(),
            "tenant@example.com".into(),
            "Is this still available?".into(),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let dispatcher = Arc::new(FlakyDispatcher {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let notifier = RetryingNotifier::new(dispatcher.clone(), 2, Duration::from_millis(5));
        notifier.spawn_send(
            "owner@example.com".into(),
            "Tenant".into(),
            "tenant@example.com".into(),
            "hello".into(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }
}
