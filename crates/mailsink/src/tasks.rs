//! Supervision of the listener and delivery tasks.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Spawns a listener loop.
///
/// The task resolves to true when the loop returned while `cancel` was still
/// live, which means the listener died on its own.
pub fn spawn_listener(
    name: &'static str,
    cancel: CancellationToken,
    listener: impl Future<Output = ()> + Send + 'static,
) -> JoinHandle<bool> {
    tokio::spawn(async move {
        listener.await;
        let stopped_early = !cancel.is_cancelled();
        if stopped_early {
            error!(task = name, "Listener stopped before shutdown was requested");
        }
        stopped_early
    })
}

/// Logs how a joined task ended; returns true if it ended cleanly.
pub fn finished(name: &str, result: Result<bool, JoinError>) -> bool {
    match result {
        Ok(stopped_early) => !stopped_early,
        Err(e) if e.is_panic() => {
            error!(task = name, "Task panicked");
            false
        }
        Err(e) => {
            error!(task = name, error = %e, "Task failed");
            false
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_ending_after_cancel_is_clean() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = spawn_listener("SMTP", cancel.clone(), async move { token.cancelled().await });
        cancel.cancel();
        assert!(finished("SMTP", task.await));
    }

    #[tokio::test]
    async fn listener_ending_on_its_own_is_reported() {
        let task = spawn_listener("POP3", CancellationToken::new(), async {});
        assert!(task.await.unwrap());
    }

    #[tokio::test]
    async fn panicked_task_is_not_clean() {
        let task = spawn_listener("IMAP", CancellationToken::new(), async {
            panic!("listener crashed");
        });
        assert!(!finished("IMAP", task.await));
    }
}
