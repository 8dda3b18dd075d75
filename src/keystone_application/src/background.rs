//! Detached work that outlives the request which scheduled it.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::Instrument;
use tracing_error::SpanTrace;

#[derive(Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Counts spawned tasks until they finish, whatever way they finish.
///
/// A failing or panicking task is logged and otherwise ignored; it never
/// reaches the caller that spawned it and never takes the process down.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

/// Decrements on drop so every exit path of the supervising task counts.
struct Outstanding(Arc<Inner>);

impl Drop for Outstanding {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Runs `task` on its own tokio task. The task is not cancelled when the
    /// caller's future is dropped.
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        let outstanding = Outstanding(self.inner.clone());
        let span = tracing::info_span!("background_task", task = name);

        let handle = tokio::spawn(task.instrument(span.clone()));
        tokio::spawn(
            async move {
                let _outstanding = outstanding;
                match handle.await {
                    Ok(Ok(())) => tracing::debug!("Background task finished"),
                    Ok(Err(error)) => tracing::error!(
                        %error,
                        span_trace = %SpanTrace::capture(),
                        "Background task failed"
                    ),
                    Err(join_error) if join_error.is_panic() => {
                        let panic = panic_message(join_error.into_panic());
                        tracing::error!(
                            %panic,
                            span_trace = %SpanTrace::capture(),
                            "Background task panicked"
                        );
                    }
                    Err(join_error) => {
                        tracing::warn!(error = %join_error, "Background task cancelled")
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Resolves once no spawned task is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Registered before the check so a wakeup in between is not lost.
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Waits at most `timeout` for outstanding tasks. Returns whether they all
    /// finished.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.wait_idle())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                outstanding = self.outstanding(),
                "Background tasks still running at shutdown"
            );
        }
        drained
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
