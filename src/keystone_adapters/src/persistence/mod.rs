mod hashmap_user_store;
mod models;
mod postgres_user_store;

use std::future::Future;
use std::time::Duration;

use keystone_core::{RequestContext, UserStoreError};
use tokio::time::Instant;
use tracing::Instrument;

pub use hashmap_user_store::HashMapUserStore;
pub use postgres_user_store::{
    PostgresUserStore, USER_SESSIONS_TOKEN_CONSTRAINT, USERS_EMAIL_CONSTRAINT,
    classify_sqlx_error,
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one store operation inside the context's span, bounded by `limit` or
/// the context deadline, whichever comes first.
///
/// An operation whose deadline has already passed fails with `Timeout`
/// without `work` being polled. Failures are logged here and nowhere else.
/// Dropping `work` on timeout drops any open transaction with it, which rolls
/// it back.
async fn run_bounded<T, F>(
    ctx: &RequestContext,
    operation: &'static str,
    limit: Duration,
    work: F,
) -> Result<T, UserStoreError>
where
    F: Future<Output = Result<T, UserStoreError>>,
{
    let span = ctx.span(operation);
    let deadline = Instant::from_std(ctx.effective_deadline(limit));

    async move {
        let result = if deadline <= Instant::now() {
            Err(UserStoreError::Timeout { operation })
        } else {
            match tokio::time::timeout_at(deadline, work).await {
                Ok(result) => result,
                Err(_) => Err(UserStoreError::Timeout { operation }),
            }
        };
        if let Err(error) = &result {
            log_store_error(operation, error);
        }
        result
    }
    .instrument(span)
    .await
}

fn log_store_error(operation: &'static str, error: &UserStoreError) {
    match error {
        UserStoreError::UserNotFound | UserStoreError::IncorrectPassword => {
            tracing::debug!(operation, %error, "store lookup rejected");
        }
        UserStoreError::DuplicateEmail => {
            tracing::warn!(operation, %error, "Duplicate email");
        }
        UserStoreError::Timeout { .. } | UserStoreError::Unexpected { .. } => {
            let span_trace = tracing_error::SpanTrace::capture();
            tracing::error!(operation, error = ?error, %span_trace, "{operation} failed");
        }
    }
}
