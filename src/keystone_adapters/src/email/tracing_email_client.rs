use keystone_core::{Email, EmailClient, EmailClientError};

/// Delivers nothing; each message becomes an `info` event saying so. Stands
/// in for a real mail provider in local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct TracingEmailClient;

impl TracingEmailClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl EmailClient for TracingEmailClient {
    async fn send_email(
        &self,
        _recipient: &Email,
        subject: &str,
        content: &str,
    ) -> Result<(), EmailClientError> {
        tracing::info!(
            subject,
            content_length = content.len(),
            "Email not sent (tracing client)"
        );
        Ok(())
    }
}
