use async_trait::async_trait;
use thiserror::Error;

use crate::domain::email::Email;

#[derive(Debug, Error)]
pub enum EmailClientError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_email(
        &self,
        recipient: &Email,
        subject: &str,
        content: &str,
    ) -> Result<(), EmailClientError>;
}
