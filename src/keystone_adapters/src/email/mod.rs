pub mod tracing_email_client;

pub use tracing_email_client::TracingEmailClient;
