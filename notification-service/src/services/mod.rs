pub mod database;
pub mod metrics;
pub mod providers;

pub use database::NotificationDb;
pub use metrics::{get_metrics, init_metrics, record_notification};
pub use providers::{
    EmailMessage, EmailProvider, MockEmailProvider, ProviderError, ProviderResponse, SmtpProvider,
};
