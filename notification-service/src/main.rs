use notification_service::{config::NotificationConfig, Application};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("notification-service", "info");
    notification_service::services::init_metrics();

    let config = NotificationConfig::load()?;
    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
