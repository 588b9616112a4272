use billing_service::config::BillingConfig;
use billing_service::startup::Application;
use service_core::error::AppError;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing("billing-service", "info");

    let config = BillingConfig::load()?;
    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    Ok(())
}
