use notecal::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting notecal");

    // Load configuration
    let config = startup::load_config()?;

    // Start the web server
    startup::serve(config).await
}
