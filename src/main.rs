use anyhow::Result;
use tracing::{error, info};

use polite_crawler::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Logging is set up once the configuration is known
    match cli::process_command(args).await {
        Ok(_) => {
            info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Crawl failed: {:#}", e);
            Err(e)
        }
    }
}
