use std::process::ExitCode;

use gatehouse::{config, database::MongoConnector, logging, server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // exits with status 1 on any violation
    let config = config::load();

    if let Err(e) = logging::init(&config) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Environment configuration validated successfully");

    match server::run(config, MongoConnector).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal startup or server error");
            ExitCode::FAILURE
        }
    }
}
