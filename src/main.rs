use auth_redirect::{config::GatewayConfig, error::Result, init_gateway, init_tracing};
use std::process::ExitCode;

const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

async fn run(config_path: &str) -> Result<()> {
    let config = GatewayConfig::from_file(config_path)?;
    init_gateway(config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    match run(&config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(config = %config_path, error = %e, "auth-redirect exited");
            ExitCode::FAILURE
        }
    }
}
