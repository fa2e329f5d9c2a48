//! Gateway command - start and inspect the gateway server.

use crate::ui;
use anyhow::{Context, Result};
use ems_core::config::BindMode;

/// Gateway command arguments.
#[derive(Debug, Clone)]
pub struct GatewayArgs {
    /// Subcommand.
    pub action: GatewayAction,
}

/// Gateway actions.
#[derive(Debug, Clone)]
pub enum GatewayAction {
    Run {
        /// Port to listen on.
        port: Option<u16>,
        /// Bind address.
        bind: Option<String>,
        /// Force start even if another instance is running.
        force: bool,
    },
    Status,
}

impl Default for GatewayArgs {
    fn default() -> Self {
        Self {
            action: GatewayAction::Status,
        }
    }
}

/// Run the gateway command.
pub async fn run_gateway(args: GatewayArgs) -> Result<()> {
    match args.action {
        GatewayAction::Run { port, bind, force } => run_gateway_server(port, bind, force).await,
        GatewayAction::Status => gateway_status().await,
    }
}

/// Map a `--bind` value onto a bind mode.
fn parse_bind(bind: &str) -> BindMode {
    match bind {
        "loopback" | "local" => BindMode::Local,
        "lan" | "public" => BindMode::Public,
        addr => BindMode::Custom(addr.to_string()),
    }
}

/// Start the gateway server.
async fn run_gateway_server(port: Option<u16>, bind: Option<String>, force: bool) -> Result<()> {
    let mut config = ems_core::Config::load_default().with_context(|| {
        format!(
            "Failed to load {}",
            ems_core::Config::default_path().display()
        )
    })?;

    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(bind) = bind {
        config.gateway.mode = parse_bind(&bind);
    }
    config.validate()?;

    let bind_address = config.gateway.bind_address();
    let server_port = config.gateway.port;

    // Check if port is already in use
    if !force {
        if let Ok(listener) = std::net::TcpListener::bind(format!("{bind_address}:{server_port}")) {
            drop(listener);
        } else {
            ui::error(&format!(
                "Port {server_port} is already in use. Use --force to override."
            ));
            return Ok(());
        }
    }

    ui::header("Starting EMS Gateway");
    ui::kv("Address", &format!("{bind_address}:{server_port}"));
    ui::kv("Identity", &config.identity.base_url);
    ui::kv("Timeout", &format!("{} ms", config.identity.timeout_ms));
    ui::kv(
        "Pages",
        &config
            .gateway
            .pages_dir
            .as_ref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
    );
    println!();

    ui::info("Gateway is starting...");
    ui::info("Press Ctrl+C to stop");
    println!();

    ems_gateway::start(config).await?;

    Ok(())
}

/// Check gateway status.
async fn gateway_status() -> Result<()> {
    ui::header("Gateway Status");

    let port = ems_core::Config::load_default().map_or(3000, |c| c.gateway.port);

    if tokio::net::TcpStream::connect(format!("127.0.0.1:{port}"))
        .await
        .is_err()
    {
        ui::warning(&format!("Gateway is not running on port {port}"));
        ui::info("Start with: ems gateway run");
        return Ok(());
    }

    ui::success(&format!("Gateway is running on port {port}"));

    let client = reqwest::Client::new();
    let health = client
        .get(format!("http://127.0.0.1:{port}/health"))
        .timeout(std::time::Duration::from_secs(2))
        .send()
        .await;

    match health {
        Ok(resp) if resp.status().is_success() => {
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    ui::kv("Version", version);
                }
                if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
                    ui::kv("Status", status);
                }
                if let Some(gate) = body.get("gate").and_then(|v| v.as_object()) {
                    ui::header("Gate decisions");
                    for (name, count) in gate {
                        ui::kv(name, &count.to_string());
                    }
                }
            }
        }
        Ok(resp) => ui::warning(&format!("Health check answered {}", resp.status())),
        Err(_) => ui::warning("Health check failed"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind() {
        assert!(matches!(parse_bind("loopback"), BindMode::Local));
        assert!(matches!(parse_bind("lan"), BindMode::Public));
        assert!(matches!(parse_bind("10.0.0.5"), BindMode::Custom(addr) if addr == "10.0.0.5"));
    }
}
