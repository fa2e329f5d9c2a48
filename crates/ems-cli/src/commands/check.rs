//! Check command - dry-run one gate decision.

use std::sync::Arc;

use crate::ui;
use anyhow::{Context, Result};
use ems_core::Credential;
use ems_gateway::auth::{
    AccessGate, CookieSession, CredentialSlot, Decision, HttpIdentityResolver, RouteTable,
    canonical_path,
};

/// Check command arguments.
#[derive(Debug, Clone)]
pub struct CheckArgs {
    /// Path to evaluate.
    pub path: String,
    /// Credential passed on the command line.
    pub token: Option<String>,
    /// Ask for the credential instead.
    pub prompt: bool,
}

fn slot_from(raw: Option<&str>) -> CredentialSlot {
    match raw {
        Some(raw) => Credential::parse(raw).map_or(CredentialSlot::Empty, CredentialSlot::Present),
        None => CredentialSlot::Absent,
    }
}

/// Evaluate `args.path` the way the running gateway would.
pub async fn run_check(args: CheckArgs) -> Result<()> {
    let config = ems_core::Config::load_default()?;

    let routes = RouteTable::from_config(&config.routes).context("Invalid route table")?;
    let session = CookieSession::from_config(&config.session).context("Invalid session cookie")?;
    let resolver = HttpIdentityResolver::from_config(&config.identity)?;
    let endpoint = resolver.endpoint().to_string();
    let gate = AccessGate::new(routes, Arc::new(session), Arc::new(resolver))
        .with_empty_credential_clearing(config.session.clear_empty_cookie);

    let raw = if args.prompt {
        Some(ui::prompts::password("Credential")?)
    } else {
        args.token
    };
    let slot = slot_from(raw.as_deref());
    let path = canonical_path(&args.path).context("Path would be rejected with 400")?;

    tracing::debug!(path = %path, endpoint = %endpoint, "Checking");

    let evaluation = gate.evaluate(&path, &slot).await;

    ui::header("Gate decision");
    ui::kv("Path", &path);
    match &evaluation.decision {
        Decision::Allow => ui::success("Allow"),
        Decision::Redirect {
            to,
            clear_credential,
        } => {
            ui::warning(&format!("Redirect to {}", to.location()));
            if *clear_credential {
                ui::info("Credential cookie would be cleared");
            }
        }
    }
    ui::kv("Reason", evaluation.reason.as_str());
    if let Some(identity) = &evaluation.identity {
        ui::kv("Role", identity.role.as_str());
        if let Some(name) = &identity.name {
            ui::kv("Name", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from() {
        assert!(matches!(slot_from(None), CredentialSlot::Absent));
        assert!(matches!(slot_from(Some("  ")), CredentialSlot::Empty));
        assert!(matches!(slot_from(Some("abc")), CredentialSlot::Present(_)));
    }
}
