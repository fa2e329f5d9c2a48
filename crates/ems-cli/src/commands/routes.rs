//! Routes command - print the gated route table.

use crate::ui;
use anyhow::Result;
use ems_core::Config;
use ems_gateway::RouteTable;

/// Print the route table after validating it.
pub fn run_routes() -> Result<()> {
    print_routes(&Config::load_default()?)
}

fn print_routes(config: &Config) -> Result<()> {
    let table = match RouteTable::from_config(&config.routes) {
        Ok(table) => table,
        Err(e) => {
            ui::error(&format!("Route table rejected: {e}"));
            anyhow::bail!(e);
        }
    };

    ui::header("Protected prefixes");
    ui::table_row(&[("PREFIX", 20), ("ROLE", 12), ("LOGIN", 20)]);
    for rule in table.rules() {
        ui::table_row(&[
            (rule.prefix(), 20),
            (rule.required_role().as_str(), 12),
            (rule.login_redirect(), 20),
        ]);
    }

    ui::header("Login pages");
    for route in table.login_routes() {
        let roles = route
            .roles()
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        ui::kv(route.path(), &roles);
    }

    ui::header("Matcher");
    for pattern in table.matcher_patterns() {
        println!("  {pattern}");
    }
    println!();
    ui::success("Route table is valid");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes_print() {
        assert!(print_routes(&Config::default()).is_ok());
    }

    #[test]
    fn test_shadowed_rule_from_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ems.json");
        std::fs::write(
            &path,
            r#"{
                routes: {
                    rules: [
                        { prefix: "/hr", role: "HR", loginRedirect: "/auth/login" },
                        { prefix: "/hr/payroll", role: "ADMIN", loginRedirect: "/admin/login" },
                    ],
                },
            }"#,
        )
        .unwrap();

        let config = Config::load_or_default(&path, |_| None).unwrap();
        let err = print_routes(&config).unwrap_err();
        assert!(err.to_string().contains("/hr/payroll"));
    }

    #[test]
    fn test_narrow_rule_first_from_file_prints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ems.json");
        std::fs::write(
            &path,
            r#"{
                routes: {
                    rules: [
                        { prefix: "/hr/payroll", role: "ADMIN", loginRedirect: "/admin/login" },
                        { prefix: "/hr", role: "HR", loginRedirect: "/auth/login" },
                    ],
                },
            }"#,
        )
        .unwrap();

        let config = Config::load_or_default(&path, |_| None).unwrap();
        assert!(print_routes(&config).is_ok());
    }
}
