//! Plan listing and checkout.

use anyhow::{Result, anyhow};
use comfy_table::{ContentArrangement, Table};
use magiclink_core::checkout::{CheckoutClient, PLANS, Plan, find_plan};
use magiclink_core::config::Config;
use magiclink_core::providers::AuthProvider;
use tracing::warn;

use super::authenticator;
use crate::cli::ui::NO_BROWSER_ENV;

fn plans_table(plans: &[Plan]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Plan", "Price", "Features"]);
    for plan in plans {
        let features = plan
            .features
            .iter()
            .map(|f| format!("{}: {}", f.name, f.description))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            plan.id.to_string(),
            plan.name.to_string(),
            plan.price_label(),
            features,
        ]);
    }
    table
}

pub fn plans() {
    println!("{}", plans_table(PLANS));
}

pub async fn subscribe(config: &Config, plan_id: &str) -> Result<()> {
    let plan = find_plan(plan_id).ok_or_else(|| {
        let known = PLANS.iter().map(|p| p.id).collect::<Vec<_>>().join(", ");
        anyhow!("Unknown plan '{plan_id}'. Available plans: {known}")
    })?;

    let auth = authenticator(config)?;
    let session = auth.provider().get_session().await.unwrap_or_else(|err| {
        warn!(error = %err, "could not load session for checkout");
        None
    });

    let checkout = CheckoutClient::from_config(config)?;
    let url = checkout
        .create_checkout_session(session.as_ref(), plan)
        .await?;

    println!("Checkout for {} ({}):", plan.name, plan.price_label());
    println!("  {url}");
    if std::env::var_os(NO_BROWSER_ENV).is_none()
        && let Err(err) = open::that(&url)
    {
        warn!(error = %err, "failed to open browser");
    }
    Ok(())
}
