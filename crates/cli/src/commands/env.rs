//! Environment profile inspection

use std::path::Path;

use clap::Args;
use serde::Serialize;

use manus_e2e::{EnvironmentProfile, HarnessConfig};

use crate::output::{print_fields, OutputFormat};

#[derive(Args)]
pub struct EnvArgs {
    /// Resolve as a CI run
    #[arg(long)]
    pub ci: bool,

    /// Application origin
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,
}

#[derive(Serialize)]
struct EnvView<'a> {
    profile: &'a EnvironmentProfile,
    short_ms: u128,
    medium_ms: u128,
    long_ms: u128,
    extra_long_ms: u128,
    scenario_retries: u32,
    viewport: (u32, u32),
    headless: bool,
}

pub fn execute(args: EnvArgs, config: Option<&Path>, format: OutputFormat) -> anyhow::Result<bool> {
    let config = HarnessConfig::load_or_default(config)?;
    let mut profile = super::resolve_profile(args.ci, args.base_url);
    profile.base_url = config.base_url_for(&profile);

    let timeouts = profile.timeouts();
    let webdriver = config.webdriver_config(&profile);
    let view = EnvView {
        profile: &profile,
        short_ms: timeouts.short.as_millis(),
        medium_ms: timeouts.medium.as_millis(),
        long_ms: timeouts.long.as_millis(),
        extra_long_ms: timeouts.extra_long.as_millis(),
        scenario_retries: config.retries_for(&profile),
        viewport: webdriver.viewport,
        headless: webdriver.headless,
    };

    let fields = [
        ("Environment", profile.environment.to_string()),
        ("Display name", profile.environment.display_name().to_string()),
        ("Run mode", format!("{:?}", profile.run_mode())),
        ("Base URL", profile.base_url.clone().unwrap_or_else(|| "-".into())),
        ("Base path", if profile.base_path.is_empty() { "-".into() } else { profile.base_path.clone() }),
        ("Timeouts", format!(
            "short {}ms / medium {}ms / long {}ms / extra long {}ms",
            view.short_ms, view.medium_ms, view.long_ms, view.extra_long_ms
        )),
        ("Command retry budget", profile.retry_budget.to_string()),
        ("Scenario retries", view.scenario_retries.to_string()),
        ("Viewport", format!("{}x{}", view.viewport.0, view.viewport.1)),
        ("Headless", view.headless.to_string()),
    ];
    print_fields(&view, &fields, format)?;
    Ok(true)
}
