//! CLI command implementations
//!
//! Every command returns `Ok(true)` on success, `Ok(false)` when scenarios
//! failed, and an error when the harness could not do its job.

pub mod env;
pub mod list;
pub mod run;

use manus_e2e::environment::{resolve, EnvironmentSignals};
use manus_e2e::EnvironmentProfile;

/// Resolve the run's profile from the process environment, with `--ci` and
/// `--base-url` taking precedence over `CI` and `BASE_URL`.
pub fn resolve_profile(ci: bool, base_url: Option<String>) -> EnvironmentProfile {
    let mut signals = EnvironmentSignals::from_env();
    signals.ci |= ci;
    if base_url.is_some() {
        signals.base_url = base_url;
    }
    resolve(&signals)
}
