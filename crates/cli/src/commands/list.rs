//! Scenario catalogue listing

use std::sync::Arc;

use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use manus_e2e::fixtures::Fixtures;
use manus_e2e::scenarios::{catalogue, ScenarioFilter};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ListArgs {
    /// Only suites whose name contains this text
    #[arg(long)]
    pub suite: Option<String>,

    /// Only scenarios whose title contains this text
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct ScenarioEntry {
    suite: String,
    title: String,
    environments: Vec<String>,
    fast_login: bool,
}

impl TableDisplay for ScenarioEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Scenario", "Environments", "Fast login"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.suite),
            Cell::new(&self.title),
            Cell::new(self.environments.join(", ")),
            Cell::new(if self.fast_login { "yes" } else { "" }),
        ]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> anyhow::Result<bool> {
    let filter = ScenarioFilter {
        suite: args.suite,
        name: args.name,
    };
    let suites = filter.apply(catalogue(Arc::new(Fixtures::builtin()?)));

    let entries: Vec<ScenarioEntry> = suites
        .iter()
        .flat_map(|suite| {
            suite.execution_order().map(move |scenario| ScenarioEntry {
                suite: suite.name.clone(),
                title: scenario.title.clone(),
                environments: scenario.environments.clone(),
                fast_login: scenario.uses_fast_login,
            })
        })
        .collect();

    print_list(&entries, format)?;
    Ok(true)
}
