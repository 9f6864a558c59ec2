//! Built-in scenario catalogue
//!
//! Four suites covering the application: authentication, registration,
//! dashboard CRUD and environment detection. [`ScenarioFilter`] narrows the
//! catalogue by suite or title before a run.

mod auth;
mod dashboard;
mod environment;
mod register;

use std::sync::Arc;

use crate::fixtures::Fixtures;
use crate::runner::Suite;

/// Every built-in suite, in run order.
pub fn catalogue(fixtures: Arc<Fixtures>) -> Vec<Suite> {
    vec![
        auth::suite(fixtures),
        register::suite(),
        dashboard::suite(),
        environment::suite(),
    ]
}

/// Case-insensitive substring filter on suite names and scenario titles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    pub suite: Option<String>,
    pub name: Option<String>,
}

impl ScenarioFilter {
    pub fn is_empty(&self) -> bool {
        self.suite.is_none() && self.name.is_none()
    }

    /// Keep matching scenarios; suites left empty are dropped.
    pub fn apply(&self, suites: Vec<Suite>) -> Vec<Suite> {
        let suite_filter = self.suite.as_deref().map(str::to_lowercase);
        let name_filter = self.name.as_deref().map(str::to_lowercase);
        suites
            .into_iter()
            .filter(|suite| {
                suite_filter
                    .as_deref()
                    .map_or(true, |f| suite.name.to_lowercase().contains(f))
            })
            .filter_map(|mut suite| {
                if let Some(f) = name_filter.as_deref() {
                    suite.scenarios.retain(|s| s.title.to_lowercase().contains(f));
                }
                (!suite.scenarios.is_empty()).then_some(suite)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Vec<Suite> {
        catalogue(Arc::new(Fixtures::builtin().unwrap()))
    }

    #[test]
    fn catalogue_has_four_suites() {
        let names: Vec<String> = all().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Authentication", "Registration", "Dashboard", "Environment"]);
    }

    #[test]
    fn titles_are_unique() {
        let mut titles: Vec<String> = all()
            .into_iter()
            .flat_map(|s| s.scenarios.into_iter().map(|sc| sc.title))
            .collect();
        let total = titles.len();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), total);
    }

    #[test]
    fn filter_by_suite_and_name() {
        let filter = ScenarioFilter {
            suite: Some("dash".into()),
            name: Some("BULK".into()),
        };
        let suites = filter.apply(all());
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name, "Dashboard");
        assert!(suites[0].scenarios.iter().all(|s| s.title.contains("bulk")));
        assert!(!suites[0].scenarios.is_empty());
    }

    #[test]
    fn unmatched_filter_is_empty() {
        let filter = ScenarioFilter {
            suite: None,
            name: Some("no such scenario".into()),
        };
        assert!(filter.apply(all()).is_empty());
        assert!(ScenarioFilter::default().is_empty());
    }
}
