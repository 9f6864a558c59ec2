//! Named test users loaded from `users.json`

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

const BUILTIN_USERS: &str = include_str!("../fixtures/users.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Users keyed by type, e.g. `validUser`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fixtures {
    users: BTreeMap<String, FixtureUser>,
}

impl Fixtures {
    /// The users shipped with the crate.
    pub fn builtin() -> E2eResult<Self> {
        Self::parse(BUILTIN_USERS)
    }

    /// Load `<dir>/users.json`.
    pub fn load(dir: &Path) -> E2eResult<Self> {
        let path = dir.join("users.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| E2eError::Fixture(format!("{}: {}", path.display(), e)))?;
        let fixtures = Self::parse(&content)?;
        debug!(path = %path.display(), users = fixtures.users.len(), "Fixtures loaded");
        Ok(fixtures)
    }

    pub fn parse(content: &str) -> E2eResult<Self> {
        let users = serde_json::from_str(content)
            .map_err(|e| E2eError::Fixture(format!("invalid users fixture: {}", e)))?;
        Ok(Self { users })
    }

    pub fn user(&self, user_type: &str) -> E2eResult<&FixtureUser> {
        self.users
            .get(user_type)
            .ok_or_else(|| E2eError::Fixture(format!("user '{}' not found in fixtures", user_type)))
    }

    pub fn user_types(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_users_cover_valid_and_invalid() {
        let fixtures = Fixtures::builtin().unwrap();
        assert_eq!(fixtures.user("validUser").unwrap().email, "teste@email.com");
        assert_eq!(fixtures.user("invalidUser").unwrap().name, None);
        assert!(matches!(fixtures.user("ghost"), Err(E2eError::Fixture(_))));
    }

    #[test]
    fn load_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("users.json"),
            r#"{"admin": {"email": "admin@email.com", "password": "secret1"}}"#,
        )
        .unwrap();
        let fixtures = Fixtures::load(dir.path()).unwrap();
        assert_eq!(fixtures.user_types().collect::<Vec<_>>(), vec!["admin"]);
        assert!(matches!(Fixtures::load(&dir.path().join("missing")), Err(E2eError::Fixture(_))));
    }
}
