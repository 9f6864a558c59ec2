//! Application server lifecycle - spawning and health checking the app under test

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// How to start the application under test.
///
/// Typically the bundler's preview server, e.g. `npm run preview` answering
/// on `http://localhost:4173`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppServerConfig {
    /// Program to run
    pub command: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Working directory (None = current directory)
    pub working_dir: Option<PathBuf>,

    /// Extra environment for the server process
    pub env: BTreeMap<String, String>,

    /// Origin the server answers on once started
    pub base_url: String,

    /// Path probed for readiness, relative to `base_url`
    pub health_path: String,

    /// Give up if the server is not healthy after this many seconds
    pub startup_timeout_secs: u64,

    /// Delay between health probes, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for AppServerConfig {
    fn default() -> Self {
        Self {
            command: "npm".to_string(),
            args: vec!["run".to_string(), "preview".to_string()],
            working_dir: None,
            env: BTreeMap::new(),
            base_url: "http://localhost:4173".to_string(),
            health_path: "/".to_string(),
            startup_timeout_secs: 60,
            poll_interval_ms: 100,
        }
    }
}

impl AppServerConfig {
    pub fn health_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.health_path.trim_start_matches('/')
        )
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Handle to a running application server. Stopped on drop.
pub struct AppServer {
    child: Child,
    base_url: String,
}

impl AppServer {
    /// Spawn the server and wait until it answers its health probe.
    pub async fn spawn(config: &AppServerConfig) -> E2eResult<Self> {
        info!(command = %config.command, args = ?config.args, "Spawning application server");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("failed to spawn {}: {}", config.command, e))
        })?;

        let mut server = AppServer {
            child,
            base_url: config.base_url.clone(),
        };

        if let Err(e) = server.wait_for_healthy(config).await {
            let _ = server.stop();
            return Err(e);
        }

        info!(base_url = %server.base_url, "Application server is healthy");
        Ok(server)
    }

    async fn wait_for_healthy(&mut self, config: &AppServerConfig) -> E2eResult<()> {
        let health_url = config.health_url();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < config.startup_timeout() {
            attempts += 1;

            if let Some(status) = self.child.try_wait()? {
                return Err(E2eError::ServerStartup(format!(
                    "server exited before becoming healthy ({})",
                    status
                )));
            }

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!(status = %resp.status(), "Health check failed"),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application server...");
                    }
                    // Connection refused is expected while the server boots
                    if !e.is_connect() {
                        warn!(error = %e, "Health check error");
                    }
                }
            }

            sleep(Duration::from_millis(config.poll_interval_ms)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// SIGTERM, short grace period, then kill.
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        info!(pid = self.child.id(), "Stopping application server");

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        if self.child.try_wait()?.is_none() {
            debug!("Server ignored SIGTERM, killing");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_url_joins_without_double_slash() {
        let config = AppServerConfig {
            base_url: "http://localhost:4173/".into(),
            health_path: "/pipelineManus/".into(),
            ..Default::default()
        };
        assert_eq!(config.health_url(), "http://localhost:4173/pipelineManus/");
    }

    #[test]
    fn default_targets_preview_server() {
        let config = AppServerConfig::default();
        assert_eq!(config.health_url(), "http://localhost:4173/");
        assert_eq!(config.startup_timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn missing_binary_is_a_startup_error() {
        let config = AppServerConfig {
            command: "/nonexistent/manus-app-server".into(),
            args: vec![],
            ..Default::default()
        };
        let err = AppServer::spawn(&config).await.err().unwrap();
        assert!(matches!(err, E2eError::ServerStartup(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn early_exit_is_reported() {
        let config = AppServerConfig {
            command: "true".into(),
            args: vec![],
            base_url: "http://127.0.0.1:9".into(),
            startup_timeout_secs: 5,
            poll_interval_ms: 50,
            ..Default::default()
        };
        let err = AppServer::spawn(&config).await.err().unwrap();
        assert!(matches!(err, E2eError::ServerStartup(_)), "{}", err);
    }
}
