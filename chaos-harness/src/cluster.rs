//! Cluster lifecycle through `bootstrap.sh`.
//!
//! The script owns everything about how servers are laid out and started;
//! this module only invokes its four verbs:
//!
//! ```text
//! bootstrap.sh setup
//! bootstrap.sh stop <id>
//! bootstrap.sh start <id>
//! bootstrap.sh status
//! ```

use async_trait::async_trait;
use chaos_core::ServerId;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::command::{self, CommandError, CommandOutput};
use crate::config::ClusterConfig;

/// Lifecycle operations on a cluster.
///
/// Implemented by [`BootstrapCluster`]; tests substitute scripted clusters.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Create and start the whole cluster.
    async fn setup(&self) -> Result<(), CommandError>;

    /// Stop one server.
    async fn stop(&self, server: ServerId) -> Result<(), CommandError>;

    /// Start one server.
    async fn start(&self, server: ServerId) -> Result<(), CommandError>;

    /// Number of servers currently alive.
    async fn live_servers(&self) -> Result<u32, CommandError>;
}

/// Cluster driven by an external `bootstrap.sh`.
#[derive(Debug, Clone)]
pub struct BootstrapCluster {
    script: PathBuf,
    interpreter: Option<String>,
    work_dir: Option<PathBuf>,
    status_pattern: String,
}

impl BootstrapCluster {
    /// Build from configuration.
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            script: config.bootstrap.clone(),
            interpreter: config.interpreter.clone(),
            work_dir: config.work_dir.clone(),
            status_pattern: config.status_pattern.clone(),
        }
    }

    /// Raw `status` output.
    pub async fn status(&self) -> Result<CommandOutput, CommandError> {
        self.invoke(&["status".to_string()]).await
    }

    async fn invoke(&self, verb: &[String]) -> Result<CommandOutput, CommandError> {
        let mut args: Vec<OsString> = Vec::with_capacity(verb.len() + 1);
        let program: OsString = match &self.interpreter {
            Some(interpreter) => {
                args.push(self.script.clone().into_os_string());
                interpreter.into()
            }
            None => self.script.clone().into_os_string(),
        };
        args.extend(verb.iter().map(OsString::from));
        command::exec_ok(program, args, self.work_dir.as_deref()).await
    }
}

#[async_trait]
impl Cluster for BootstrapCluster {
    async fn setup(&self) -> Result<(), CommandError> {
        self.invoke(&["setup".to_string()]).await?;
        Ok(())
    }

    async fn stop(&self, server: ServerId) -> Result<(), CommandError> {
        self.invoke(&["stop".to_string(), server.to_string()])
            .await?;
        Ok(())
    }

    async fn start(&self, server: ServerId) -> Result<(), CommandError> {
        self.invoke(&["start".to_string(), server.to_string()])
            .await?;
        Ok(())
    }

    async fn live_servers(&self) -> Result<u32, CommandError> {
        let output = self.status().await?;
        Ok(count_live(&output.stdout, &self.status_pattern))
    }
}

/// Count the lines of `status` output that report `pattern`.
///
/// The pattern must appear as a whole word and must not follow "not", so
/// "not running" and "rerunning" do not count as "running".
pub fn count_live(stdout: &str, pattern: &str) -> u32 {
    stdout
        .lines()
        .filter(|line| reports_live(line, pattern))
        .count() as u32
}

fn reports_live(line: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let word_start = pattern.chars().next().is_some_and(is_word_char);
    let word_end = pattern.chars().next_back().is_some_and(is_word_char);

    line.match_indices(pattern).any(|(at, _)| {
        let before = &line[..at];
        let after = &line[at + pattern.len()..];
        let joined_before = word_start && before.chars().next_back().is_some_and(is_word_char);
        let joined_after = word_end && after.chars().next().is_some_and(is_word_char);
        !joined_before && !joined_after && !negated(before)
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn negated(before: &str) -> bool {
    before
        .split_whitespace()
        .next_back()
        .is_some_and(|word| word.eq_ignore_ascii_case("not"))
}
