//! Launcher spawning detached OS commands

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{LaunchError, LaunchedProcess, ProcessLauncher};

/// Launches one instance of a fixed command per call
///
/// The child runs detached with null stdio and is not killed when the launcher
/// forgets about it. Only the pid is returned; the handle is resolved through the
/// process inventory.
///
/// # Example
///
/// ```
/// use pidwarden_pool::capability::CommandLauncher;
///
/// let launcher = CommandLauncher::new("php", ["bin/worker.php", "--queue=mail"])
///     .with_env("APP_ENV", "prod");
/// ```
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandLauncher {
    /// Create a launcher for `program` with the given arguments
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    /// Set an environment variable for launched processes
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory for launched processes
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The program this launcher starts
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn launch(&self) -> Result<LaunchedProcess, LaunchError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| LaunchError::Spawn(format!("{}: {}", self.program, e)))?;

        let pid = child
            .id()
            .ok_or_else(|| LaunchError::Spawn(format!("{}: exited before pid", self.program)))?;

        debug!(program = %self.program, pid, "spawned process");
        Ok(LaunchedProcess::new(pid.to_string()))
    }
}
