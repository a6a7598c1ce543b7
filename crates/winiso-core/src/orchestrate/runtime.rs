//! The container runtime, driven through its command-line client.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime binary could not be started at all. Fatal to the run.
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The command ran and failed. Fatal only to the attempt that issued it,
    /// unless the container command itself could not be executed.
    #[error("`{command}` exited with {}: {stderr}", code.map_or("a signal".to_string(), |c| format!("status {c}")))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl RuntimeError {
    /// 126 and 127 mean the container's command could not be executed (missing
    /// binary or shared library). Every later attempt would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::Spawn { .. }
                | RuntimeError::Failed {
                    code: Some(126 | 127),
                    ..
                }
        )
    }
}

/// One container to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: String,
    /// Extra runtime flags (`--shm-size`, `-v`, ...).
    pub flags: Vec<String>,
    /// Command and arguments run inside the container.
    pub command: Vec<String>,
}

impl ContainerSpec {
    /// Arguments for `<runtime> run`. Detached containers print their id only.
    pub fn run_args(&self, detached: bool) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if detached {
            args.push("--detach".to_string());
        }
        args.extend([
            "--name".to_string(),
            self.name.clone(),
            "--network".to_string(),
            self.network.clone(),
        ]);
        args.extend(self.flags.iter().cloned());
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// The primitives an isolated attempt context is built from.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError>;
    /// Start a long-running service container and return once it is started.
    async fn run_detached(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;
    /// Run a container to completion and return its standard output.
    async fn run_capture(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;
    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError>;
}

/// A docker-compatible CLI (`docker`, `podman`).
#[derive(Debug, Clone)]
pub struct CliRuntime {
    program: String,
}

impl CliRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn exec<I, S>(&self, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let command = format!("{} {}", self.program, args.join(" "));
        tracing::debug!("exec: {}", command);
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(RuntimeError::Failed {
                command,
                code: output.status.code(),
                stderr: last_lines(&String::from_utf8_lossy(&output.stderr), 5),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.exec(["network", "create", name]).await.map(drop)
    }

    async fn run_detached(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.exec(spec.run_args(true)).await.map(drop)
    }

    async fn run_capture(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.exec(spec.run_args(false)).await
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.exec(["rm", "--force", name]).await.map(drop)
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.exec(["network", "rm", name]).await.map(drop)
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
