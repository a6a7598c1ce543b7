//! Isolated execution context of one attempt: private network, headless
//! browser container and a driver container running `winiso resolve`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{NavigationConfig, OrchestrationConfig};
use crate::link::DownloadLink;

use super::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};
use super::{AttemptError, AttemptId, AttemptRunner};

/// Where the running executable is mounted inside the driver container.
const DRIVER_EXE: &str = "/usr/local/bin/winiso";
/// Mount point of the diagnostics directory inside the driver container.
const DRIVER_DUMP_DIR: &str = "/dump";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resource {
    Network(String),
    Container(String),
}

/// Tracks what an attempt created so it can be removed in reverse order.
///
/// A resource is recorded before the command creating it runs, so an
/// interrupted creation is still cleaned up.
pub struct IsolatedContext<R: ContainerRuntime> {
    runtime: Arc<R>,
    created: Vec<Resource>,
}

impl<R: ContainerRuntime> IsolatedContext<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            created: Vec::new(),
        }
    }

    pub async fn create_network(&mut self, name: &str) -> Result<(), RuntimeError> {
        self.created.push(Resource::Network(name.to_string()));
        self.runtime.create_network(name).await
    }

    pub async fn run_detached(&mut self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.created.push(Resource::Container(spec.name.clone()));
        self.runtime.run_detached(spec).await
    }

    pub async fn run_capture(&mut self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.created.push(Resource::Container(spec.name.clone()));
        self.runtime.run_capture(spec).await
    }

    /// Remove everything created, newest first. Failures are logged and
    /// do not stop the remaining removals.
    pub async fn teardown(mut self) {
        while let Some(resource) = self.created.pop() {
            let removed = match &resource {
                Resource::Container(name) => self.runtime.remove_container(name).await,
                Resource::Network(name) => self.runtime.remove_network(name).await,
            };
            if let Err(e) = removed {
                tracing::warn!(?resource, "teardown: {}", e);
            }
        }
    }
}

/// Names of the resources of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextNames {
    pub network: String,
    pub browser: String,
    pub driver: String,
}

impl ContextNames {
    pub fn new(run_id: &str, id: AttemptId) -> Self {
        let prefix = format!("{run_id}-{id}");
        Self {
            network: format!("{prefix}-net"),
            browser: format!("{prefix}-browser"),
            driver: format!("{prefix}-driver"),
        }
    }
}

/// How browser and driver containers are built.
#[derive(Debug, Clone)]
pub struct DriverPlan {
    pub browser_image: String,
    pub browser_port: u16,
    pub shm_size: String,
    pub driver_image: String,
    /// Host path of the `winiso` executable mounted into the driver.
    pub exe: PathBuf,
    pub dump_dir: Option<PathBuf>,
    pub navigation: NavigationConfig,
}

impl DriverPlan {
    pub fn new(orch: &OrchestrationConfig, navigation: &NavigationConfig, exe: PathBuf) -> Self {
        Self {
            browser_image: orch.browser_image.clone(),
            browser_port: orch.browser_port,
            shm_size: orch.shm_size.clone(),
            driver_image: orch.driver_image.clone(),
            exe,
            dump_dir: orch.dump_dir.as_deref().map(absolute_dir),
            navigation: navigation.clone(),
        }
    }

    pub fn browser_spec(&self, names: &ContextNames) -> ContainerSpec {
        ContainerSpec {
            name: names.browser.clone(),
            image: self.browser_image.clone(),
            network: names.network.clone(),
            flags: vec!["--shm-size".to_string(), self.shm_size.clone()],
            command: Vec::new(),
        }
    }

    pub fn driver_spec(&self, names: &ContextNames) -> ContainerSpec {
        let nav = &self.navigation;
        let mut flags = vec![
            "--volume".to_string(),
            format!("{}:{}:ro", self.exe.display(), DRIVER_EXE),
        ];
        let mut command = vec![
            DRIVER_EXE.to_string(),
            "resolve".to_string(),
            "--endpoint".to_string(),
            format!("http://{}:{}", names.browser, self.browser_port),
            "--url".to_string(),
            nav.url.clone(),
            "--language".to_string(),
            nav.language.clone(),
            "--timeout-secs".to_string(),
            nav.timeout_secs.to_string(),
            "--pacing-min-ms".to_string(),
            nav.pacing_min_ms.to_string(),
            "--pacing-max-ms".to_string(),
            nav.pacing_max_ms.to_string(),
        ];
        match &nav.link_text {
            Some(text) => command.extend(["--link-text".to_string(), text.clone()]),
            None => command.push("--no-link-text".to_string()),
        }
        if let Some(edition) = &nav.edition {
            command.extend(["--edition".to_string(), edition.clone()]);
        }
        if let Some(dir) = &self.dump_dir {
            flags.extend([
                "--volume".to_string(),
                format!("{}:{}", dir.join(&names.driver).display(), DRIVER_DUMP_DIR),
            ]);
            command.extend(["--dump-dir".to_string(), DRIVER_DUMP_DIR.to_string()]);
        }
        ContainerSpec {
            name: names.driver.clone(),
            image: self.driver_image.clone(),
            network: names.network.clone(),
            flags,
            command,
        }
    }
}

/// Bind mounts need an absolute host path; a relative one is taken for a
/// named volume.
fn absolute_dir(dir: &Path) -> PathBuf {
    std::path::absolute(dir).unwrap_or_else(|e| {
        tracing::warn!("cannot make {} absolute: {}", dir.display(), e);
        dir.to_path_buf()
    })
}

/// Runs each attempt as network + browser + driver containers.
pub struct ContainerAttemptRunner<R: ContainerRuntime> {
    runtime: Arc<R>,
    plan: DriverPlan,
    run_id: String,
}

impl<R: ContainerRuntime> ContainerAttemptRunner<R> {
    pub fn new(runtime: Arc<R>, plan: DriverPlan, run_id: impl Into<String>) -> Self {
        Self {
            runtime,
            plan,
            run_id: run_id.into(),
        }
    }

    async fn drive(
        &self,
        ctx: &mut IsolatedContext<R>,
        names: &ContextNames,
    ) -> Result<DownloadLink, AttemptError> {
        ctx.create_network(&names.network).await.map_err(classify)?;
        ctx.run_detached(&self.plan.browser_spec(names))
            .await
            .map_err(classify)?;
        if let Some(dir) = &self.plan.dump_dir {
            let sub = dir.join(&names.driver);
            if let Err(e) = tokio::fs::create_dir_all(&sub).await {
                tracing::warn!("cannot create {}: {}", sub.display(), e);
            }
        }
        let stdout = ctx
            .run_capture(&self.plan.driver_spec(names))
            .await
            .map_err(classify)?;
        let line = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or_default();
        DownloadLink::parse(line).map_err(|e| AttemptError::Failed(e.to_string()))
    }
}

fn classify(e: RuntimeError) -> AttemptError {
    if e.is_fatal() {
        AttemptError::Fatal(e.into())
    } else {
        AttemptError::Failed(describe_failure(&e))
    }
}

/// Annotate a driver exit status with the navigation failure it stands for.
fn describe_failure(e: &RuntimeError) -> String {
    let kind = match e {
        RuntimeError::Failed { code: Some(3), .. } => "step timed out",
        RuntimeError::Failed { code: Some(4), .. } => "no matching option",
        RuntimeError::Failed { code: Some(5), .. } => "no download link",
        RuntimeError::Failed { code: Some(6), .. } => "browser error",
        _ => return e.to_string(),
    };
    format!("{kind} ({e})")
}

#[async_trait]
impl<R: ContainerRuntime> AttemptRunner for ContainerAttemptRunner<R> {
    async fn run_attempt(
        &self,
        id: AttemptId,
        cancel: CancellationToken,
    ) -> Result<DownloadLink, AttemptError> {
        let names = ContextNames::new(&self.run_id, id);
        tracing::debug!(%id, network = %names.network, "provisioning attempt context");
        let mut ctx = IsolatedContext::new(Arc::clone(&self.runtime));
        let result = tokio::select! {
            r = self.drive(&mut ctx, &names) => r,
            _ = cancel.cancelled() => Err(AttemptError::Cancelled),
        };
        ctx.teardown().await;
        result
    }
}
