use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Form navigation parameters (optional `[navigation]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Page hosting the edition/language form.
    pub url: String,
    /// Language label matched against the `language` field of each option payload.
    pub language: String,
    /// Edition option value to pick. When unset the first numeric option is used.
    pub edition: Option<String>,
    /// Deadline for every wait-until-ready step, in seconds.
    pub timeout_secs: u64,
    /// Lower bound of the randomized delay inserted before each action.
    pub pacing_min_ms: u64,
    /// Upper bound (exclusive) of the randomized delay.
    pub pacing_max_ms: u64,
    /// Visible text of the preferred download anchor. Any anchor carrying the
    /// download-type marker is used when none matches.
    pub link_text: Option<String>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            url: "https://www.microsoft.com/software-download/windows11".to_string(),
            language: "English International".to_string(),
            edition: None,
            timeout_secs: 100,
            pacing_min_ms: 500,
            pacing_max_ms: 1000,
            link_text: Some("64-bit Download".to_string()),
        }
    }
}

/// Attempt orchestration parameters (optional `[orchestration]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Number of rounds before giving up.
    pub tries: u32,
    /// Concurrent attempts per round; 0 means one per available CPU.
    pub attempts_per_round: usize,
    /// Base delay between rounds in milliseconds (0 = start the next round immediately).
    pub round_delay_ms: u64,
    /// Upper bound on the delay between rounds.
    pub max_round_delay_secs: u64,
    /// Container runtime CLI.
    pub runtime: String,
    /// Image serving a headless browser with a DevTools endpoint.
    pub browser_image: String,
    /// DevTools port inside the browser container.
    pub browser_port: u16,
    /// Image the driver (`winiso resolve`) runs in. It executes the host's
    /// `winiso` binary, so it must ship glibc, OpenSSL 3 and zlib.
    pub driver_image: String,
    /// Shared memory size for the browser container.
    pub shm_size: String,
    /// Host directory receiving screenshots/HTML when a step times out.
    pub dump_dir: Option<PathBuf>,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            tries: 66,
            attempts_per_round: 0,
            round_delay_ms: 0,
            max_round_delay_secs: 30,
            runtime: "docker".to_string(),
            browser_image: "chromedp/headless-shell:latest".to_string(),
            browser_port: 9222,
            driver_image: "buildpack-deps:bookworm-curl".to_string(),
            shm_size: "500M".to_string(),
            dump_dir: None,
        }
    }
}

/// Artifact download parameters (optional `[download]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Declared sizes at or below this are rejected as "not the real artifact".
    pub min_size_bytes: u64,
    /// Size of each chunk written to the `.part` file.
    pub chunk_bytes: usize,
    /// A progress line is emitted each time this many bytes have been written.
    pub progress_step_bytes: u64,
    pub connect_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: 1_000_000_000,
            chunk_bytes: 1_000_000,
            progress_step_bytes: 10_000_000,
            connect_timeout_secs: 30,
        }
    }
}

/// External image repacking tool (optional `[repack]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepackConfig {
    pub command: String,
    /// Arguments placed before `<source> <destination>`.
    pub args: Vec<String>,
}

impl Default for RepackConfig {
    fn default() -> Self {
        Self {
            command: "distrobuilder".to_string(),
            args: vec!["repack-windows".to_string()],
        }
    }
}

/// Global configuration loaded from `~/.config/winiso/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WinisoConfig {
    pub navigation: NavigationConfig,
    pub orchestration: OrchestrationConfig,
    pub download: DownloadConfig,
    pub repack: RepackConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("winiso")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WinisoConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WinisoConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: WinisoConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = WinisoConfig::default();
        assert_eq!(cfg.navigation.language, "English International");
        assert_eq!(cfg.navigation.timeout_secs, 100);
        assert_eq!(cfg.orchestration.tries, 66);
        assert_eq!(cfg.orchestration.runtime, "docker");
        // bookworm-slim lacks libssl3; the curl variant ships it.
        assert_eq!(cfg.orchestration.driver_image, "buildpack-deps:bookworm-curl");
        assert_eq!(cfg.download.min_size_bytes, 1_000_000_000);
        assert_eq!(cfg.download.chunk_bytes, 1_000_000);
        assert_eq!(cfg.download.progress_step_bytes, 10_000_000);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = WinisoConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: WinisoConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.navigation.url, cfg.navigation.url);
        assert_eq!(parsed.orchestration.browser_image, cfg.orchestration.browser_image);
        assert_eq!(parsed.download.chunk_bytes, cfg.download.chunk_bytes);
        assert_eq!(parsed.repack.args, cfg.repack.args);
    }

    #[test]
    fn config_toml_partial_sections_use_defaults() {
        let toml = r#"
            [navigation]
            language = "English"
            timeout_secs = 5

            [orchestration]
            tries = 3
            attempts_per_round = 2
        "#;
        let cfg: WinisoConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.navigation.language, "English");
        assert_eq!(cfg.navigation.timeout_secs, 5);
        assert_eq!(cfg.navigation.pacing_min_ms, 500);
        assert_eq!(cfg.orchestration.tries, 3);
        assert_eq!(cfg.orchestration.attempts_per_round, 2);
        assert_eq!(cfg.orchestration.shm_size, "500M");
        assert!(cfg.orchestration.dump_dir.is_none());
        assert_eq!(cfg.download.min_size_bytes, 1_000_000_000);
    }

    #[test]
    fn config_toml_download_and_repack() {
        let toml = r#"
            [download]
            min_size_bytes = 1_000
            chunk_bytes = 4096
            progress_step_bytes = 40_960

            [repack]
            command = "wimlib-imagex"
            args = []
        "#;
        let cfg: WinisoConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download.min_size_bytes, 1_000);
        assert_eq!(cfg.download.chunk_bytes, 4096);
        assert_eq!(cfg.download.progress_step_bytes, 40_960);
        assert_eq!(cfg.download.connect_timeout_secs, 30);
        assert_eq!(cfg.repack.command, "wimlib-imagex");
        assert!(cfg.repack.args.is_empty());
    }
}
