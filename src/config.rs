use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::api::{DEFAULT_CHUNKGO_ROOT, DEFAULT_CHUNKLAB_ROOT, Endpoints};
use crate::upload::{AllowedExtensions, DEFAULT_ALLOWED_EXTENSIONS};

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    base_url: Option<String>,
    chunkgo_root: Option<String>,
    chunklab_root: Option<String>,
    task_poll_interval_ms: Option<u64>,
    chunk_poll_interval_ms: Option<u64>,
    request_timeout_seconds: Option<u64>,
    chunk_submit_timeout_seconds: Option<u64>,
    #[serde(default, deserialize_with = "extensions_list")]
    allowed_extensions: Option<String>,
    assume_yes: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RootConfig {
    #[serde(default, flatten)]
    top: FileConfig,
    chunkgo: Option<FileConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub base_url: String,
    pub chunkgo_root: String,
    pub chunklab_root: String,
    pub task_poll_interval_ms: u64,
    pub chunk_poll_interval_ms: u64,
    pub request_timeout_seconds: u64,
    pub chunk_submit_timeout_seconds: u64,
    pub allowed_extensions: String,
    pub assume_yes: bool,
    pub config_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8410".to_string(),
            chunkgo_root: DEFAULT_CHUNKGO_ROOT.to_string(),
            chunklab_root: DEFAULT_CHUNKLAB_ROOT.to_string(),
            task_poll_interval_ms: 2000,
            chunk_poll_interval_ms: 1000,
            request_timeout_seconds: 8,
            chunk_submit_timeout_seconds: 15,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS.to_string(),
            assume_yes: false,
            config_path: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then the config file (`explicit` or the first one found on
    /// the search path), then `CHUNKGO_*` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();

        let config_path = match explicit {
            Some(path) if !path.exists() => bail!("config file {path:?} does not exist"),
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };

        if let Some(path) = &config_path {
            let RootConfig { top, chunkgo } = load_root_config(path)?;
            cfg.apply_file(top);
            if let Some(section) = chunkgo {
                cfg.apply_file(section);
            }
        }
        cfg.config_path = config_path;

        cfg.apply_env(|key| env::var(key).ok());
        Ok(cfg)
    }

    fn apply_file(&mut self, file_cfg: FileConfig) {
        set_opt(&mut self.base_url, file_cfg.base_url);
        set_opt(&mut self.chunkgo_root, file_cfg.chunkgo_root);
        set_opt(&mut self.chunklab_root, file_cfg.chunklab_root);
        set_opt_u64_min(
            &mut self.task_poll_interval_ms,
            file_cfg.task_poll_interval_ms,
            100,
        );
        set_opt_u64_min(
            &mut self.chunk_poll_interval_ms,
            file_cfg.chunk_poll_interval_ms,
            100,
        );
        set_opt_u64_min(
            &mut self.request_timeout_seconds,
            file_cfg.request_timeout_seconds,
            1,
        );
        set_opt_u64_min(
            &mut self.chunk_submit_timeout_seconds,
            file_cfg.chunk_submit_timeout_seconds,
            1,
        );
        set_opt(&mut self.allowed_extensions, file_cfg.allowed_extensions);
        set_opt(&mut self.assume_yes, file_cfg.assume_yes);
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_u64 = |key: &str| string(key).and_then(|v| v.trim().parse::<u64>().ok());

        let env_cfg = FileConfig {
            base_url: string("CHUNKGO_BASE_URL"),
            chunkgo_root: string("CHUNKGO_ROOT"),
            chunklab_root: string("CHUNKGO_CHUNKLAB_ROOT"),
            task_poll_interval_ms: parse_u64("CHUNKGO_TASK_POLL_INTERVAL_MS"),
            chunk_poll_interval_ms: parse_u64("CHUNKGO_CHUNK_POLL_INTERVAL_MS"),
            request_timeout_seconds: parse_u64("CHUNKGO_REQUEST_TIMEOUT_SECONDS"),
            chunk_submit_timeout_seconds: parse_u64("CHUNKGO_CHUNK_SUBMIT_TIMEOUT_SECONDS"),
            allowed_extensions: string("CHUNKGO_ALLOWED_EXTENSIONS"),
            assume_yes: string("CHUNKGO_ASSUME_YES").and_then(|v| parse_bool(&v)),
        };
        self.apply_file(env_cfg);
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.base_url, &self.chunkgo_root, &self.chunklab_root)
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    pub fn chunk_poll_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn chunk_submit_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_submit_timeout_seconds)
    }

    pub fn allowed_extensions(&self) -> AllowedExtensions {
        AllowedExtensions::parse_or_default(&self.allowed_extensions)
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("chunkgo.toml"), PathBuf::from("config.toml")];
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("chunkgo").join("config.toml"));
    }
    paths
}

pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|path| path.exists())
}

fn dirs_home() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}

fn load_root_config(path: &Path) -> Result<RootConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed reading {path:?}"))?;
    toml::from_str::<RootConfig>(&raw)
        .with_context(|| format!("failed parsing config file {path:?}"))
}

/// Accepts either `".pdf, .docx"` or `[".pdf", ".docx"]`.
fn extensions_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Joined(joined) => joined,
        Raw::List(list) => list.join(","),
    }))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn set_opt<T>(dst: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *dst = v;
    }
}

fn set_opt_u64_min(dst: &mut u64, value: Option<u64>, min: u64) {
    if let Some(v) = value {
        *dst = v.max(min);
    }
}
