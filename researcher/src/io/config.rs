//! Research configuration stored in `researcher.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "researcher.toml";

/// Research configuration (TOML).
///
/// Missing fields fall back to the defaults below, so an empty file is a
/// valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchConfig {
    /// Directory receiving reports, images, iteration records, and the missing-action log.
    pub output_dir: PathBuf,

    /// Oracle consultations per subject before giving up.
    pub max_iterations: u32,

    /// Write prompt/response/decision/dispatch files for every iteration.
    pub record_iterations: bool,

    pub oracle: OracleConfig,
    pub explorer: ExplorerConfig,
    pub images: ImageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cerebras.ai/v1".to_string(),
            model: "llama-3.3-70b".to_string(),
            api_key_env: "CEREBRAS_API_KEY".to_string(),
            timeout_secs: 120,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Scraper command; the rendered scrape prompt is appended as the last argument.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Scraped pages shorter than this (after noise removal) count as failures.
    pub min_content_chars: usize,
    /// Truncate scraper stdout beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Bytes of each page kept as the explored-source excerpt.
    pub excerpt_bytes: usize,
    /// Page cache, relative to `output_dir` unless absolute.
    pub cache_dir: PathBuf,
    /// Lines containing any of these substrings are stripped from scraper output.
    pub noise_patterns: Vec<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            command: vec!["qwen".to_string(), "-y".to_string(), "-p".to_string()],
            timeout_secs: 60,
            min_content_chars: 100,
            output_limit_bytes: 500_000,
            excerpt_bytes: 4000,
            cache_dir: PathBuf::from("scrape_cache"),
            noise_patterns: [
                "[QWEN]",
                "Created workspace",
                "Setting language",
                "Global language",
                "Loading translations",
                "Translations loaded",
                "Available translation keys",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImageConfig {
    /// Download images; when off, image facts are recorded without a local copy.
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Downloads larger than this are abandoned.
    pub max_bytes: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("research_output"),
            max_iterations: 10,
            record_iterations: true,
            oracle: OracleConfig::default(),
            explorer: ExplorerConfig::default(),
            images: ImageConfig::default(),
        }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        if self.oracle.base_url.trim().is_empty() {
            return Err(anyhow!("oracle.base_url must not be empty"));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(anyhow!("oracle.model must not be empty"));
        }
        if self.oracle.api_key_env.trim().is_empty() {
            return Err(anyhow!("oracle.api_key_env must not be empty"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(anyhow!("oracle.temperature must be within 0.0..=2.0"));
        }
        if self.oracle.max_tokens == 0 {
            return Err(anyhow!("oracle.max_tokens must be > 0"));
        }
        if self.explorer.command.is_empty() || self.explorer.command[0].trim().is_empty() {
            return Err(anyhow!("explorer.command must be a non-empty array"));
        }
        if self.explorer.timeout_secs == 0 {
            return Err(anyhow!("explorer.timeout_secs must be > 0"));
        }
        if self.explorer.output_limit_bytes == 0 {
            return Err(anyhow!("explorer.output_limit_bytes must be > 0"));
        }
        if self.images.timeout_secs == 0 {
            return Err(anyhow!("images.timeout_secs must be > 0"));
        }
        if self.images.max_bytes == 0 {
            return Err(anyhow!("images.max_bytes must be > 0"));
        }
        Ok(())
    }

    /// Scrape cache location with `output_dir` applied.
    pub fn cache_dir(&self) -> PathBuf {
        self.output_dir.join(&self.explorer.cache_dir)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ResearchConfig::default()`.
pub fn load_config(path: &Path) -> Result<ResearchConfig> {
    if !path.exists() {
        let cfg = ResearchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ResearchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ResearchConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ResearchConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("researcher.toml");
        let mut cfg = ResearchConfig::default();
        cfg.max_iterations = 4;
        cfg.images.enabled = false;
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("researcher.toml");
        fs::write(&path, "max_iterations = 3\n[oracle]\nmodel = \"qwen-3-32b\"\n")
            .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 3);
        assert_eq!(cfg.oracle.model, "qwen-3-32b");
        assert_eq!(cfg.oracle.timeout_secs, 120);
        assert_eq!(cfg.explorer.command, vec!["qwen", "-y", "-p"]);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("researcher.toml");
        fs::write(&path, "max_iterations = 0\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_iterations must be > 0"));
    }

    #[test]
    fn empty_explorer_command_is_rejected() {
        let mut cfg = ResearchConfig::default();
        cfg.explorer.command.clear();
        assert!(cfg.validate().is_err());
    }
}
