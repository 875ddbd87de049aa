//! Page exploration through an external scraper command.
//!
//! The scraper is an agent CLI that fetches a URL and prints the page as
//! markdown. Output is cleaned of known noise lines, rejected when too short,
//! and cached on disk keyed by a hash of the URL so repeated explorations of
//! the same page (within or across subjects) cost nothing.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::core::text::preview;
use crate::io::config::ExplorerConfig;
use crate::io::process::run_captured;
use crate::io::prompt::PromptEngine;

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub content: String,
    /// Served from the page cache rather than a fresh scrape.
    pub cached: bool,
}

/// Fetches page content for `explore_page`.
pub trait Explorer {
    fn explore(&self, url: &str, reason: &str) -> Result<Page>;
}

pub struct CommandExplorer {
    config: ExplorerConfig,
    cache_dir: PathBuf,
    prompts: PromptEngine,
}

impl CommandExplorer {
    pub fn new(config: ExplorerConfig, cache_dir: PathBuf) -> Self {
        Self {
            config,
            cache_dir,
            prompts: PromptEngine::new(),
        }
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.md", cache_key(url)))
    }

    fn scrape(&self, url: &str) -> Result<String> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .context("explorer command is empty")?;
        let prompt = self.prompts.render_scrape(url)?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(prompt).env("NODE_ENV", "production");

        let output = run_captured(
            cmd,
            Duration::from_secs(self.config.timeout_secs),
            self.config.output_limit_bytes,
        )
        .with_context(|| format!("run scraper {program}"))?;

        if output.timed_out {
            bail!("scraper timed out after {}s", self.config.timeout_secs);
        }
        if !output.status.success() {
            bail!(
                "scraper exited with {:?}: {}",
                output.status.code(),
                preview(output.stderr.trim(), 200)
            );
        }

        let content = strip_noise(&output.stdout, &self.config.noise_patterns);
        let chars = content.chars().count();
        if chars < self.config.min_content_chars {
            bail!(
                "content too short ({chars} chars, need {})",
                self.config.min_content_chars
            );
        }
        Ok(content)
    }
}

impl Explorer for CommandExplorer {
    #[instrument(skip_all, fields(url = url))]
    fn explore(&self, url: &str, reason: &str) -> Result<Page> {
        let cache_path = self.cache_path(url);
        if cache_path.exists() {
            let content = fs::read_to_string(&cache_path)
                .with_context(|| format!("read {}", cache_path.display()))?;
            debug!(chars = content.len(), "using cached page");
            return Ok(Page {
                url: url.to_string(),
                content,
                cached: true,
            });
        }

        info!(reason, "scraping page");
        let content = self.scrape(url)?;
        if let Err(err) = write_cache(&cache_path, &content) {
            warn!(error = %format!("{err:#}"), "could not cache page");
        }
        info!(chars = content.len(), "page scraped");
        Ok(Page {
            url: url.to_string(),
            content,
            cached: false,
        })
    }
}

/// First 16 hex digits of the URL's SHA-256.
fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn write_cache(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("cache path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("md.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("write temp cache {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace cache {}", path.display()))?;
    Ok(())
}

/// Drop lines containing any noise pattern, then trim the result.
pub fn strip_noise(output: &str, patterns: &[String]) -> String {
    output
        .lines()
        .filter(|line| !patterns.iter().any(|p| line.contains(p.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_noise_drops_matching_lines() {
        let patterns = vec!["[QWEN]".to_string(), "Loading translations".to_string()];
        let raw = "[QWEN] booting\n# Acme\n\nLoading translations...\nWe build rockets.\n";
        assert_eq!(strip_noise(raw, &patterns), "# Acme\n\nWe build rockets.");
    }

    #[test]
    fn cache_key_is_stable_and_distinct() {
        let a = cache_key("https://acme.example/team");
        assert_eq!(a, cache_key("https://acme.example/team"));
        assert_ne!(a, cache_key("https://acme.example/about"));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn cached_pages_skip_the_scraper() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ExplorerConfig {
            command: vec!["definitely-not-a-real-scraper".to_string()],
            ..ExplorerConfig::default()
        };
        let explorer = CommandExplorer::new(config, temp.path().to_path_buf());
        let url = "https://acme.example/team";
        write_cache(&explorer.cache_path(url), "# Team\nJane Doe, CEO").expect("seed");

        let page = explorer.explore(url, "team").expect("explore");
        assert!(page.cached);
        assert_eq!(page.content, "# Team\nJane Doe, CEO");
    }

    #[test]
    fn missing_scraper_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ExplorerConfig {
            command: vec!["definitely-not-a-real-scraper".to_string()],
            ..ExplorerConfig::default()
        };
        let explorer = CommandExplorer::new(config, temp.path().to_path_buf());
        assert!(explorer.explore("https://acme.example", "home").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn short_output_is_rejected_and_not_cached() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ExplorerConfig {
            command: vec!["sh".to_string(), "-c".to_string(), "echo tiny".to_string()],
            ..ExplorerConfig::default()
        };
        let explorer = CommandExplorer::new(config, temp.path().to_path_buf());
        let err = explorer.explore("https://acme.example", "home").unwrap_err();
        assert!(format!("{err:#}").contains("content too short"));
        assert!(!explorer.cache_path("https://acme.example").exists());
    }

    #[cfg(unix)]
    #[test]
    fn successful_scrape_is_cached() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ExplorerConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo '[QWEN] noise'; printf 'x%.0s' $(seq 1 150)".to_string(),
            ],
            ..ExplorerConfig::default()
        };
        let explorer = CommandExplorer::new(config, temp.path().to_path_buf());
        let page = explorer.explore("https://acme.example", "home").expect("explore");
        assert!(!page.cached);
        assert_eq!(page.content.len(), 150);

        let again = explorer.explore("https://acme.example", "home").expect("explore");
        assert!(again.cached);
        assert_eq!(again.content, page.content);
    }
}
