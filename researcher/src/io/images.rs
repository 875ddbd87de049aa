//! Image downloads for `download_image`.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use url::Url;

use crate::core::text::sanitize_filename;
use crate::io::config::ImageConfig;

/// Persists images referenced by the oracle.
pub trait ImageStore {
    /// Store the image at `url` under `subject`.
    ///
    /// Returns `Ok(None)` when the store keeps no local copies.
    fn store(&self, url: &str, subject: &str) -> Result<Option<PathBuf>>;
}

/// Records nothing locally; image facts keep only their URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledImageStore;

impl ImageStore for DisabledImageStore {
    fn store(&self, _url: &str, _subject: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Downloads over HTTP into `<root>/images/<subject>/`.
pub struct HttpImageStore {
    client: reqwest::blocking::Client,
    root: PathBuf,
    max_bytes: u64,
}

impl HttpImageStore {
    pub fn new(config: &ImageConfig, root: &Path) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build image http client")?;
        Ok(Self {
            client,
            root: root.to_path_buf(),
            max_bytes: config.max_bytes,
        })
    }
}

impl ImageStore for HttpImageStore {
    #[instrument(skip_all, fields(url = url))]
    fn store(&self, url: &str, subject: &str) -> Result<Option<PathBuf>> {
        let parsed = Url::parse(url).with_context(|| format!("parse image url {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported image url scheme {}", parsed.scheme());
        }

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .with_context(|| format!("download {url}"))?
            .error_for_status()
            .with_context(|| format!("download {url}"))?;
        if let Some(len) = response.content_length()
            && len > self.max_bytes
        {
            bail!("image is {len} bytes, limit is {}", self.max_bytes);
        }

        let mut bytes = Vec::new();
        response
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .with_context(|| format!("read body of {url}"))?;
        if bytes.len() as u64 > self.max_bytes {
            bail!("image exceeds {} bytes", self.max_bytes);
        }

        let dir = self.root.join("images").join(sanitize_filename(subject));
        fs::create_dir_all(&dir).with_context(|| format!("create directory {}", dir.display()))?;
        let path = dir.join(image_file_name(&parsed));
        fs::write(&path, &bytes).with_context(|| format!("write {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "image stored");
        Ok(Some(path))
    }
}

/// `person_<hash>.<ext>`, with the extension taken from the URL path.
fn image_file_name(url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let ext = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("person_{}.{ext}", &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("url")
    }

    #[test]
    fn file_name_keeps_a_sane_extension() {
        let name = image_file_name(&url("https://acme.example/team/jane.PNG"));
        assert!(name.starts_with("person_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn file_name_defaults_to_jpg() {
        assert!(image_file_name(&url("https://acme.example/photo")).ends_with(".jpg"));
        assert!(image_file_name(&url("https://acme.example/a.b/c?x=1")).ends_with(".jpg"));
        assert!(image_file_name(&url("https://acme.example/x.reallylong")).ends_with(".jpg"));
    }

    #[test]
    fn disabled_store_keeps_nothing() {
        let store = DisabledImageStore;
        assert_eq!(store.store("https://acme.example/a.jpg", "Acme").expect("store"), None);
    }

    #[test]
    fn non_http_urls_are_refused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = HttpImageStore::new(&ImageConfig::default(), temp.path()).expect("store");
        let err = store.store("file:///etc/passwd", "Acme").unwrap_err();
        assert!(err.to_string().contains("unsupported image url scheme"));
        assert!(store.store("not a url", "Acme").is_err());
    }
}
