//! Where asset bytes come from: the local filesystem or HTTP.

use std::{
    io::Read,
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result, bail};

use crate::error::AssetError;

/// Upper bound on a fetched asset.
pub(crate) const MAX_ASSET_BYTES: u64 = 512 * 1024 * 1024;

/// Existence check plus full fetch for asset locations.
pub trait AssetSource: Send {
    /// Lightweight existence check. Any error means "not available".
    fn probe(&self, location: &str) -> Result<(), AssetError>;

    fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

pub fn is_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Plain file paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSource;

impl AssetSource for FileSource {
    fn probe(&self, location: &str) -> Result<(), AssetError> {
        match Path::new(location).metadata() {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(AssetError::ProbeFailure {
                location: location.to_owned(),
                reason: "not a regular file".to_owned(),
            }),
            Err(e) => Err(AssetError::ProbeFailure {
                location: location.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        std::fs::read(location).with_context(|| format!("Failed to read {}", location))
    }
}

/// HTTP(S) locations. Probes use `HEAD` and bypass caches.
#[derive(Clone, Debug)]
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl AssetSource for HttpSource {
    fn probe(&self, location: &str) -> Result<(), AssetError> {
        let failure = |reason: String| AssetError::ProbeFailure {
            location: location.to_owned(),
            reason,
        };
        match self.agent.head(location).set("Cache-Control", "no-store").call() {
            Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
            Ok(resp) => Err(failure(format!("HTTP {}", resp.status()))),
            Err(ureq::Error::Status(code, _)) => Err(failure(format!("HTTP {}", code))),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let resp = self
            .agent
            .get(location)
            .call()
            .with_context(|| format!("GET {} failed", location))?;
        let mut body = Vec::new();
        resp.into_reader()
            .take(MAX_ASSET_BYTES + 1)
            .read_to_end(&mut body)
            .with_context(|| format!("Failed to read body of {}", location))?;
        if body.len() as u64 > MAX_ASSET_BYTES {
            bail!("{} exceeds {} bytes", location, MAX_ASSET_BYTES);
        }
        Ok(body)
    }
}

/// Dispatches on the location: URLs go over HTTP, everything else is a path.
#[derive(Clone, Debug)]
pub struct DefaultSource {
    file: FileSource,
    http: HttpSource,
}

impl DefaultSource {
    pub fn new(http_timeout: Duration) -> Self {
        Self {
            file: FileSource,
            http: HttpSource::new(http_timeout),
        }
    }
}

impl Default for DefaultSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl AssetSource for DefaultSource {
    fn probe(&self, location: &str) -> Result<(), AssetError> {
        if is_http(location) {
            self.http.probe(location)
        } else {
            self.file.probe(location)
        }
    }

    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if is_http(location) {
            self.http.fetch(location)
        } else {
            self.file.fetch(location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("asset-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn scheme_detection() {
        assert!(is_http("http://host/a.glb"));
        assert!(is_http("https://host/a.glb"));
        assert!(!is_http("assets/a.glb"));
        assert!(!is_http("/abs/https.glb"));
    }

    #[test]
    fn file_probe_and_fetch() {
        let path = temp_file("probe.obj", b"v 0 0 0\n");
        let loc = path.to_str().unwrap();
        let src = DefaultSource::default();
        assert!(src.probe(loc).is_ok());
        assert_eq!(src.fetch(loc).unwrap(), b"v 0 0 0\n");
    }

    #[test]
    fn missing_file_and_directory_fail_probe() {
        let src = FileSource;
        assert!(matches!(
            src.probe("definitely/not/here.glb"),
            Err(AssetError::ProbeFailure { .. })
        ));
        let dir = std::env::temp_dir();
        assert!(src.probe(dir.to_str().unwrap()).is_err());
        assert!(src.fetch("definitely/not/here.glb").is_err());
    }

    #[test]
    fn unreachable_http_probe_is_a_failure_not_a_panic() {
        let src = HttpSource::new(Duration::from_millis(200));
        // Port 9 (discard) on localhost is closed in test environments.
        assert!(src.probe("http://127.0.0.1:9/missing.glb").is_err());
    }
}
