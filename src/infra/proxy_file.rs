//! Proxy lists stored as `<dir>/<name>.txt`, one `host:port:user:pass` per
//! line.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{MonitorError, Proxy, ProxyStore};

/// Directory of named proxy lists.
#[derive(Debug, Clone)]
pub struct ProxyFile {
    dir: PathBuf,
}

impl ProxyFile {
    /// Lists live under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.txt"))
    }
}

impl ProxyStore for ProxyFile {
    fn load(&self, name: &str) -> Result<Vec<Proxy>, MonitorError> {
        if name.is_empty() {
            return Ok(Vec::new());
        }
        let path = self.file_path(name);
        let raw = fs::read_to_string(&path)
            .map_err(|e| MonitorError::Storage(format!("{}: {e}", path.display())))?;

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Proxy::parse_line)
            .collect()
    }

    fn save(&self, name: &str, proxies: &[Proxy]) -> Result<(), MonitorError> {
        if name.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|e| MonitorError::Storage(e.to_string()))?;

        let mut body = proxies
            .iter()
            .map(Proxy::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        let path = self.file_path(name);
        fs::write(&path, body)
            .map_err(|e| MonitorError::Storage(format!("{}: {e}", path.display())))
    }
}
