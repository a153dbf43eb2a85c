use std::path::{Component, Path, PathBuf};

/// Maps local paths under a sync root to object keys under a prefix and back
#[derive(Debug, Clone)]
pub struct KeyMapper {
    root: PathBuf,
    prefix: String,
}

impl KeyMapper {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// Object key for a path relative to the sync root
    ///
    /// Separators are always `/`, whatever the platform uses locally.
    /// Returns `None` when a component is not valid UTF-8, since such a
    /// name has no key that maps back to it.
    pub fn key_for_relative(&self, relative: &Path) -> Option<String> {
        let mut parts = Vec::new();
        for component in relative.components() {
            if let Component::Normal(part) = component {
                parts.push(part.to_str()?);
            }
        }
        let rel = parts.join("/");

        if self.prefix.is_empty() {
            Some(rel)
        } else {
            Some(format!("{}/{}", self.prefix, rel))
        }
    }

    /// Path relative to the sync root for a key, if the key lives under the prefix
    ///
    /// Keys that merely share a string prefix (`photos-old/x` for prefix
    /// `photos`) or would escape the root yield `None`.
    pub fn relative_for(&self, key: &str) -> Option<PathBuf> {
        let rest = if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.prefix)?.strip_prefix('/')?
        };

        let mut rel = PathBuf::new();
        for part in rest.split('/').filter(|p| !p.is_empty()) {
            if part == "." || part == ".." {
                return None;
            }
            rel.push(part);
        }

        if rel.as_os_str().is_empty() {
            None
        } else {
            Some(rel)
        }
    }

    /// Local path a remote key corresponds to
    pub fn local_path_for(&self, key: &str) -> Option<PathBuf> {
        self.relative_for(key).map(|rel| self.root.join(rel))
    }
}
