//! Symbolic command → protocol code lookup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Errors resolving a symbolic command.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// No entry for the key.
    #[error("no entry for '{0}'")]
    NotFound(String),

    /// The entry exists but is blank.
    #[error("entry for '{0}' is empty")]
    Empty(String),

    /// The map file could not be read.
    #[error("failed to read map file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolves a symbolic command name (e.g. `POWER_ON`) to an IR or serial code.
pub trait CodeLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Result<String, LookupError>;
}

impl<F> CodeLookup for F
where
    F: Fn(&str) -> Result<String, LookupError> + Send + Sync,
{
    fn lookup(&self, key: &str) -> Result<String, LookupError> {
        self(key)
    }
}

/// Lookup table backed by a `key=value` map file.
///
/// Blank lines and lines starting with `#` or `!` are ignored. Keys and
/// values are trimmed; a value may itself contain `=`.
#[derive(Debug, Clone, Default)]
pub struct MapLookup {
    entries: HashMap<String, String>,
}

impl MapLookup {
    /// Load a map file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LookupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::parse(&text);
        debug!(?path, entries = map.len(), "loaded map file");
        Ok(map)
    }

    /// Parse map file text.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    entries.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => warn!(line = number + 1, "ignoring map line without '='"),
            }
        }
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl CodeLookup for MapLookup {
    fn lookup(&self, key: &str) -> Result<String, LookupError> {
        let value = self
            .entries
            .get(key)
            .ok_or_else(|| LookupError::NotFound(key.to_string()))?;
        if value.is_empty() {
            return Err(LookupError::Empty(key.to_string()));
        }
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "\
# living room TV
POWER=0000 006D 0022 0002 0158 00AC
! legacy comment
VOLUME_UP = 38000,1,1,342,171

BLANK=
PROJECTOR_ON=PWR ON%0D
garbage line
";

    #[test]
    fn parses_entries_and_skips_comments() {
        let map = MapLookup::parse(MAP);
        assert_eq!(map.len(), 4);
        assert_eq!(map.lookup("POWER").unwrap(), "0000 006D 0022 0002 0158 00AC");
        assert_eq!(map.lookup("VOLUME_UP").unwrap(), "38000,1,1,342,171");
        assert_eq!(map.lookup("PROJECTOR_ON").unwrap(), "PWR ON%0D");
    }

    #[test]
    fn missing_and_empty_entries_fail() {
        let map = MapLookup::parse(MAP);
        assert!(matches!(map.lookup("MUTE"), Err(LookupError::NotFound(k)) if k == "MUTE"));
        assert!(matches!(map.lookup("BLANK"), Err(LookupError::Empty(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MapLookup::load("/nonexistent/irgate/devices.map").unwrap_err();
        assert!(matches!(err, LookupError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = std::env::temp_dir().join(format!("irgate-map-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tv.map");
        std::fs::write(&path, MAP).unwrap();

        let map = MapLookup::load(&path).unwrap();
        assert_eq!(map.lookup("VOLUME_UP").unwrap(), "38000,1,1,342,171");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn closures_are_lookups() {
        let lookup = |key: &str| -> Result<String, LookupError> { Ok(format!("code-{key}")) };
        assert_eq!(lookup.lookup("A").unwrap(), "code-A");

        let map: MapLookup = [("A", "1")].into_iter().collect();
        assert_eq!(map.lookup("A").unwrap(), "1");
    }
}
