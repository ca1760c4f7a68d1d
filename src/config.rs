//! Inventory configuration (spec.md §4.E, ambient stack addition).

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{SunburstError, SunburstErrorKind};
use crate::strings::{PlainStrings, Strings};

const BASE_DIRECTORY_ENV_VAR: &str = "SUNBURST_HOME";

/// Where an [`crate::inventory::Inventory`] should look for its
/// database and blob tree, plus the [`Strings`] collaborator (spec.md
/// §1) it hands down to every [`crate::transaction::Transaction`] it
/// opens.
#[derive(Clone)]
pub struct InventoryConfig {
    base: PathBuf,
    strings: Arc<dyn Strings>,
}

impl fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryConfig").field("base", &self.base).finish()
    }
}

impl InventoryConfig {
    /// Builds a config over `base` with the pass-through
    /// [`PlainStrings`] collaborator; call [`Self::with_strings`] to
    /// supply a localized one.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            strings: Arc::new(PlainStrings),
        }
    }

    /// Replaces the [`Strings`] collaborator.
    pub fn with_strings(mut self, strings: Arc<dyn Strings>) -> Self {
        self.strings = strings;
        self
    }

    /// Reads `SUNBURST_HOME`. Unlike a daemon-wide config file, a
    /// library has no platform-default data directory of its own to
    /// fall back to — the caller must set the variable or use
    /// [`Self::new`] directly.
    pub fn from_env() -> Result<Self, SunburstError> {
        let base = env::var_os(BASE_DIRECTORY_ENV_VAR).ok_or_else(|| {
            SunburstError::new(SunburstErrorKind::Io, format!("{BASE_DIRECTORY_ENV_VAR} is not set"))
        })?;
        Ok(Self::new(PathBuf::from(base)))
    }

    pub fn base(&self) -> &std::path::Path {
        &self.base
    }

    pub(crate) fn strings_handle(&self) -> Arc<dyn Strings> {
        Arc::clone(&self.strings)
    }

    pub(crate) fn database_path(&self) -> PathBuf {
        self.base.join("sunburst.db")
    }

    pub(crate) fn blob_root(&self) -> PathBuf {
        self.base.join("blob")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stores_the_given_base() {
        let config = InventoryConfig::new("/tmp/example");
        assert_eq!(config.base(), std::path::Path::new("/tmp/example"));
        assert_eq!(config.database_path(), std::path::Path::new("/tmp/example/sunburst.db"));
        assert_eq!(config.blob_root(), std::path::Path::new("/tmp/example/blob"));
    }

    #[test]
    fn with_strings_replaces_the_default() {
        struct Shout;
        impl Strings for Shout {
            fn format(&self, key: &str, _args: &[&str]) -> String {
                key.to_uppercase()
            }
        }

        let config = InventoryConfig::new("/tmp/example").with_strings(Arc::new(Shout));
        assert_eq!(config.strings_handle().format("hi", &[]), "HI");
    }
}
