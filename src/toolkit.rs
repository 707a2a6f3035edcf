//! The configured entry point.

use crate::config::ToolkitConfig;

/// Holds a [`ToolkitConfig`] for the operations that depend on it:
/// [`read_json`](Toolkit::read_json), [`upload_files`](Toolkit::upload_files)
/// and [`upload_one_file`](Toolkit::upload_one_file).
///
/// Cheap to clone; build one at startup and share it between handlers.
/// Configuration-free operations ([`slugify`](crate::slugify),
/// [`random_string`](crate::random_string), [`write_json`](crate::write_json),
/// …) are plain functions.
#[derive(Clone, Debug, Default)]
pub struct Toolkit {
    config: ToolkitConfig,
}

impl Toolkit {
    pub fn new(config: ToolkitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }
}

impl From<ToolkitConfig> for Toolkit {
    fn from(config: ToolkitConfig) -> Self {
        Self::new(config)
    }
}
