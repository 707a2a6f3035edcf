//! Toolkit configuration.
//!
//! [`ToolkitConfig`] is a plain value: build it once at startup, hand it to a
//! [`Toolkit`](crate::Toolkit), share it across requests. There is no global.
//!
//! It deserializes with `#[serde(default)]`, so a host service can embed it
//! as a section of its own configuration file, or layer `TOOLKIT_*`
//! environment variables over the defaults with [`ToolkitConfig::from_env`]:
//!
//! ```bash
//! TOOLKIT_MAX_FILE_SIZE=10485760
//! TOOLKIT_ALLOWED_FILE_TYPES='["image/png", "image/jpeg"]'
//! TOOLKIT_MAX_JSON_SIZE=2048
//! TOOLKIT_ALLOW_UNKNOWN_JSON_FIELDS=true
//! ```

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Upload ceiling when none is configured: 1 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// JSON body ceiling when none is configured: 1 MiB.
pub const DEFAULT_MAX_JSON_SIZE: usize = 1024 * 1024;

const ENV_PREFIX: &str = "TOOLKIT_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    /// Hard ceiling on a multipart request body, in bytes.
    pub max_file_size: u64,
    /// MIME types accepted by uploads, matched against the sniffed type.
    /// Empty accepts everything.
    pub allowed_file_types: Vec<String>,
    /// Hard ceiling on a JSON request body, in bytes.
    pub max_json_size: usize,
    /// Accept JSON object keys the target type does not declare.
    pub allow_unknown_json_fields: bool,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_file_types: Vec::new(),
            max_json_size: DEFAULT_MAX_JSON_SIZE,
            allow_unknown_json_fields: false,
        }
    }
}

impl ToolkitConfig {
    /// Defaults overridden by any `TOOLKIT_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| Error::Config(Box::new(e)))
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_allowed_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_json_size(mut self, bytes: usize) -> Self {
        self.max_json_size = bytes;
        self
    }

    pub fn with_unknown_json_fields(mut self, allow: bool) -> Self {
        self.allow_unknown_json_fields = allow;
        self
    }

    /// Whether an upload sniffed as `content_type` may be stored.
    ///
    /// Parameters such as `; charset=utf-8` are ignored on both sides and the
    /// comparison is case-insensitive.
    pub fn allows_file_type(&self, content_type: &str) -> bool {
        if self.allowed_file_types.is_empty() {
            return true;
        }
        let sniffed = essence(content_type);
        self.allowed_file_types
            .iter()
            .any(|allowed| essence(allowed).eq_ignore_ascii_case(sniffed))
    }
}

fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}
