//! Codec configuration and tag-name validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Result, XmlMapError};

/// Default XML version written in the declaration.
pub const DEFAULT_VERSION: &str = "1.0";

/// Default encoding written in the declaration.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Default marker key holding an element's attributes.
pub const DEFAULT_ATTRIBUTES_KEY: &str = "@attributes";

/// Default marker key holding an element's CDATA section.
pub const DEFAULT_CDATA_KEY: &str = "@cdata";

/// Default marker key holding an element's direct text.
pub const DEFAULT_VALUE_KEY: &str = "@value";

/// Tag name pattern: a letter or underscore, then letters, digits, `:`, `-`,
/// `.` or `_`, never ending in `:`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TAG_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_](?:[A-Za-z0-9:._-]*[A-Za-z0-9._-])?$").expect("valid regex")
});

/// Check whether a string is usable as an element or attribute name.
///
/// # Examples
/// ```
/// use xmlmap::config::is_valid_tag_name;
///
/// assert!(is_valid_tag_name("note"));
/// assert!(is_valid_tag_name("h:td"));
/// assert!(!is_valid_tag_name("!WOW"));
/// assert!(!is_valid_tag_name("prefix:"));
/// ```
pub fn is_valid_tag_name(name: &str) -> bool {
    TAG_NAME_PATTERN.is_match(name)
}

/// Options shared by the encoder and the decoder.
///
/// Marker key names are not validated. A marker key that collides with a
/// real tag name makes that tag behave as the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// XML version for the declaration.
    pub version: String,
    /// Encoding named in the declaration.
    pub encoding: String,
    /// Marker key for attributes.
    pub attributes_key: String,
    /// Marker key for CDATA sections.
    pub cdata_key: String,
    /// Marker key for element text.
    pub value_key: String,
    /// Indent serialized output (encode side).
    pub format_output: bool,
    /// Capture namespace declarations on the root (decode side).
    pub use_namespaces: bool,
    /// Keep single children wrapped in a list (decode side).
    pub force_one_element_array: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            attributes_key: DEFAULT_ATTRIBUTES_KEY.to_string(),
            cdata_key: DEFAULT_CDATA_KEY.to_string(),
            value_key: DEFAULT_VALUE_KEY.to_string(),
            format_output: false,
            use_namespaces: false,
            force_one_element_array: false,
        }
    }
}

impl Config {
    /// Merge a sparse set of overrides over the defaults.
    ///
    /// Keys use the camelCase option names (`attributesKey`, `formatOutput`,
    /// ...). Unknown keys are ignored.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when `overrides` is not an object or a value
    /// has the wrong type.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use xmlmap::Config;
    ///
    /// let config = Config::from_overrides(json!({"valueKey": "#text"})).unwrap();
    /// assert_eq!(config.value_key, "#text");
    /// assert_eq!(config.attributes_key, "@attributes");
    /// ```
    pub fn from_overrides(overrides: serde_json::Value) -> Result<Self> {
        serde_json::from_value(overrides).map_err(XmlMapError::InvalidConfig)
    }

    /// Set the declaration version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the declaration encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Set the attributes marker key.
    #[must_use]
    pub fn with_attributes_key(mut self, key: impl Into<String>) -> Self {
        self.attributes_key = key.into();
        self
    }

    /// Set the CDATA marker key.
    #[must_use]
    pub fn with_cdata_key(mut self, key: impl Into<String>) -> Self {
        self.cdata_key = key.into();
        self
    }

    /// Set the text marker key.
    #[must_use]
    pub fn with_value_key(mut self, key: impl Into<String>) -> Self {
        self.value_key = key.into();
        self
    }

    /// Toggle indented output.
    #[must_use]
    pub fn with_format_output(mut self, enabled: bool) -> Self {
        self.format_output = enabled;
        self
    }

    /// Toggle namespace capture.
    #[must_use]
    pub fn with_use_namespaces(mut self, enabled: bool) -> Self {
        self.use_namespaces = enabled;
        self
    }

    /// Toggle list-of-one preservation.
    #[must_use]
    pub fn with_force_one_element_array(mut self, enabled: bool) -> Self {
        self.force_one_element_array = enabled;
        self
    }
}
