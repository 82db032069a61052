//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```
//! use weft_core::config::Config;
//!
//! let config = Config::from_json(r#"{ "reconciler": { "depth_limit": 64 } }"#).unwrap();
//! assert_eq!(config.reconciler.depth_limit, 64);
//! assert!(config.collection.ordered);
//! ```

use serde::Deserialize;

use crate::component::CollectionConfig;
use crate::error::Result;
use crate::vdom::ReconcilerConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub reconciler: ReconcilerConfig,
    pub collection: CollectionConfig,
}

impl Config {
    /// Parse a configuration document.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
        assert_eq!(Config::default().reconciler.depth_limit, 512);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_json(r#"{ "collection": { "ordered": false } }"#).unwrap();
        assert!(!config.collection.ordered);
        assert_eq!(config.reconciler, ReconcilerConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::from_json(r#"{ "renderer": {} }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
