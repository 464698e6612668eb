use datafusion::error::Result;
use serde::{Deserialize, Serialize};

use crate::to_df_err;

/// Producer URI stamped on events and facets unless configured otherwise.
pub const DEFAULT_PRODUCER: &str = concat!("lineage-agent/", env!("CARGO_PKG_VERSION"));

/// Settings of a [`crate::LineageAgent`].
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineageConfig {
    /// Namespace of every emitted job.
    pub job_namespace: String,
    /// Namespace of tables identified by name rather than by location.
    pub table_namespace: String,
    /// Scheme applied to locations given as bare paths.
    pub default_scheme: String,
    /// Producer URI stamped on events and facets.
    pub producer: String,
    /// Facet names dropped during aggregation.
    #[serde(deserialize_with = "deserialize_facet_list")]
    pub disabled_facets: Vec<String>,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            job_namespace: "default".to_string(),
            table_namespace: "datafusion".to_string(),
            default_scheme: "file".to_string(),
            producer: DEFAULT_PRODUCER.to_string(),
            disabled_facets: Vec::new(),
        }
    }
}

impl LineageConfig {
    /// The default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace the jobs are reported in.
    pub fn with_job_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.job_namespace = namespace.into();
        self
    }

    /// Namespace of tables identified by name.
    pub fn with_table_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.table_namespace = namespace.into();
        self
    }

    /// Scheme given to bare paths.
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// Producer URI stamped on events and facets.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Facet names that are never emitted.
    pub fn with_disabled_facets<I, S>(mut self, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_facets = facets.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a configuration from JSON with camelCase keys; missing keys keep
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(to_df_err)
    }

    /// Whether facets named `name` are dropped.
    pub fn is_facet_disabled(&self, name: &str) -> bool {
        self.disabled_facets.iter().any(|disabled| disabled == name)
    }
}

/// Parse a facet list written either as `a;b` or as `[a;b]`.
pub fn parse_facet_list(value: &str) -> Vec<String> {
    let value = value.trim();
    let value = value
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(value);
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_facet_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FacetList {
        Text(String),
        List(Vec<String>),
    }

    Ok(match FacetList::deserialize(deserializer)? {
        FacetList::Text(text) => parse_facet_list(&text),
        FacetList::List(list) => list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LineageConfig::default();
        assert_eq!(config.job_namespace, "default");
        assert_eq!(config.default_scheme, "file");
        assert!(config.producer.starts_with("lineage-agent/"));
        assert!(!config.is_facet_disabled("errorMessage"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LineageConfig::from_json(
            r#"{"jobNamespace": "etl", "disabledFacets": "[datafusion.logicalPlan;sql]"}"#,
        )
        .unwrap();
        assert_eq!(config.job_namespace, "etl");
        assert_eq!(config.table_namespace, "datafusion");
        assert!(config.is_facet_disabled("datafusion.logicalPlan"));
        assert!(config.is_facet_disabled("sql"));
        assert!(!config.is_facet_disabled("errorMessage"));
    }

    #[test]
    fn disabled_facets_as_array() {
        let config = LineageConfig::from_json(r#"{"disabledFacets": ["sql"]}"#).unwrap();
        assert_eq!(config.disabled_facets, vec!["sql".to_string()]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(LineageConfig::from_json("{not json").is_err());
    }

    #[test]
    fn facet_list_forms() {
        assert_eq!(parse_facet_list("a;b"), vec!["a", "b"]);
        assert_eq!(parse_facet_list("[a; b]"), vec!["a", "b"]);
        assert!(parse_facet_list("[]").is_empty());
        assert!(parse_facet_list("").is_empty());
    }
}
