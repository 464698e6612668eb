//! Facets are named annotations attached to datasets, runs and jobs.

use std::collections::BTreeMap;
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dataset facet carrying the [`StateChange`] of an output.
pub const TABLE_STATE_CHANGE: &str = "tableStateChange";
/// Run facet describing the fault of a failed job.
pub const ERROR_MESSAGE: &str = "errorMessage";
/// Run facet with the indented logical plan.
pub const LOGICAL_PLAN: &str = "datafusion.logicalPlan";
/// Run facet naming the engine that executed the job.
pub const PROCESSING_ENGINE: &str = "processing_engine";
/// Output dataset facet with the number of rows and bytes written.
pub const OUTPUT_STATISTICS: &str = "outputStatistics";
/// Job facet with the statement text.
pub const SQL: &str = "sql";

const SPEC_URL: &str = "https://openlineage.io/spec/1-0-5/OpenLineage.json";

/// A named, versioned annotation. The name is the key it is stored under in
/// [`Facets`]; the version is carried by the schema URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facet {
    #[serde(rename = "_producer")]
    producer: String,
    #[serde(rename = "_schemaURL")]
    schema_url: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Facet {
    /// Create an empty facet whose schema is `definition` in the OpenLineage schema.
    pub fn new(producer: impl Into<String>, definition: &str) -> Self {
        Self {
            producer: producer.into(),
            schema_url: format!("{SPEC_URL}#/definitions/{definition}"),
            fields: Map::new(),
        }
    }

    /// Set a field, replacing any previous value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a field only when `value` is present.
    pub fn with_optional_field(
        self,
        key: impl Into<String>,
        value: Option<impl Into<Value>>,
    ) -> Self {
        match value {
            Some(value) => self.with_field(key, value),
            None => self,
        }
    }

    /// Producer URI of the facet.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Schema URL naming the facet definition.
    pub fn schema_url(&self) -> &str {
        &self.schema_url
    }

    /// A free-form field by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All free-form fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Facets keyed by name. A name appears at most once.
pub type Facets = BTreeMap<String, Facet>;

/// Apply `new` over `existing` by plain key replacement.
///
/// Values are never merged recursively: a facet in `new` replaces the facet
/// of the same name in `existing` as a whole. The caller decides precedence
/// through the order of its `merge` calls.
pub fn merge(mut existing: Facets, new: Facets) -> Facets {
    merge_into(&mut existing, new);
    existing
}

/// In-place variant of [`merge`].
pub fn merge_into(existing: &mut Facets, new: Facets) {
    existing.extend(new);
}

/// What a write did to the dataset it targeted.
///
/// Plain appends and row-level changes carry no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateChange {
    /// The dataset was created.
    Create,
    /// The dataset contents were replaced.
    Overwrite,
    /// The dataset was dropped.
    Drop,
}

impl StateChange {
    /// Wire name of the change.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateChange::Create => "CREATE",
            StateChange::Overwrite => "OVERWRITE",
            StateChange::Drop => "DROP",
        }
    }

    /// The `tableStateChange` facet for this change.
    pub fn facet(self, producer: impl Into<String>) -> Facet {
        Facet::new(producer, "TableStateChangeFacet").with_field("stateChange", self.as_str())
    }

    /// Read the change back from a `tableStateChange` facet.
    pub fn from_facet(facet: &Facet) -> Option<Self> {
        facet
            .field("stateChange")
            .and_then(Value::as_str)
            .and_then(|value| value.parse().ok())
    }
}

impl Display for StateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StateChange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATE" => StateChange::Create,
            "OVERWRITE" => StateChange::Overwrite,
            "DROP" => StateChange::Drop,
            _ => return Err(format!("Invalid state change: {s}")),
        })
    }
}
