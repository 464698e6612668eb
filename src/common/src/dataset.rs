use std::fmt::Display;

use serde::Serialize;

use crate::facet::{self, Facets, StateChange, TABLE_STATE_CHANGE};
use crate::schema::DatasetSchema;

/// Identity of a physical or logical dataset.
///
/// `namespace` names the storage system (`file`, `s3://bucket`, or the table
/// namespace of a catalog) and `name` the path or qualified table name in it.
/// Build identifiers through [`crate::paths`] so that one physical dataset
/// always normalizes to one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DatasetIdentifier {
    namespace: String,
    name: String,
}

impl DatasetIdentifier {
    /// An identifier in `namespace` named `name`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace, usually the scheme and authority of the location.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name within the namespace.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for DatasetIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Operations shared by input and output datasets, so that a handler can be
/// written once for both sides.
pub trait Dataset: Clone + Send + Sync + 'static {
    /// A dataset with no facets.
    fn new(identifier: DatasetIdentifier, schema: Option<DatasetSchema>) -> Self;

    /// Namespace and name of the dataset.
    fn identifier(&self) -> &DatasetIdentifier;

    /// Columns, when known.
    fn schema(&self) -> Option<&DatasetSchema>;

    /// Facets of the dataset itself.
    fn facets(&self) -> &Facets;

    /// Dataset facets, for builders to extend.
    fn facets_mut(&mut self) -> &mut Facets;

    /// Facets that only make sense on this side (input or output).
    fn side_facets_mut(&mut self) -> &mut Facets;

    /// Add `facets` over the existing dataset facets.
    fn with_facets(mut self, facets: Facets) -> Self {
        facet::merge_into(self.facets_mut(), facets);
        self
    }

    /// Fold a dataset with the same identifier into this one. Facets of
    /// `other` win on name collisions; the schema is kept if already known.
    fn absorb(&mut self, other: Self);
}

/// A dataset read by the job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDataset {
    #[serde(flatten)]
    identifier: DatasetIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<DatasetSchema>,
    facets: Facets,
    input_facets: Facets,
}

impl InputDataset {
    /// Facets describing how the input was read.
    pub fn input_facets(&self) -> &Facets {
        &self.input_facets
    }
}

impl Dataset for InputDataset {
    fn new(identifier: DatasetIdentifier, schema: Option<DatasetSchema>) -> Self {
        Self {
            identifier,
            schema,
            facets: Facets::new(),
            input_facets: Facets::new(),
        }
    }

    fn identifier(&self) -> &DatasetIdentifier {
        &self.identifier
    }

    fn schema(&self) -> Option<&DatasetSchema> {
        self.schema.as_ref()
    }

    fn facets(&self) -> &Facets {
        &self.facets
    }

    fn facets_mut(&mut self) -> &mut Facets {
        &mut self.facets
    }

    fn side_facets_mut(&mut self) -> &mut Facets {
        &mut self.input_facets
    }

    fn absorb(&mut self, other: Self) {
        if self.schema.is_none() {
            self.schema = other.schema;
        }
        facet::merge_into(&mut self.facets, other.facets);
        facet::merge_into(&mut self.input_facets, other.input_facets);
    }
}

/// A dataset written by the job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDataset {
    #[serde(flatten)]
    identifier: DatasetIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<DatasetSchema>,
    facets: Facets,
    output_facets: Facets,
}

impl OutputDataset {
    /// Facets describing how the output was written.
    pub fn output_facets(&self) -> &Facets {
        &self.output_facets
    }

    /// The change recorded in the `tableStateChange` facet, if any.
    /// `None` means the write is an append or was not qualified.
    pub fn state_change(&self) -> Option<StateChange> {
        self.facets
            .get(TABLE_STATE_CHANGE)
            .and_then(StateChange::from_facet)
    }
}

impl Dataset for OutputDataset {
    fn new(identifier: DatasetIdentifier, schema: Option<DatasetSchema>) -> Self {
        Self {
            identifier,
            schema,
            facets: Facets::new(),
            output_facets: Facets::new(),
        }
    }

    fn identifier(&self) -> &DatasetIdentifier {
        &self.identifier
    }

    fn schema(&self) -> Option<&DatasetSchema> {
        self.schema.as_ref()
    }

    fn facets(&self) -> &Facets {
        &self.facets
    }

    fn facets_mut(&mut self) -> &mut Facets {
        &mut self.facets
    }

    fn side_facets_mut(&mut self) -> &mut Facets {
        &mut self.output_facets
    }

    fn absorb(&mut self, other: Self) {
        if self.schema.is_none() {
            self.schema = other.schema;
        }
        facet::merge_into(&mut self.facets, other.facets);
        facet::merge_into(&mut self.output_facets, other.output_facets);
    }
}
