use arrow_schema::Schema;
use serde::Serialize;

/// One column of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    /// Column name.
    pub name: String,
    /// Arrow type of the column, as displayed.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column admits nulls.
    pub nullable: bool,
}

/// Ordered columns of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSchema {
    /// Columns in order.
    pub fields: Vec<SchemaField>,
}

impl DatasetSchema {
    /// Column names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Whether there are no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<&Schema> for DatasetSchema {
    fn from(schema: &Schema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|field| SchemaField {
                name: field.name().clone(),
                data_type: field.data_type().to_string(),
                nullable: field.is_nullable(),
            })
            .collect();
        Self { fields }
    }
}
