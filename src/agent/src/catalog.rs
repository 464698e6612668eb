//! Tables of the session a job runs in.

use std::collections::HashMap;
use std::sync::Arc;

use datafusion::common::{ResolvedTableReference, TableReference};
use datafusion::datasource::{TableProvider, provider_as_source};
use datafusion::error::Result;
use datafusion::logical_expr::{LogicalPlan, LogicalPlanBuilder};
use datafusion::prelude::SessionContext;
use log::debug;
use url::Url;

/// A read-only view of the session catalog, taken when a job starts.
///
/// Handlers resolve table names through it without awaiting the session's
/// async catalog API, and without observing tables created after the job
/// began.
#[derive(Debug, Clone)]
pub struct SessionCatalog {
    default_catalog: String,
    default_schema: String,
    tables: HashMap<String, Arc<dyn TableProvider>>,
    warehouse: Option<Url>,
}

impl Default for SessionCatalog {
    fn default() -> Self {
        Self::new("datafusion", "public")
    }
}

impl SessionCatalog {
    /// A catalog resolving bare names in `default_catalog.default_schema`.
    pub fn new(default_catalog: impl Into<String>, default_schema: impl Into<String>) -> Self {
        Self {
            default_catalog: default_catalog.into(),
            default_schema: default_schema.into(),
            tables: HashMap::new(),
            warehouse: None,
        }
    }

    /// Snapshot every table registered in `ctx`.
    pub async fn snapshot(ctx: &SessionContext) -> Result<Self> {
        let state = ctx.state();
        let options = state.config_options();
        let mut catalog = Self::new(
            options.catalog.default_catalog.clone(),
            options.catalog.default_schema.clone(),
        );
        if let Some(location) = options.catalog.location.as_deref() {
            match warehouse_url(location) {
                Some(warehouse) => catalog = catalog.with_warehouse(warehouse),
                None => debug!("catalog location {location} is not a usable warehouse"),
            }
        }

        for catalog_name in ctx.catalog_names() {
            let Some(catalog_provider) = ctx.catalog(&catalog_name) else {
                continue;
            };
            for schema_name in catalog_provider.schema_names() {
                let Some(schema) = catalog_provider.schema(&schema_name) else {
                    continue;
                };
                for table_name in schema.table_names() {
                    if let Some(provider) = schema.table(&table_name).await? {
                        let reference = TableReference::full(
                            catalog_name.as_str(),
                            schema_name.as_str(),
                            table_name,
                        );
                        catalog = catalog.with_table(reference, provider);
                    }
                }
            }
        }

        debug!("catalog snapshot holds {} tables", catalog.tables.len());
        Ok(catalog)
    }

    /// Register `provider` under `table`, qualified with the defaults.
    pub fn with_table(
        mut self,
        table: impl Into<TableReference>,
        provider: Arc<dyn TableProvider>,
    ) -> Self {
        let key = self.resolve(&table.into()).to_string();
        self.tables.insert(key, provider);
        self
    }

    /// Root under which tables without an explicit location are stored.
    pub fn with_warehouse(mut self, warehouse: Url) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    /// `table` qualified with the default catalog and schema.
    pub fn resolve(&self, table: &TableReference) -> ResolvedTableReference {
        table.clone().resolve(&self.default_catalog, &self.default_schema)
    }

    /// The provider registered for `table`, if any.
    pub fn table(&self, table: &TableReference) -> Option<&Arc<dyn TableProvider>> {
        self.tables.get(&self.resolve(table).to_string())
    }

    /// Where a managed table named `table` would be stored: `<warehouse>/<schema>/<table>`.
    pub fn default_table_path(&self, table: &TableReference) -> Option<Url> {
        let warehouse = self.warehouse.as_ref()?;
        let resolved = self.resolve(table);
        let mut url = warehouse.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(&resolved.schema)
            .push(&resolved.table);
        Some(url)
    }

    /// A scan of `table`, for handlers that describe a write target through
    /// the plan a read of it would produce.
    pub fn relation(&self, table: &TableReference) -> Result<Option<LogicalPlan>> {
        let Some(provider) = self.table(table) else {
            return Ok(None);
        };
        let plan = LogicalPlanBuilder::scan(
            table.clone(),
            provider_as_source(Arc::clone(provider)),
            None,
        )?
        .build()?;
        Ok(Some(plan))
    }
}

/// `location` as a URL; bare paths are made absolute and name a directory.
fn warehouse_url(location: &str) -> Option<Url> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    match Url::parse(location) {
        Ok(url) if url.scheme().len() > 1 => Some(url),
        _ => Url::from_directory_path(std::path::absolute(location).ok()?).ok(),
    }
}
