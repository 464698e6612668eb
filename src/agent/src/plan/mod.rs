//! Built-in pattern handlers for DataFusion plan nodes.

mod content_change;
mod copy_to;
mod create_table_like;
mod ddl;
mod insert_into_dir;
mod table_scan;

use std::sync::Arc;

use arrow_schema::Schema;
use datafusion::common::TableReference;
use datafusion::datasource::TableProvider;
use datafusion::datasource::listing::ListingTable;
use lineage_common::{
    Dataset, DatasetIdentifier, DatasetSchema, Facets, StateChange, facet, paths,
};

use crate::api::{InputVisitor, OutputVisitor, VisitContext};

pub use content_change::TableContentChangeVisitor;
pub use copy_to::CopyToVisitor;
pub use create_table_like::{CreateTableLike, CreateTableLikeVisitor};
pub use ddl::{CreateExternalTableVisitor, CreateMemoryTableVisitor, DropTableVisitor};
pub use insert_into_dir::{InsertIntoDir, InsertIntoDirVisitor};
pub use table_scan::TableScanVisitor;

pub(crate) fn input_visitors() -> Vec<InputVisitor> {
    vec![Arc::new(TableScanVisitor::new())]
}

/// Command shapes first; a bare scan at the root is reported as its own
/// output so that the content-change handler can describe write targets
/// through it.
pub(crate) fn output_visitors() -> Vec<OutputVisitor> {
    vec![
        Arc::new(TableContentChangeVisitor::new()),
        Arc::new(InsertIntoDirVisitor),
        Arc::new(CreateTableLikeVisitor),
        Arc::new(CopyToVisitor),
        Arc::new(CreateExternalTableVisitor),
        Arc::new(CreateMemoryTableVisitor),
        Arc::new(DropTableVisitor),
        Arc::new(TableScanVisitor::new()),
    ]
}

/// Identifiers of a catalog table: its storage locations when it is backed
/// by files, its qualified name in the table namespace otherwise.
pub fn table_identifiers(
    cx: &VisitContext<'_>,
    table: &TableReference,
    provider: Option<&Arc<dyn TableProvider>>,
) -> Vec<DatasetIdentifier> {
    let config = cx.config();
    if let Some(listing) = provider.and_then(|p| p.as_any().downcast_ref::<ListingTable>()) {
        let locations: Vec<_> = listing
            .table_paths()
            .iter()
            .filter_map(|url| paths::from_location(url.as_str(), &config.default_scheme))
            .collect();
        if !locations.is_empty() {
            return locations;
        }
    }
    let resolved = cx.catalog().resolve(table);
    vec![paths::from_table_name(
        &config.table_namespace,
        &resolved.to_string(),
    )]
}

/// One dataset per identifier of `table`, all sharing `schema`.
pub fn table_datasets<D: Dataset>(
    cx: &VisitContext<'_>,
    table: &TableReference,
    provider: Option<&Arc<dyn TableProvider>>,
    schema: &Schema,
) -> Vec<D> {
    let schema = DatasetSchema::from(schema);
    table_identifiers(cx, table, provider)
        .into_iter()
        .map(|identifier| D::new(identifier, Some(schema.clone())))
        .collect()
}

/// A dataset at `location`, a URL or a path in the default scheme. `None`
/// when the location is blank.
pub fn location_dataset<D: Dataset>(
    cx: &VisitContext<'_>,
    location: &str,
    schema: &Schema,
) -> Option<D> {
    let identifier = paths::from_location(location, &cx.config().default_scheme)?;
    Some(D::new(identifier, Some(DatasetSchema::from(schema))))
}

/// The `tableStateChange` facet recording `change`.
pub fn state_change_facets(cx: &VisitContext<'_>, change: StateChange) -> Facets {
    Facets::from([(
        facet::TABLE_STATE_CHANGE.to_string(),
        change.facet(cx.producer()),
    )])
}
