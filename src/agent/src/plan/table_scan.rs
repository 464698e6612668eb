use std::marker::PhantomData;

use datafusion::datasource::source_as_provider;
use datafusion::error::Result;
use datafusion::logical_expr::LogicalPlan;
use lineage_common::Dataset;

use super::table_datasets;
use crate::api::{QueryPlanVisitor, VisitContext};

/// Describes the table a scan reads. Used for inputs everywhere in a plan,
/// and for outputs when the scan is the root of a plan built to describe a
/// write target.
pub struct TableScanVisitor<D> {
    _dataset: PhantomData<fn() -> D>,
}

impl<D> TableScanVisitor<D> {
    /// A handler for scans, usable on either side.
    pub fn new() -> Self {
        Self {
            _dataset: PhantomData,
        }
    }
}

impl<D> Default for TableScanVisitor<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dataset> QueryPlanVisitor<D> for TableScanVisitor<D> {
    fn name(&self) -> &str {
        "TableScanVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::TableScan(_))
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<D>> {
        let LogicalPlan::TableScan(scan) = plan else {
            return Ok(vec![]);
        };
        // Sources without a provider, such as those of a remote planner,
        // fall back to the snapshot.
        let provider = source_as_provider(&scan.source)
            .ok()
            .or_else(|| cx.catalog().table(&scan.table_name).cloned());
        let schema = match &provider {
            Some(provider) => provider.schema(),
            None => scan.source.schema(),
        };
        Ok(table_datasets(cx, &scan.table_name, provider.as_ref(), &schema))
    }
}
