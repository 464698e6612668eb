use datafusion::error::Result;
use datafusion::logical_expr::LogicalPlan;
use lineage_common::OutputDataset;

use super::location_dataset;
use crate::api::{QueryPlanVisitor, VisitContext};

/// `COPY ... TO '<location>'`: the written location, with the schema of the
/// copied query. Copies replace files at the location without qualifying
/// the table state.
pub struct CopyToVisitor;

impl QueryPlanVisitor<OutputDataset> for CopyToVisitor {
    fn name(&self) -> &str {
        "CopyToVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Copy(_))
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Copy(copy) = plan else {
            return Ok(vec![]);
        };
        let dataset = location_dataset(cx, &copy.output_url, copy.input.schema().as_arrow());
        Ok(dataset.into_iter().collect())
    }
}
