use datafusion::error::Result;
use datafusion::logical_expr::{DdlStatement, LogicalPlan};
use lineage_common::{Dataset, OutputDataset, StateChange};

use super::{location_dataset, state_change_facets, table_datasets};
use crate::api::{QueryPlanVisitor, VisitContext};

/// `CREATE EXTERNAL TABLE`: the table location, created.
pub struct CreateExternalTableVisitor;

impl QueryPlanVisitor<OutputDataset> for CreateExternalTableVisitor {
    fn name(&self) -> &str {
        "CreateExternalTableVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(
            plan,
            LogicalPlan::Ddl(DdlStatement::CreateExternalTable(_))
        )
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Ddl(DdlStatement::CreateExternalTable(create)) = plan else {
            return Ok(vec![]);
        };
        let Some(dataset): Option<OutputDataset> =
            location_dataset(cx, &create.location, create.schema.as_arrow())
        else {
            return Ok(vec![]);
        };
        Ok(vec![
            dataset.with_facets(state_change_facets(cx, StateChange::Create)),
        ])
    }
}

/// `CREATE TABLE ... AS SELECT` into session memory: the new table by name,
/// created.
pub struct CreateMemoryTableVisitor;

impl QueryPlanVisitor<OutputDataset> for CreateMemoryTableVisitor {
    fn name(&self) -> &str {
        "CreateMemoryTableVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Ddl(DdlStatement::CreateMemoryTable(_)))
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Ddl(DdlStatement::CreateMemoryTable(create)) = plan else {
            return Ok(vec![]);
        };
        let facets = state_change_facets(cx, StateChange::Create);
        let schema = create.input.schema().as_arrow();
        let datasets = table_datasets::<OutputDataset>(cx, &create.name, None, schema);
        Ok(datasets
            .into_iter()
            .map(|dataset| dataset.with_facets(facets.clone()))
            .collect())
    }
}

/// `DROP TABLE`: the dropped table as it was known when the job started.
pub struct DropTableVisitor;

impl QueryPlanVisitor<OutputDataset> for DropTableVisitor {
    fn name(&self) -> &str {
        "DropTableVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Ddl(DdlStatement::DropTable(_)))
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Ddl(DdlStatement::DropTable(drop)) = plan else {
            return Ok(vec![]);
        };
        let provider = cx.catalog().table(&drop.name);
        let schema = match provider {
            Some(provider) => provider.schema(),
            None => drop.schema.inner().clone(),
        };
        let facets = state_change_facets(cx, StateChange::Drop);
        Ok(table_datasets::<OutputDataset>(cx, &drop.name, provider, &schema)
            .into_iter()
            .map(|dataset| dataset.with_facets(facets.clone()))
            .collect())
    }
}
