use std::sync::Arc;

use datafusion::error::Result;
use datafusion::logical_expr::LogicalPlan;
use datafusion::logical_expr::logical_plan::dml::{InsertOp, WriteOp};
use lineage_common::{Dataset, OutputDataset, StateChange, facet};
use log::debug;

use super::{state_change_facets, table_datasets};
use crate::api::{QueryPlanVisitor, VisitContext};
use crate::dispatch::{apply_all, apply_first};

/// Qualifies a DML statement with the state change it makes, if any.
struct DmlStateChange {
    name: &'static str,
    matches: fn(&WriteOp) -> bool,
    change: Option<StateChange>,
}

impl QueryPlanVisitor<StateChange> for DmlStateChange {
    fn name(&self) -> &str {
        self.name
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Dml(dml) if (self.matches)(&dml.op))
    }

    fn apply(&self, _cx: &VisitContext<'_>, _plan: &LogicalPlan) -> Result<Vec<StateChange>> {
        Ok(self.change.into_iter().collect())
    }
}

fn state_change_handlers() -> Vec<Arc<dyn QueryPlanVisitor<StateChange>>> {
    vec![
        Arc::new(DmlStateChange {
            name: "InsertOverwrite",
            matches: |op| {
                matches!(
                    op,
                    WriteOp::Insert(InsertOp::Overwrite | InsertOp::Replace)
                )
            },
            change: Some(StateChange::Overwrite),
        }),
        Arc::new(DmlStateChange {
            name: "InsertAppend",
            matches: |op| matches!(op, WriteOp::Insert(InsertOp::Append)),
            change: None,
        }),
        Arc::new(DmlStateChange {
            name: "RowLevelChange",
            matches: |op| matches!(op, WriteOp::Delete | WriteOp::Update),
            change: None,
        }),
        Arc::new(DmlStateChange {
            name: "CreateTableAsSelect",
            matches: |op| matches!(op, WriteOp::Ctas),
            change: Some(StateChange::Create),
        }),
    ]
}

/// Writes into a catalog table (`INSERT`, `UPDATE`, `DELETE`).
///
/// The target is described by offering a scan of it to the output chain,
/// so that every table kind an input handler understands is also understood
/// as a write target. The statement is then qualified by every state-change
/// handler that accepts it; when several do, the last one wins.
pub struct TableContentChangeVisitor {
    state_changes: Vec<Arc<dyn QueryPlanVisitor<StateChange>>>,
}

impl TableContentChangeVisitor {
    /// The handler with the built-in DML state changes.
    pub fn new() -> Self {
        Self {
            state_changes: state_change_handlers(),
        }
    }
}

impl Default for TableContentChangeVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPlanVisitor<OutputDataset> for TableContentChangeVisitor {
    fn name(&self) -> &str {
        "TableContentChangeVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Dml(_))
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Dml(dml) = plan else {
            return Ok(vec![]);
        };

        let mut datasets = match cx.catalog().relation(&dml.table_name)? {
            Some(relation) => apply_first(cx, cx.registry().output_visitors(), &relation),
            None => {
                debug!("{} is not in the catalog snapshot", dml.table_name);
                table_datasets(cx, &dml.table_name, None, dml.input.schema().as_arrow())
            }
        };

        if let Some(change) = apply_all(cx, &self.state_changes, plan).pop() {
            let facets = state_change_facets(cx, change);
            for dataset in &mut datasets {
                facet::merge_into(dataset.facets_mut(), facets.clone());
            }
        }
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use datafusion::common::TableReference;
    use lineage_common::facet::TABLE_STATE_CHANGE;

    use super::*;
    use crate::tests::{Fixture, plan_sql, session_with_tables};

    #[tokio::test]
    async fn target_matches_its_scan_description() {
        let ctx = session_with_tables(&["target", "source"]);
        let fixture = Fixture::snapshot(&ctx).await;
        let cx = fixture.visit_context();
        let plan = plan_sql(&ctx, "INSERT INTO target SELECT * FROM source").await;

        let written = TableContentChangeVisitor::new().apply(&cx, &plan).unwrap();
        let relation = fixture
            .catalog()
            .relation(&TableReference::bare("target"))
            .unwrap()
            .unwrap();
        let scanned = apply_first(&cx, cx.registry().output_visitors(), &relation);

        assert_eq!(written, scanned);
        assert_eq!(written[0].state_change(), None);
        assert!(!written[0].facets().contains_key(TABLE_STATE_CHANGE));
    }

    #[tokio::test]
    async fn overwrite_is_qualified() {
        let ctx = session_with_tables(&["target", "source"]);
        let fixture = Fixture::snapshot(&ctx).await;
        let cx = fixture.visit_context();
        let plan = plan_sql(&ctx, "INSERT OVERWRITE target SELECT * FROM source").await;

        let written = TableContentChangeVisitor::new().apply(&cx, &plan).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].identifier().name(), "datafusion.public.target");
        assert_eq!(written[0].state_change(), Some(StateChange::Overwrite));
    }

    #[tokio::test]
    async fn delete_carries_no_state_change() {
        let ctx = session_with_tables(&["target", "source"]);
        let fixture = Fixture::snapshot(&ctx).await;
        let cx = fixture.visit_context();
        let plan = plan_sql(&ctx, "DELETE FROM target WHERE id = 1").await;

        let written = TableContentChangeVisitor::new().apply(&cx, &plan).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].state_change(), None);
    }
}
