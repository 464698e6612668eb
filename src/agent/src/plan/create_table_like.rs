use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use datafusion::common::{DFSchema, DFSchemaRef, TableReference, internal_err};
use datafusion::error::Result;
use datafusion::logical_expr::{Expr, Extension, LogicalPlan, UserDefinedLogicalNodeCore};
use lineage_common::{Dataset, DatasetSchema, OutputDataset, StateChange, paths};
use log::debug;

use super::state_change_facets;
use crate::api::{QueryPlanVisitor, VisitContext};

/// Creates the empty table `target` with the columns of `source`, stored at
/// `location` or under the warehouse when no location is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreateTableLike {
    /// Table being created.
    pub target: TableReference,
    /// Table whose schema is copied.
    pub source: TableReference,
    /// Explicit location; the warehouse default otherwise.
    pub location: Option<String>,
    schema: DFSchemaRef,
}

impl CreateTableLike {
    /// A `CREATE TABLE target LIKE source` command.
    pub fn new(
        target: impl Into<TableReference>,
        source: impl Into<TableReference>,
        location: Option<String>,
    ) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            location,
            schema: Arc::new(DFSchema::empty()),
        }
    }

    /// Wrap the command into a plan node.
    pub fn into_plan(self) -> LogicalPlan {
        LogicalPlan::Extension(Extension {
            node: Arc::new(self),
        })
    }
}

impl PartialOrd for CreateTableLike {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (&self.target, &self.source, &self.location).partial_cmp(&(
            &other.target,
            &other.source,
            &other.location,
        ))
    }
}

impl UserDefinedLogicalNodeCore for CreateTableLike {
    fn name(&self) -> &str {
        "CreateTableLike"
    }

    fn inputs(&self) -> Vec<&LogicalPlan> {
        vec![]
    }

    fn schema(&self) -> &DFSchemaRef {
        &self.schema
    }

    fn expressions(&self) -> Vec<Expr> {
        vec![]
    }

    fn fmt_for_explain(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CreateTableLike: {} like {}", self.target, self.source)?;
        if let Some(location) = &self.location {
            write!(f, ", location={location}")?;
        }
        Ok(())
    }

    fn with_exprs_and_inputs(&self, _exprs: Vec<Expr>, inputs: Vec<LogicalPlan>) -> Result<Self> {
        if !inputs.is_empty() {
            return internal_err!("CreateTableLike takes no inputs, got {}", inputs.len());
        }
        Ok(self.clone())
    }
}

/// The new table, created with the schema of the table it copies.
pub struct CreateTableLikeVisitor;

impl QueryPlanVisitor<OutputDataset> for CreateTableLikeVisitor {
    fn name(&self) -> &str {
        "CreateTableLikeVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Extension(ext) if ext.node.as_any().is::<CreateTableLike>())
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Extension(ext) = plan else {
            return Ok(vec![]);
        };
        let Some(command) = ext.node.as_any().downcast_ref::<CreateTableLike>() else {
            return Ok(vec![]);
        };

        let catalog = cx.catalog();
        let Some(source) = catalog.table(&command.source) else {
            debug!("source table {} of {} is unknown", command.source, command.target);
            return Ok(vec![]);
        };
        let identifier = match &command.location {
            Some(location) => paths::from_location(location, &cx.config().default_scheme),
            None => catalog
                .default_table_path(&command.target)
                .map(|url| paths::from_url(&url)),
        };
        let Some(identifier) = identifier else {
            debug!("no location for {}", command.target);
            return Ok(vec![]);
        };

        let dataset = OutputDataset::new(
            identifier,
            Some(DatasetSchema::from(source.schema().as_ref())),
        );
        Ok(vec![
            dataset.with_facets(state_change_facets(cx, StateChange::Create)),
        ])
    }
}
