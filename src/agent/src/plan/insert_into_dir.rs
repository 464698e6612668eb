use std::fmt;
use std::sync::Arc;

use datafusion::common::{DFSchemaRef, internal_err};
use datafusion::error::Result;
use datafusion::logical_expr::{Expr, Extension, LogicalPlan, UserDefinedLogicalNodeCore};
use lineage_common::{Dataset, OutputDataset, StateChange};

use super::{location_dataset, state_change_facets};
use crate::api::{QueryPlanVisitor, VisitContext};

/// Writes the result of `input` as files under `location`, outside of any
/// catalog table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Hash)]
pub struct InsertIntoDir {
    /// Directory the rows are written under.
    pub location: String,
    /// Whether existing files are replaced.
    pub overwrite: bool,
    /// Plan producing the rows.
    pub input: Arc<LogicalPlan>,
}

impl InsertIntoDir {
    /// A command writing the rows of `input` under `location`.
    pub fn new(location: impl Into<String>, overwrite: bool, input: LogicalPlan) -> Self {
        Self {
            location: location.into(),
            overwrite,
            input: Arc::new(input),
        }
    }

    /// Wrap the command into a plan node.
    pub fn into_plan(self) -> LogicalPlan {
        LogicalPlan::Extension(Extension {
            node: Arc::new(self),
        })
    }
}

impl UserDefinedLogicalNodeCore for InsertIntoDir {
    fn name(&self) -> &str {
        "InsertIntoDir"
    }

    fn inputs(&self) -> Vec<&LogicalPlan> {
        vec![self.input.as_ref()]
    }

    fn schema(&self) -> &DFSchemaRef {
        self.input.schema()
    }

    fn expressions(&self) -> Vec<Expr> {
        vec![]
    }

    fn fmt_for_explain(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InsertIntoDir: location={}, overwrite={}",
            self.location, self.overwrite
        )
    }

    fn with_exprs_and_inputs(
        &self,
        _exprs: Vec<Expr>,
        mut inputs: Vec<LogicalPlan>,
    ) -> Result<Self> {
        if inputs.len() != 1 {
            return internal_err!("InsertIntoDir expects one input, got {}", inputs.len());
        }
        Ok(Self {
            location: self.location.clone(),
            overwrite: self.overwrite,
            input: Arc::new(inputs.swap_remove(0)),
        })
    }
}

/// The target directory, overwritten when the command says so.
pub struct InsertIntoDirVisitor;

impl QueryPlanVisitor<OutputDataset> for InsertIntoDirVisitor {
    fn name(&self) -> &str {
        "InsertIntoDirVisitor"
    }

    fn is_defined_at(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Extension(ext) if ext.node.as_any().is::<InsertIntoDir>())
    }

    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<OutputDataset>> {
        let LogicalPlan::Extension(ext) = plan else {
            return Ok(vec![]);
        };
        let Some(command) = ext.node.as_any().downcast_ref::<InsertIntoDir>() else {
            return Ok(vec![]);
        };
        let Some(dataset): Option<OutputDataset> =
            location_dataset(cx, &command.location, command.input.schema().as_arrow())
        else {
            return Ok(vec![]);
        };
        if command.overwrite {
            return Ok(vec![
                dataset.with_facets(state_change_facets(cx, StateChange::Overwrite)),
            ]);
        }
        Ok(vec![dataset])
    }
}
