use datafusion::error::Result;
use lineage_common::Facet;
use lineage_common::facet::LOGICAL_PLAN;

use crate::api::{CustomFacetBuilder, FacetInput, FacetSink, VisitContext};

/// `datafusion.logicalPlan`: the indented plan the job ran.
pub struct LogicalPlanFacetBuilder;

impl CustomFacetBuilder for LogicalPlanFacetBuilder {
    fn name(&self) -> &str {
        "LogicalPlanFacetBuilder"
    }

    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool {
        matches!(input, FacetInput::Event(event) if event.plan().is_some())
    }

    fn build(
        &self,
        _cx: &VisitContext<'_>,
        input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()> {
        if let FacetInput::Event(event) = input
            && let Some(plan) = event.plan()
        {
            let facet = Facet::new(sink.producer(), "LogicalPlanRunFacet")
                .with_field("plan", plan.display_indent().to_string());
            sink.accept(LOGICAL_PLAN, facet);
        }
        Ok(())
    }
}
