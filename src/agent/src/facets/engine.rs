use datafusion::DATAFUSION_VERSION;
use datafusion::error::Result;
use lineage_common::Facet;
use lineage_common::facet::PROCESSING_ENGINE;

use crate::api::{CustomFacetBuilder, FacetInput, FacetSink, VisitContext};

/// `processing_engine`: the engine and agent versions.
pub struct ProcessingEngineFacetBuilder;

impl CustomFacetBuilder for ProcessingEngineFacetBuilder {
    fn name(&self) -> &str {
        "ProcessingEngineFacetBuilder"
    }

    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool {
        matches!(input, FacetInput::Event(_))
    }

    fn build(
        &self,
        _cx: &VisitContext<'_>,
        _input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()> {
        let facet = Facet::new(sink.producer(), "ProcessingEngineRunFacet")
            .with_field("name", "DataFusion")
            .with_field("version", DATAFUSION_VERSION)
            .with_field("lineageAgentVersion", env!("CARGO_PKG_VERSION"));
        sink.accept(PROCESSING_ENGINE, facet);
        Ok(())
    }
}
