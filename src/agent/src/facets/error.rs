use datafusion::error::Result;
use lineage_common::Facet;
use lineage_common::facet::ERROR_MESSAGE;

use crate::api::{CustomFacetBuilder, FacetInput, FacetSink, VisitContext};

/// `errorMessage`: the fault of a failed job.
pub struct ErrorFacetBuilder;

impl CustomFacetBuilder for ErrorFacetBuilder {
    fn name(&self) -> &str {
        "ErrorFacetBuilder"
    }

    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool {
        matches!(input, FacetInput::Event(event) if event.fault().is_some())
    }

    fn build(
        &self,
        _cx: &VisitContext<'_>,
        input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()> {
        if let FacetInput::Event(event) = input
            && let Some(fault) = event.fault()
        {
            let facet = Facet::new(sink.producer(), "ErrorMessageRunFacet")
                .with_field("message", fault.message())
                .with_field("programmingLanguage", "Rust")
                .with_optional_field("stackTrace", fault.stack_trace());
            sink.accept(ERROR_MESSAGE, facet);
        }
        Ok(())
    }
}
