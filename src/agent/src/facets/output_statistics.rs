use datafusion::error::Result;
use lineage_common::Facet;
use lineage_common::facet::OUTPUT_STATISTICS;

use crate::api::{CustomFacetBuilder, FacetInput, FacetSink, VisitContext};

/// `outputStatistics`: rows and bytes written, when the host reported them.
pub struct OutputStatisticsFacetBuilder;

impl CustomFacetBuilder for OutputStatisticsFacetBuilder {
    fn name(&self) -> &str {
        "OutputStatisticsFacetBuilder"
    }

    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool {
        matches!(input, FacetInput::Event(event) if event.metrics().is_some())
    }

    fn build(
        &self,
        _cx: &VisitContext<'_>,
        input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()> {
        if let FacetInput::Event(event) = input
            && let Some(metrics) = event.metrics()
        {
            let facet = Facet::new(sink.producer(), "OutputStatisticsOutputDatasetFacet")
                .with_optional_field("rowCount", metrics.rows_written)
                .with_optional_field("size", metrics.bytes_written);
            sink.accept(OUTPUT_STATISTICS, facet);
        }
        Ok(())
    }
}
