use datafusion::error::Result;
use lineage_common::Facet;
use lineage_common::facet::SQL;

use crate::api::{CustomFacetBuilder, FacetInput, FacetSink, VisitContext};

/// `sql`: the statement text, when the host supplied it.
pub struct SqlJobFacetBuilder;

impl CustomFacetBuilder for SqlJobFacetBuilder {
    fn name(&self) -> &str {
        "SqlJobFacetBuilder"
    }

    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool {
        matches!(input, FacetInput::Event(event) if event.sql().is_some())
    }

    fn build(
        &self,
        _cx: &VisitContext<'_>,
        input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()> {
        if let FacetInput::Event(event) = input
            && let Some(query) = event.sql()
        {
            let facet = Facet::new(sink.producer(), "SQLJobFacet").with_field("query", query);
            sink.accept(SQL, facet);
        }
        Ok(())
    }
}
