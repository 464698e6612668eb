//! Facet aggregation and the built-in facet builders.

mod engine;
mod error;
mod logical_plan;
mod output_statistics;
mod sql;

use std::sync::Arc;

use lineage_common::Facets;
use lineage_common::facet::merge;

use crate::api::{FacetBuilderRef, FacetInput, FacetSink, VisitContext};
use crate::dispatch::isolate;

pub use engine::ProcessingEngineFacetBuilder;
pub use error::ErrorFacetBuilder;
pub use logical_plan::LogicalPlanFacetBuilder;
pub use output_statistics::OutputStatisticsFacetBuilder;
pub use sql::SqlJobFacetBuilder;

pub(crate) fn run_facet_builders() -> Vec<FacetBuilderRef> {
    vec![
        Arc::new(ErrorFacetBuilder),
        Arc::new(LogicalPlanFacetBuilder),
        Arc::new(ProcessingEngineFacetBuilder),
    ]
}

pub(crate) fn output_dataset_facet_builders() -> Vec<FacetBuilderRef> {
    vec![Arc::new(OutputStatisticsFacetBuilder)]
}

pub(crate) fn job_facet_builders() -> Vec<FacetBuilderRef> {
    vec![Arc::new(SqlJobFacetBuilder)]
}

/// Offer every input to every builder and merge what they emit.
///
/// Builders are visited in registry order and, for each builder, inputs in
/// the given order; later emissions replace earlier facets of the same
/// name. Facets disabled in the configuration are dropped, and a builder
/// that fails contributes nothing for that input.
pub fn aggregate(
    cx: &VisitContext<'_>,
    builders: &[FacetBuilderRef],
    inputs: &[FacetInput<'_>],
) -> Facets {
    let config = cx.config();
    let diagnostics = cx.registry().diagnostics();
    let mut facets = Facets::new();
    for builder in builders {
        for input in inputs {
            let defined = isolate("facet builder", builder.name(), || {
                Ok(builder.is_defined_at(input))
            })
            .unwrap_or(false);
            if !defined {
                continue;
            }

            let mut sink = FacetSink::new(cx.producer());
            if isolate("facet builder", builder.name(), || builder.build(cx, input, &mut sink))
                .is_none()
            {
                diagnostics.record_failure();
                continue;
            }
            let emitted: Facets = sink
                .into_facets()
                .into_iter()
                .filter(|(name, _)| !config.is_facet_disabled(name))
                .collect();
            facets = merge(facets, emitted);
        }
    }
    facets
}
