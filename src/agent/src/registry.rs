use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::api::{
    EventHandlerFactory, FacetBuilderRef, InputBuilder, InputVisitor, OutputBuilder, OutputVisitor,
};
use crate::context::LineageContext;
use crate::dispatch::isolate;
use crate::{facets, plan};

/// Counters of dispatch misses and handler failures. Diagnostics only.
#[derive(Debug, Default)]
pub struct DispatchDiagnostics {
    unmatched: AtomicU64,
    failed: AtomicU64,
}

impl DispatchDiagnostics {
    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Nodes offered to a first-match chain that no handler accepted.
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    /// Handler invocations that returned an error or panicked.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Ordered handler lists for every extension point, built once per job.
///
/// In each list the handlers of extension modules come first, in module
/// order, followed by the built-in handlers. For first-match chains this
/// lets an extension take over a node shape; for facet merging it lets the
/// built-ins win name collisions.
#[derive(Default)]
pub struct VisitorRegistry {
    input_visitors: Vec<InputVisitor>,
    output_visitors: Vec<OutputVisitor>,
    input_builders: Vec<InputBuilder>,
    output_builders: Vec<OutputBuilder>,
    input_dataset_facet_builders: Vec<FacetBuilderRef>,
    output_dataset_facet_builders: Vec<FacetBuilderRef>,
    dataset_facet_builders: Vec<FacetBuilderRef>,
    run_facet_builders: Vec<FacetBuilderRef>,
    job_facet_builders: Vec<FacetBuilderRef>,
    diagnostics: DispatchDiagnostics,
}

impl VisitorRegistry {
    /// Assemble the lists for `context` from `modules`, then the built-ins.
    pub fn build(context: &LineageContext, modules: &[Box<dyn EventHandlerFactory>]) -> Self {
        let registry = Self {
            input_visitors: collect(
                modules,
                |m| m.input_visitors(context),
                plan::input_visitors(),
            ),
            output_visitors: collect(
                modules,
                |m| m.output_visitors(context),
                plan::output_visitors(),
            ),
            input_builders: collect(modules, |m| m.input_builders(context), Vec::new()),
            output_builders: collect(modules, |m| m.output_builders(context), Vec::new()),
            input_dataset_facet_builders: collect(
                modules,
                |m| m.input_dataset_facet_builders(context),
                Vec::new(),
            ),
            output_dataset_facet_builders: collect(
                modules,
                |m| m.output_dataset_facet_builders(context),
                facets::output_dataset_facet_builders(),
            ),
            dataset_facet_builders: collect(
                modules,
                |m| m.dataset_facet_builders(context),
                Vec::new(),
            ),
            run_facet_builders: collect(
                modules,
                |m| m.run_facet_builders(context),
                facets::run_facet_builders(),
            ),
            job_facet_builders: collect(
                modules,
                |m| m.job_facet_builders(context),
                facets::job_facet_builders(),
            ),
            diagnostics: DispatchDiagnostics::default(),
        };
        debug!(
            "registry for job {}: {} input visitors, {} output visitors from {} modules",
            context.job_name(),
            registry.input_visitors.len(),
            registry.output_visitors.len(),
            modules.len()
        );
        registry
    }

    /// Handlers offered every plan node; first match wins.
    pub fn input_visitors(&self) -> &[InputVisitor] {
        &self.input_visitors
    }

    /// Handlers offered the plan root; first match wins.
    pub fn output_visitors(&self) -> &[OutputVisitor] {
        &self.output_visitors
    }

    /// Builders of input datasets from host objects.
    pub fn input_builders(&self) -> &[InputBuilder] {
        &self.input_builders
    }

    /// Builders of output datasets from host objects.
    pub fn output_builders(&self) -> &[OutputBuilder] {
        &self.output_builders
    }

    /// Builders of side facets for inputs.
    pub fn input_dataset_facet_builders(&self) -> &[FacetBuilderRef] {
        &self.input_dataset_facet_builders
    }

    /// Builders of side facets for outputs.
    pub fn output_dataset_facet_builders(&self) -> &[FacetBuilderRef] {
        &self.output_dataset_facet_builders
    }

    /// Builders of facets for every dataset.
    pub fn dataset_facet_builders(&self) -> &[FacetBuilderRef] {
        &self.dataset_facet_builders
    }

    /// Builders of run facets.
    pub fn run_facet_builders(&self) -> &[FacetBuilderRef] {
        &self.run_facet_builders
    }

    /// Builders of job facets.
    pub fn job_facet_builders(&self) -> &[FacetBuilderRef] {
        &self.job_facet_builders
    }

    /// Dispatch counters of this registry.
    pub fn diagnostics(&self) -> &DispatchDiagnostics {
        &self.diagnostics
    }
}

/// Extension handlers in module order, then `builtin`. A module whose
/// factory fails contributes nothing to this extension point.
fn collect<T>(
    modules: &[Box<dyn EventHandlerFactory>],
    factory: impl Fn(&dyn EventHandlerFactory) -> Vec<T>,
    builtin: Vec<T>,
) -> Vec<T> {
    modules
        .iter()
        .flat_map(|module| {
            isolate("extension", module.name(), || Ok(factory(module.as_ref()))).unwrap_or_default()
        })
        .chain(builtin)
        .collect()
}
