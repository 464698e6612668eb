//! Traits implemented by pattern handlers, facet builders and extension modules.

use std::any::Any;
use std::sync::Arc;

use datafusion::error::Result;
use datafusion::logical_expr::LogicalPlan;
use lineage_common::{Facet, InputDataset, OutputDataset};

use crate::catalog::SessionCatalog;
use crate::config::LineageConfig;
use crate::context::LineageContext;
use crate::lifecycle::LifecycleEvent;
use crate::registry::VisitorRegistry;

/// A pattern handler: recognizes one family of plan nodes and extracts the
/// datasets they read or write.
///
/// `is_defined_at` must be a cheap shape test. `apply` is only called on
/// nodes the handler accepted; it returns an empty list when the node lacks
/// the data needed to identify a dataset.
pub trait QueryPlanVisitor<D>: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether this handler recognizes the shape of `plan`.
    fn is_defined_at(&self, plan: &LogicalPlan) -> bool;

    /// Datasets described by `plan`.
    fn apply(&self, cx: &VisitContext<'_>, plan: &LogicalPlan) -> Result<Vec<D>>;
}

/// Shared handler producing input datasets.
pub type InputVisitor = Arc<dyn QueryPlanVisitor<InputDataset>>;
/// Shared handler producing output datasets.
pub type OutputVisitor = Arc<dyn QueryPlanVisitor<OutputDataset>>;

/// Extracts datasets from opaque objects the host attaches to a lifecycle
/// event, such as engine-specific job descriptors.
pub trait DatasetBuilder<D>: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether this builder understands `object`.
    fn is_defined_at(&self, object: &(dyn Any + Send + Sync)) -> bool;

    /// Datasets described by `object`.
    fn build(&self, cx: &VisitContext<'_>, object: &(dyn Any + Send + Sync)) -> Result<Vec<D>>;
}

/// Shared object builder producing input datasets.
pub type InputBuilder = Arc<dyn DatasetBuilder<InputDataset>>;
/// Shared object builder producing output datasets.
pub type OutputBuilder = Arc<dyn DatasetBuilder<OutputDataset>>;

/// What a facet builder is offered during aggregation.
#[derive(Debug, Clone, Copy)]
pub enum FacetInput<'a> {
    /// The lifecycle event being reported.
    Event(&'a LifecycleEvent),
    /// A node of the plan snapshot. Every node is offered, the root first.
    Plan(&'a LogicalPlan),
    /// An object attached to the event by the host.
    Object(&'a (dyn Any + Send + Sync)),
}

/// Produces named facets for a run, a job or the datasets of an event.
pub trait CustomFacetBuilder: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether this builder has anything to emit for `input`.
    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool;

    /// Emit the facets `input` calls for into `sink`.
    fn build(
        &self,
        cx: &VisitContext<'_>,
        input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()>;
}

/// Shared facet builder.
pub type FacetBuilderRef = Arc<dyn CustomFacetBuilder>;

/// Collects the facets emitted by one builder invocation, in order.
#[derive(Debug)]
pub struct FacetSink {
    producer: String,
    facets: Vec<(String, Facet)>,
}

impl FacetSink {
    pub(crate) fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            facets: Vec::new(),
        }
    }

    /// Producer URI to stamp on new facets.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Emit `facet` under `name`. A later facet of the same name replaces it.
    pub fn accept(&mut self, name: impl Into<String>, facet: Facet) {
        self.facets.push((name.into(), facet));
    }

    pub(crate) fn into_facets(self) -> Vec<(String, Facet)> {
        self.facets
    }
}

/// An extension module. Every method is a factory for one extension point
/// and receives the job context the registry is being built for.
///
/// Factories must be idempotent and must not do anything besides
/// constructing handlers.
pub trait EventHandlerFactory: Send + Sync {
    /// Name of the module in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handlers offered every plan node, for inputs.
    fn input_visitors(&self, _context: &LineageContext) -> Vec<InputVisitor> {
        Vec::new()
    }

    /// Handlers offered the plan root, for outputs.
    fn output_visitors(&self, _context: &LineageContext) -> Vec<OutputVisitor> {
        Vec::new()
    }

    /// Builders of input datasets from host objects.
    fn input_builders(&self, _context: &LineageContext) -> Vec<InputBuilder> {
        Vec::new()
    }

    /// Builders of output datasets from host objects.
    fn output_builders(&self, _context: &LineageContext) -> Vec<OutputBuilder> {
        Vec::new()
    }

    /// Facet builders for the side facets of every input.
    fn input_dataset_facet_builders(&self, _context: &LineageContext) -> Vec<FacetBuilderRef> {
        Vec::new()
    }

    /// Facet builders for the side facets of every output.
    fn output_dataset_facet_builders(&self, _context: &LineageContext) -> Vec<FacetBuilderRef> {
        Vec::new()
    }

    /// Facet builders for every input and output dataset.
    fn dataset_facet_builders(&self, _context: &LineageContext) -> Vec<FacetBuilderRef> {
        Vec::new()
    }

    /// Facet builders for the run.
    fn run_facet_builders(&self, _context: &LineageContext) -> Vec<FacetBuilderRef> {
        Vec::new()
    }

    /// Facet builders for the job.
    fn job_facet_builders(&self, _context: &LineageContext) -> Vec<FacetBuilderRef> {
        Vec::new()
    }
}

/// Read-only view handed to every handler invocation: the job context and
/// the registry it was assembled into.
#[derive(Clone, Copy)]
pub struct VisitContext<'a> {
    context: &'a LineageContext,
    registry: &'a VisitorRegistry,
}

impl<'a> VisitContext<'a> {
    /// A view over `context` and the `registry` built for it.
    pub fn new(context: &'a LineageContext, registry: &'a VisitorRegistry) -> Self {
        Self { context, registry }
    }

    /// The job context.
    pub fn context(&self) -> &'a LineageContext {
        self.context
    }

    /// The registry being dispatched.
    pub fn registry(&self) -> &'a VisitorRegistry {
        self.registry
    }

    /// Agent configuration.
    pub fn config(&self) -> &'a LineageConfig {
        self.context.config()
    }

    /// Tables of the job's session.
    pub fn catalog(&self) -> &'a SessionCatalog {
        self.context.catalog()
    }

    /// Producer URI to stamp on new facets.
    pub fn producer(&self) -> &'a str {
        &self.context.config().producer
    }
}
