#![warn(missing_docs)]
//! Lineage extraction for DataFusion jobs.
//!
//! A [`LineageAgent`] is created once per process. For every job the host
//! calls [`LineageAgent::start_job`] and reports lifecycle transitions to
//! the returned [`JobLineage`], which walks the job's logical plan with the
//! registered pattern handlers and assembles one [`LineageEvent`] per
//! transition.
//!
//! ```ignore
//! use lineage_agent::{LineageAgent, LogEmitter};
//! let agent = LineageAgent::builder()
//!     .with_emitter(Arc::new(LogEmitter))
//!     .build();
//! let job = agent.start_session_job("nightly_rollup", &ctx).await?;
//! let plan = ctx.state().create_logical_plan(sql).await?;
//! job.on_submitted(plan.clone())?;
//! ctx.execute_logical_plan(plan.clone()).await?.collect().await?;
//! job.on_completed(plan)?;
//! ```
use std::error::Error;
use std::sync::Arc;

use datafusion::error::{DataFusionError, Result};
use datafusion::prelude::SessionContext;
use log::info;

mod api;
pub mod catalog;
mod config;
mod context;
pub mod dispatch;
mod emitter;
pub mod facets;
mod lifecycle;
mod loader;
pub mod plan;
mod registry;

#[cfg(test)]
mod tests;

pub use api::{
    CustomFacetBuilder, DatasetBuilder, EventHandlerFactory, FacetBuilderRef, FacetInput,
    FacetSink, InputBuilder, InputVisitor, OutputBuilder, OutputVisitor, QueryPlanVisitor,
    VisitContext,
};
pub use catalog::SessionCatalog;
pub use config::{DEFAULT_PRODUCER, LineageConfig, parse_facet_list};
pub use context::LineageContext;
pub use emitter::{LineageEmitter, LogEmitter, MemoryEmitter};
pub use lifecycle::{JobFault, JobLineage, JobMetrics, JobState, LifecycleEvent};
pub use lineage_common::LineageEvent;
pub use loader::{ExtensionLoader, ExtensionProvider, register_extension};
pub use registry::{DispatchDiagnostics, VisitorRegistry};

pub(crate) fn to_df_err<E: Error + Send + Sync + 'static>(err: E) -> DataFusionError {
    DataFusionError::External(Box::new(err))
}

/// Builder for a [`LineageAgent`].
pub struct LineageAgentBuilder {
    config: LineageConfig,
    loader: ExtensionLoader,
    emitter: Option<Arc<dyn LineageEmitter>>,
}

impl Default for LineageAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineageAgentBuilder {
    /// A builder with the default configuration, the registered extensions
    /// and no emitter.
    pub fn new() -> Self {
        Self {
            config: LineageConfig::default(),
            loader: ExtensionLoader::new(),
            emitter: None,
        }
    }

    /// Configuration shared by every job.
    pub fn with_config(mut self, config: LineageConfig) -> Self {
        self.config = config;
        self
    }

    /// Loader that discovers the extension modules.
    pub fn with_loader(mut self, loader: ExtensionLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Add one extension provider to the loader.
    pub fn with_extension(mut self, provider: ExtensionProvider) -> Self {
        self.loader = self.loader.with_provider(provider);
        self
    }

    /// Where every assembled event is sent, in addition to being returned.
    pub fn with_emitter(mut self, emitter: Arc<dyn LineageEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Discover the extension modules and build the agent.
    pub fn build(self) -> LineageAgent {
        let modules = self.loader.discover();
        LineageAgent {
            config: Arc::new(self.config),
            modules: modules.into(),
            emitter: self.emitter,
        }
    }
}

/// Process-wide lineage agent: configuration and extension modules shared by
/// every job.
pub struct LineageAgent {
    config: Arc<LineageConfig>,
    modules: Arc<[Box<dyn EventHandlerFactory>]>,
    emitter: Option<Arc<dyn LineageEmitter>>,
}

impl LineageAgent {
    /// A builder with the default configuration.
    pub fn builder() -> LineageAgentBuilder {
        LineageAgentBuilder::new()
    }

    /// The agent configuration.
    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Names of the loaded extension modules, in load order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|module| module.name()).collect()
    }

    /// Start tracking a job that resolves tables through `catalog`.
    pub fn start_job(&self, job_name: impl Into<String>, catalog: SessionCatalog) -> JobLineage {
        let context = LineageContext::new(Arc::clone(&self.config), catalog, job_name);
        let registry = VisitorRegistry::build(&context, &self.modules);
        info!(
            "tracking job {} as run {}",
            context.job_name(),
            context.run_id()
        );
        let job = JobLineage::new(Arc::new(context), Arc::new(registry));
        match &self.emitter {
            Some(emitter) => job.with_emitter(Arc::clone(emitter)),
            None => job,
        }
    }

    /// Start tracking a job on `ctx`, snapshotting its catalog.
    pub async fn start_session_job(
        &self,
        job_name: impl Into<String>,
        ctx: &SessionContext,
    ) -> Result<JobLineage> {
        let catalog = SessionCatalog::snapshot(ctx).await?;
        Ok(self.start_job(job_name, catalog))
    }
}
