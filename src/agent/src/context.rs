use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::SessionCatalog;
use crate::config::LineageConfig;

/// Everything handlers may consult about the job being observed.
///
/// One context exists per job run; the visitor registry is built from it.
#[derive(Debug, Clone)]
pub struct LineageContext {
    config: Arc<LineageConfig>,
    catalog: SessionCatalog,
    job_name: String,
    run_id: Uuid,
}

impl LineageContext {
    /// Context of one run of `job_name`, with a fresh run id.
    pub fn new(
        config: Arc<LineageConfig>,
        catalog: SessionCatalog,
        job_name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            catalog,
            job_name: job_name.into(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Report the run under `run_id` instead.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Agent configuration.
    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Tables of the job's session.
    pub fn catalog(&self) -> &SessionCatalog {
        &self.catalog
    }

    /// Name of the job.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Id shared by every event of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}
