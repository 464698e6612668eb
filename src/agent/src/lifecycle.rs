//! Job lifecycle tracking and event assembly.

use std::any::Any;
use std::error::Error;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use datafusion::common::tree_node::TreeNodeRecursion;
use datafusion::error::{DataFusionError, Result};
use datafusion::logical_expr::LogicalPlan;
use lineage_common::facet::merge_into;
use lineage_common::{Dataset, EventType, Facets, Job, LineageEvent, Run};
use log::{debug, info, warn};

use crate::api::{FacetInput, VisitContext};
use crate::context::LineageContext;
use crate::dispatch::{build_all, collect_inputs, collect_outputs, dedupe};
use crate::emitter::LineageEmitter;
use crate::facets::aggregate;
use crate::registry::VisitorRegistry;

/// Where a job run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// The host accepted the job.
    Submitted,
    /// The job is executing.
    Running,
    /// The job finished successfully.
    Completed,
    /// The job stopped with a fault.
    Failed,
}

impl JobState {
    /// Completed or failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// The event type reported for this state.
    pub fn event_type(self) -> EventType {
        match self {
            JobState::Submitted => EventType::Start,
            JobState::Running => EventType::Running,
            JobState::Completed => EventType::Complete,
            JobState::Failed => EventType::Fail,
        }
    }

    /// Whether a job in `from` (or not yet seen, `None`) may report `to`.
    pub fn can_follow(from: Option<JobState>, to: JobState) -> bool {
        match from {
            None => true,
            Some(JobState::Submitted) => to != JobState::Submitted,
            Some(JobState::Running) => to != JobState::Submitted,
            Some(JobState::Completed | JobState::Failed) => false,
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Why a job failed, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFault {
    message: String,
    stack_trace: Option<String>,
}

impl JobFault {
    /// A fault described by `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    /// A fault from `err`; its chain of sources becomes the stack trace.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        let fault = Self::new(err.to_string());
        if causes.is_empty() {
            fault
        } else {
            fault.with_stack_trace(causes.join("\n"))
        }
    }

    /// Attach a stack trace.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Description of the fault.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stack trace, when known.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

/// Write statistics reported by the host when a job completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobMetrics {
    /// Rows written by the job.
    pub rows_written: Option<u64>,
    /// Bytes written by the job.
    pub bytes_written: Option<u64>,
}

/// A lifecycle notification from the host, with the plan snapshot the job
/// was running at that point.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    state: JobState,
    event_time: DateTime<Utc>,
    plan: Option<Arc<LogicalPlan>>,
    fault: Option<JobFault>,
    metrics: Option<JobMetrics>,
    sql: Option<String>,
    objects: Vec<Arc<dyn Any + Send + Sync>>,
}

impl LifecycleEvent {
    /// An event for `state` at the current time.
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            event_time: Utc::now(),
            plan: None,
            fault: None,
            metrics: None,
            sql: None,
            objects: Vec::new(),
        }
    }

    /// When the transition happened.
    pub fn with_event_time(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = event_time;
        self
    }

    /// Plan snapshot at the transition.
    pub fn with_plan(mut self, plan: impl Into<Arc<LogicalPlan>>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    /// Why the job failed.
    pub fn with_fault(mut self, fault: JobFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Write statistics of the job.
    pub fn with_metrics(mut self, metrics: JobMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Statement text the job runs.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach a host object for dataset and facet builders.
    pub fn with_object(mut self, object: Arc<dyn Any + Send + Sync>) -> Self {
        self.objects.push(object);
        self
    }

    /// The state reported.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// When the transition happened.
    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    /// Plan snapshot, if any.
    pub fn plan(&self) -> Option<&LogicalPlan> {
        self.plan.as_deref()
    }

    /// The fault of a failed job.
    pub fn fault(&self) -> Option<&JobFault> {
        self.fault.as_ref()
    }

    /// Write statistics, if reported.
    pub fn metrics(&self) -> Option<&JobMetrics> {
        self.metrics.as_ref()
    }

    /// Statement text, if known.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Host objects attached to the event.
    pub fn objects(&self) -> &[Arc<dyn Any + Send + Sync>] {
        &self.objects
    }
}

/// Lineage of one job run: validates lifecycle transitions and turns each
/// into a [`LineageEvent`].
pub struct JobLineage {
    context: Arc<LineageContext>,
    registry: Arc<VisitorRegistry>,
    emitter: Option<Arc<dyn LineageEmitter>>,
    state: Mutex<Option<JobState>>,
}

impl JobLineage {
    /// Track the run described by `context` with its `registry`.
    pub fn new(context: Arc<LineageContext>, registry: Arc<VisitorRegistry>) -> Self {
        Self {
            context,
            registry,
            emitter: None,
            state: Mutex::new(None),
        }
    }

    /// Also send every event to `emitter`.
    pub fn with_emitter(mut self, emitter: Arc<dyn LineageEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// The job context.
    pub fn context(&self) -> &LineageContext {
        &self.context
    }

    /// The registry handlers are dispatched from.
    pub fn registry(&self) -> &VisitorRegistry {
        &self.registry
    }

    /// The last state reported, `None` before the first event.
    pub fn state(&self) -> Option<JobState> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the transition described by `event`, then assemble and emit
    /// its lineage event.
    ///
    /// Fails only when the transition is not allowed from the current
    /// state; the job state is left unchanged in that case.
    pub fn on_event(&self, event: &LifecycleEvent) -> Result<LineageEvent> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !JobState::can_follow(*state, event.state()) {
                return Err(DataFusionError::Execution(format!(
                    "job {} cannot go from {} to {}",
                    self.context.job_name(),
                    match *state {
                        Some(current) => current.to_string(),
                        None => "nothing".to_string(),
                    },
                    event.state()
                )));
            }
            *state = Some(event.state());
        }

        let lineage = self.build_event(event);
        info!(
            "job {} {}: {} inputs, {} outputs",
            self.context.job_name(),
            event.state(),
            lineage.inputs().len(),
            lineage.outputs().len()
        );
        if let Some(emitter) = &self.emitter {
            emitter.emit(&lineage);
        }
        Ok(lineage)
    }

    /// Report that the job was submitted with `plan`.
    pub fn on_submitted(&self, plan: LogicalPlan) -> Result<LineageEvent> {
        self.on_event(&LifecycleEvent::new(JobState::Submitted).with_plan(plan))
    }

    /// Report progress of the running job.
    pub fn on_running(&self, plan: LogicalPlan) -> Result<LineageEvent> {
        self.on_event(&LifecycleEvent::new(JobState::Running).with_plan(plan))
    }

    /// Report that the job completed.
    pub fn on_completed(&self, plan: LogicalPlan) -> Result<LineageEvent> {
        self.on_event(&LifecycleEvent::new(JobState::Completed).with_plan(plan))
    }

    /// Report that the job failed, with its fault when known.
    pub fn on_failed(&self, plan: LogicalPlan, fault: Option<JobFault>) -> Result<LineageEvent> {
        let mut event = LifecycleEvent::new(JobState::Failed).with_plan(plan);
        if let Some(fault) = fault {
            event = event.with_fault(fault);
        }
        self.on_event(&event)
    }

    /// Assemble the lineage event for `event` without touching the job
    /// state.
    pub fn build_event(&self, event: &LifecycleEvent) -> LineageEvent {
        let cx = VisitContext::new(&self.context, &self.registry);
        let registry = &*self.registry;

        let (mut inputs, mut outputs) = match event.plan() {
            Some(plan) => (collect_inputs(&cx, plan), collect_outputs(&cx, plan)),
            None => {
                debug!("{} event without a plan", event.state());
                (Vec::new(), Vec::new())
            }
        };
        for object in event.objects() {
            inputs.extend(build_all(&cx, registry.input_builders(), object.as_ref()));
            outputs.extend(build_all(&cx, registry.output_builders(), object.as_ref()));
        }

        let nodes = event.plan().map(plan_nodes).unwrap_or_default();
        let mut facet_inputs = vec![FacetInput::Event(event)];
        facet_inputs.extend(nodes.iter().map(FacetInput::Plan));
        facet_inputs.extend(
            event
                .objects()
                .iter()
                .map(|object| FacetInput::Object(object.as_ref())),
        );

        let dataset_facets = aggregate(&cx, registry.dataset_facet_builders(), &facet_inputs);
        let input_facets = aggregate(&cx, registry.input_dataset_facet_builders(), &facet_inputs);
        let output_facets = aggregate(&cx, registry.output_dataset_facet_builders(), &facet_inputs);
        let inputs = dedupe(inputs)
            .into_iter()
            .map(|dataset| decorate(dataset, &dataset_facets, &input_facets))
            .collect();
        let outputs = dedupe(outputs)
            .into_iter()
            .map(|dataset| decorate(dataset, &dataset_facets, &output_facets))
            .collect();

        let config = self.context.config();
        let run = Run::new(
            self.context.run_id(),
            aggregate(&cx, registry.run_facet_builders(), &facet_inputs),
        );
        let job = Job::new(
            config.job_namespace.clone(),
            self.context.job_name(),
            aggregate(&cx, registry.job_facet_builders(), &facet_inputs),
        );
        LineageEvent::new(
            event.state().event_type(),
            event.event_time(),
            config.producer.clone(),
            run,
            job,
            inputs,
            outputs,
        )
    }
}

/// Every node of `plan`, subqueries included, in walk order with the root
/// first.
fn plan_nodes(plan: &LogicalPlan) -> Vec<LogicalPlan> {
    let mut nodes = Vec::new();
    let walked = plan.apply_with_subqueries(|node| {
        nodes.push(node.clone());
        Ok(TreeNodeRecursion::Continue)
    });
    if let Err(err) = walked {
        warn!("failed to walk plan for facets: {err}");
    }
    nodes
}

fn decorate<D: Dataset>(mut dataset: D, dataset_facets: &Facets, side_facets: &Facets) -> D {
    merge_into(dataset.facets_mut(), dataset_facets.clone());
    merge_into(dataset.side_facets_mut(), side_facets.clone());
    dataset
}
