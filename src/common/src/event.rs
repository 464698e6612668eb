use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dataset::{InputDataset, OutputDataset};
use crate::facet::Facets;

/// The lifecycle transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// The job was submitted.
    Start,
    /// The job is making progress.
    Running,
    /// The job finished successfully.
    Complete,
    /// The job failed.
    Fail,
}

/// One execution of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    run_id: Uuid,
    facets: Facets,
}

impl Run {
    /// A run identified by `run_id`.
    pub fn new(run_id: Uuid, facets: Facets) -> Self {
        Self { run_id, facets }
    }

    /// Id shared by every event of the run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Facets attached by the builders.
    pub fn facets(&self) -> &Facets {
        &self.facets
    }
}

/// The job a run executes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    namespace: String,
    name: String,
    facets: Facets,
}

impl Job {
    /// A job in `namespace` named `name`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, facets: Facets) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            facets,
        }
    }

    /// Namespace of the job.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the job.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Facets attached by the builders.
    pub fn facets(&self) -> &Facets {
        &self.facets
    }
}

/// The record of one lifecycle transition of a job run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEvent {
    event_type: EventType,
    event_time: DateTime<Utc>,
    producer: String,
    run: Run,
    job: Job,
    inputs: Vec<InputDataset>,
    outputs: Vec<OutputDataset>,
}

impl LineageEvent {
    /// An event of `run` reported by `producer`.
    pub fn new(
        event_type: EventType,
        event_time: DateTime<Utc>,
        producer: impl Into<String>,
        run: Run,
        job: Job,
        inputs: Vec<InputDataset>,
        outputs: Vec<OutputDataset>,
    ) -> Self {
        Self {
            event_type,
            event_time,
            producer: producer.into(),
            run,
            job,
            inputs,
            outputs,
        }
    }

    /// Transition reported.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// When the transition happened.
    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    /// Producer URI of the event.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// The run reported.
    pub fn run(&self) -> &Run {
        &self.run
    }

    /// The job reported.
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Datasets read by the run.
    pub fn inputs(&self) -> &[InputDataset] {
        &self.inputs
    }

    /// Datasets written by the run.
    pub fn outputs(&self) -> &[OutputDataset] {
        &self.outputs
    }

    /// Wire form of the event.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
