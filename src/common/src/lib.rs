#![warn(missing_docs)]
//! Data model shared by the lineage agent and its consumers.
//!
//! A [`LineageEvent`] describes one lifecycle transition of a job run: the
//! datasets it read ([`InputDataset`]), the datasets it wrote
//! ([`OutputDataset`]) and the named [`Facet`]s attached to the run, the job
//! and each dataset.

mod dataset;
mod event;
pub mod facet;
pub mod paths;
mod schema;

pub use dataset::{Dataset, DatasetIdentifier, InputDataset, OutputDataset};
pub use event::{EventType, Job, LineageEvent, Run};
pub use facet::{Facet, Facets, StateChange};
pub use schema::{DatasetSchema, SchemaField};
