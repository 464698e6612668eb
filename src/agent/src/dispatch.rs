//! Applying handler chains to plan nodes and attached objects.
//!
//! Every handler invocation is isolated: an error or a panic inside one
//! handler is logged and counted, and the handler contributes nothing.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use datafusion::common::tree_node::TreeNodeRecursion;
use datafusion::error::Result;
use datafusion::logical_expr::LogicalPlan;
use lineage_common::{Dataset, DatasetIdentifier, InputDataset, OutputDataset};
use log::{debug, warn};

use crate::api::{DatasetBuilder, QueryPlanVisitor, VisitContext};

/// Run `f`, turning an error or a panic into `None` with a warning.
pub fn isolate<T>(kind: &str, name: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            warn!("{kind} {name} failed: {err}");
            None
        }
        Err(payload) => {
            warn!("{kind} {name} panicked: {}", panic_message(payload.as_ref()));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn accepts<D>(visitor: &Arc<dyn QueryPlanVisitor<D>>, plan: &LogicalPlan) -> bool {
    isolate("visitor", visitor.name(), || Ok(visitor.is_defined_at(plan))).unwrap_or(false)
}

/// Apply the first handler of `visitors` that accepts `plan`.
///
/// Later handlers are not consulted, even when the chosen one returns
/// nothing. When no handler accepts the node the result is empty and the
/// miss is recorded.
pub fn apply_first<D>(
    cx: &VisitContext<'_>,
    visitors: &[Arc<dyn QueryPlanVisitor<D>>],
    plan: &LogicalPlan,
) -> Vec<D> {
    let diagnostics = cx.registry().diagnostics();
    let Some(visitor) = visitors.iter().find(|visitor| accepts(visitor, plan)) else {
        diagnostics.record_unmatched();
        debug!("no visitor for {}", plan.display());
        return Vec::new();
    };
    isolate("visitor", visitor.name(), || visitor.apply(cx, plan)).unwrap_or_else(|| {
        diagnostics.record_failure();
        Vec::new()
    })
}

/// Apply every handler of `visitors` that accepts `plan`, concatenating
/// their results in handler order.
pub fn apply_all<D>(
    cx: &VisitContext<'_>,
    visitors: &[Arc<dyn QueryPlanVisitor<D>>],
    plan: &LogicalPlan,
) -> Vec<D> {
    let diagnostics = cx.registry().diagnostics();
    visitors
        .iter()
        .filter(|visitor| accepts(visitor, plan))
        .flat_map(|visitor| {
            isolate("visitor", visitor.name(), || visitor.apply(cx, plan)).unwrap_or_else(|| {
                diagnostics.record_failure();
                Vec::new()
            })
        })
        .collect()
}

/// Apply every builder of `builders` that accepts `object`.
pub fn build_all<D>(
    cx: &VisitContext<'_>,
    builders: &[Arc<dyn DatasetBuilder<D>>],
    object: &(dyn Any + Send + Sync),
) -> Vec<D> {
    let diagnostics = cx.registry().diagnostics();
    builders
        .iter()
        .filter(|builder| {
            isolate("dataset builder", builder.name(), || Ok(builder.is_defined_at(object)))
                .unwrap_or(false)
        })
        .flat_map(|builder| {
            isolate("dataset builder", builder.name(), || builder.build(cx, object))
                .unwrap_or_else(|| {
                    diagnostics.record_failure();
                    Vec::new()
                })
        })
        .collect()
}

/// Datasets read anywhere in `plan`, subqueries included. Every node is
/// offered to the input chain on its own.
pub fn collect_inputs(cx: &VisitContext<'_>, plan: &LogicalPlan) -> Vec<InputDataset> {
    let visitors = cx.registry().input_visitors();
    let mut datasets = Vec::new();
    let walked = plan.apply_with_subqueries(|node| {
        datasets.extend(apply_first(cx, visitors, node));
        Ok(TreeNodeRecursion::Continue)
    });
    if let Err(err) = walked {
        warn!("failed to walk plan for inputs: {err}");
    }
    dedupe(datasets)
}

/// Datasets written by `plan`, as described by the output chain applied to
/// the root node only.
pub fn collect_outputs(cx: &VisitContext<'_>, plan: &LogicalPlan) -> Vec<OutputDataset> {
    dedupe(apply_first(cx, cx.registry().output_visitors(), plan))
}

/// Fold datasets sharing an identifier into the first occurrence, keeping
/// first-seen order.
pub fn dedupe<D: Dataset>(datasets: Vec<D>) -> Vec<D> {
    let mut positions: HashMap<DatasetIdentifier, usize> = HashMap::new();
    let mut unique: Vec<D> = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        match positions.get(dataset.identifier()) {
            Some(&position) => unique[position].absorb(dataset),
            None => {
                positions.insert(dataset.identifier().clone(), unique.len());
                unique.push(dataset);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use datafusion::common::plan_err;
    use datafusion::logical_expr::LogicalPlanBuilder;
    use lineage_common::DatasetIdentifier;

    use super::*;
    use crate::tests::{Fixture, mem_table, scan, test_schema};

    /// Accepts every node and returns one dataset named after itself.
    struct Named(&'static str);

    impl QueryPlanVisitor<InputDataset> for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn is_defined_at(&self, _plan: &LogicalPlan) -> bool {
            true
        }

        fn apply(&self, _cx: &VisitContext<'_>, _plan: &LogicalPlan) -> Result<Vec<InputDataset>> {
            Ok(vec![InputDataset::new(DatasetIdentifier::new("test", self.0), None)])
        }
    }

    struct Declines;

    impl QueryPlanVisitor<InputDataset> for Declines {
        fn name(&self) -> &str {
            "declines"
        }

        fn is_defined_at(&self, _plan: &LogicalPlan) -> bool {
            false
        }

        fn apply(&self, _cx: &VisitContext<'_>, _plan: &LogicalPlan) -> Result<Vec<InputDataset>> {
            unreachable!("never accepted")
        }
    }

    struct Fails;

    impl QueryPlanVisitor<InputDataset> for Fails {
        fn name(&self) -> &str {
            "fails"
        }

        fn is_defined_at(&self, _plan: &LogicalPlan) -> bool {
            true
        }

        fn apply(&self, _cx: &VisitContext<'_>, _plan: &LogicalPlan) -> Result<Vec<InputDataset>> {
            plan_err!("cannot describe node")
        }
    }

    struct Panics;

    impl QueryPlanVisitor<InputDataset> for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn is_defined_at(&self, _plan: &LogicalPlan) -> bool {
            true
        }

        fn apply(&self, _cx: &VisitContext<'_>, _plan: &LogicalPlan) -> Result<Vec<InputDataset>> {
            panic!("handler bug")
        }
    }

    fn names(datasets: &[InputDataset]) -> Vec<&str> {
        datasets.iter().map(|d| d.identifier().name()).collect()
    }

    fn empty_plan() -> LogicalPlan {
        LogicalPlanBuilder::empty(false).build().unwrap()
    }

    #[test]
    fn first_accepting_handler_wins() {
        let fixture = Fixture::default();
        let cx = fixture.visit_context();
        let visitors: Vec<Arc<dyn QueryPlanVisitor<InputDataset>>> =
            vec![Arc::new(Declines), Arc::new(Named("a")), Arc::new(Named("b"))];

        let datasets = apply_first(&cx, &visitors, &empty_plan());
        assert_eq!(names(&datasets), vec!["a"]);
    }

    #[test]
    fn apply_all_keeps_handler_order() {
        let fixture = Fixture::default();
        let cx = fixture.visit_context();
        let visitors: Vec<Arc<dyn QueryPlanVisitor<InputDataset>>> =
            vec![Arc::new(Named("a")), Arc::new(Declines), Arc::new(Named("b"))];

        let datasets = apply_all(&cx, &visitors, &empty_plan());
        assert_eq!(names(&datasets), vec!["a", "b"]);
    }

    #[test]
    fn unmatched_node_is_counted() {
        let fixture = Fixture::default();
        let cx = fixture.visit_context();
        let visitors: Vec<Arc<dyn QueryPlanVisitor<InputDataset>>> = vec![Arc::new(Declines)];

        assert!(apply_first(&cx, &visitors, &empty_plan()).is_empty());
        assert!(apply_all(&cx, &visitors, &empty_plan()).is_empty());
        assert_eq!(cx.registry().diagnostics().unmatched(), 1);
    }

    #[test]
    fn failing_handlers_contribute_nothing() {
        let fixture = Fixture::default();
        let cx = fixture.visit_context();

        let first: Vec<Arc<dyn QueryPlanVisitor<InputDataset>>> =
            vec![Arc::new(Fails), Arc::new(Named("a"))];
        assert!(apply_first(&cx, &first, &empty_plan()).is_empty());

        let all: Vec<Arc<dyn QueryPlanVisitor<InputDataset>>> = vec![
            Arc::new(Named("a")),
            Arc::new(Fails),
            Arc::new(Panics),
            Arc::new(Named("b")),
        ];
        assert_eq!(names(&apply_all(&cx, &all, &empty_plan())), vec!["a", "b"]);
        assert_eq!(cx.registry().diagnostics().failed(), 3);
    }

    #[test]
    fn inputs_of_self_join_are_deduplicated() {
        let fixture = Fixture::default();
        let cx = fixture.visit_context();
        let orders = mem_table(test_schema());
        let plan = LogicalPlanBuilder::from(scan("orders", Arc::clone(&orders)))
            .union(scan("orders", orders))
            .unwrap()
            .build()
            .unwrap();

        let inputs = collect_inputs(&cx, &plan);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].identifier().name(), "datafusion.public.orders");
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let datasets = ["b", "a", "b", "c", "a"]
            .into_iter()
            .map(|name| InputDataset::new(DatasetIdentifier::new("test", name), None))
            .collect();
        assert_eq!(names(&dedupe(datasets)), vec!["b", "a", "c"]);
    }
}
