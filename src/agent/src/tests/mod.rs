use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::common::TableReference;
use datafusion::datasource::{MemTable, TableProvider, provider_as_source};
use datafusion::logical_expr::{LogicalPlan, LogicalPlanBuilder};
use datafusion::prelude::SessionContext;

use crate::api::VisitContext;
use crate::catalog::SessionCatalog;
use crate::config::LineageConfig;
use crate::context::LineageContext;
use crate::registry::VisitorRegistry;


pub(crate) fn test_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, true),
    ]))
}

pub(crate) fn mem_table(schema: SchemaRef) -> Arc<dyn TableProvider> {
    Arc::new(MemTable::try_new(schema, vec![vec![]]).unwrap())
}

pub(crate) fn scan(name: &str, provider: Arc<dyn TableProvider>) -> LogicalPlan {
    LogicalPlanBuilder::scan(name, provider_as_source(provider), None)
        .unwrap()
        .build()
        .unwrap()
}

pub(crate) fn test_context() -> LineageContext {
    LineageContext::new(
        Arc::new(LineageConfig::default()),
        SessionCatalog::default(),
        "test_job",
    )
}

/// A session with one empty memory table of [`test_schema`] per name.
pub(crate) fn session_with_tables(names: &[&str]) -> SessionContext {
    let ctx = SessionContext::new();
    for name in names {
        ctx.register_table(*name, mem_table(test_schema())).unwrap();
    }
    ctx
}

pub(crate) async fn plan_sql(ctx: &SessionContext, sql: &str) -> LogicalPlan {
    ctx.state().create_logical_plan(sql).await.unwrap()
}

/// A job context and the built-in registry for it.
pub(crate) struct Fixture {
    context: LineageContext,
    registry: VisitorRegistry,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new(SessionCatalog::default())
    }
}

impl Fixture {
    pub(crate) fn new(catalog: SessionCatalog) -> Self {
        Self::build(LineageConfig::default(), catalog)
    }

    pub(crate) fn with_config(config: LineageConfig) -> Self {
        Self::build(config, SessionCatalog::default())
    }

    pub(crate) async fn snapshot(ctx: &SessionContext) -> Self {
        Self::new(SessionCatalog::snapshot(ctx).await.unwrap())
    }

    fn build(config: LineageConfig, catalog: SessionCatalog) -> Self {
        let context = LineageContext::new(Arc::new(config), catalog, "test_job");
        let registry = VisitorRegistry::build(&context, &[]);
        Self { context, registry }
    }

    pub(crate) fn visit_context(&self) -> VisitContext<'_> {
        VisitContext::new(&self.context, &self.registry)
    }

    pub(crate) fn catalog(&self) -> &SessionCatalog {
        self.context.catalog()
    }

    pub(crate) fn catalog_scan(&self, table: &str) -> LogicalPlan {
        self.catalog()
            .relation(&TableReference::bare(table))
            .unwrap()
            .unwrap()
    }
}
