use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use datafusion::arrow::array::{Array, UInt64Array};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::Result;
use datafusion::prelude::SessionContext;
use lineage_agent::{
    CustomFacetBuilder, EventHandlerFactory, ExtensionProvider, FacetBuilderRef, FacetInput,
    FacetSink, JobFault, JobMetrics, JobState, LifecycleEvent, LineageAgent, LineageConfig,
    LineageContext, LogEmitter, VisitContext, register_extension,
};
use lineage_common::Facet;
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Statements to run, one job each. Defaults to a short pipeline over a
    /// generated `orders` table.
    #[arg(long)]
    sql: Vec<String>,

    /// Base name of the jobs
    #[arg(long, default_value = "lineage_demo")]
    job_name: String,

    /// Agent configuration as JSON
    #[arg(long)]
    config: Option<String>,

    /// Facets to leave out, e.g. "[sql;datafusion.logicalPlan]"
    #[arg(long)]
    disabled_facets: Option<String>,

    /// Team reported in the `ownership` job facet
    #[arg(long, default_value = "data-platform")]
    owner: String,
}

/// Adds an `ownership` facet to every job.
struct Ownership {
    owner: String,
}

impl EventHandlerFactory for Ownership {
    fn name(&self) -> &str {
        "ownership"
    }

    fn job_facet_builders(&self, _context: &LineageContext) -> Vec<FacetBuilderRef> {
        vec![Arc::new(OwnershipFacetBuilder {
            owner: self.owner.clone(),
        })]
    }
}

struct OwnershipFacetBuilder {
    owner: String,
}

impl CustomFacetBuilder for OwnershipFacetBuilder {
    fn name(&self) -> &str {
        "OwnershipFacetBuilder"
    }

    fn is_defined_at(&self, input: &FacetInput<'_>) -> bool {
        matches!(input, FacetInput::Event(_))
    }

    fn build(
        &self,
        _cx: &VisitContext<'_>,
        _input: &FacetInput<'_>,
        sink: &mut FacetSink,
    ) -> Result<()> {
        let owners = serde_json::json!([{ "name": self.owner, "type": "team" }]);
        let facet = Facet::new(sink.producer(), "OwnershipJobFacet").with_field("owners", owners);
        sink.accept("ownership", facet);
        Ok(())
    }
}

fn default_statements(dir: &Path) -> Vec<String> {
    vec![
        format!(
            "CREATE EXTERNAL TABLE archive (id INT, name VARCHAR) \
             STORED AS CSV LOCATION '{}/archive/'",
            dir.display()
        ),
        "INSERT INTO archive SELECT id, name FROM orders".to_string(),
        "CREATE TABLE order_count AS SELECT count(*) AS n FROM orders".to_string(),
        "SELECT o.name FROM orders o JOIN archive a ON o.id = a.id".to_string(),
        "SELECT * FROM missing_table".to_string(),
    ]
}

/// The row count of a DML result batch.
fn rows_written(batches: &[RecordBatch]) -> Option<u64> {
    let batch = batches.first()?;
    if batch.num_columns() != 1 || batch.schema().field(0).name() != "count" {
        return None;
    }
    batch
        .column(0)
        .as_any()
        .downcast_ref::<UInt64Array>()
        .filter(|counts| !counts.is_empty())
        .map(|counts| counts.value(0))
}

async fn run_job(
    agent: &LineageAgent,
    ctx: &SessionContext,
    job_name: &str,
    sql: &str,
) -> Result<()> {
    let job = agent.start_session_job(job_name, ctx).await?;

    let plan = match ctx.state().create_logical_plan(sql).await {
        Ok(plan) => plan,
        Err(err) => {
            warn!("{job_name}: planning failed: {err}");
            let event = LifecycleEvent::new(JobState::Failed)
                .with_sql(sql)
                .with_fault(JobFault::from_error(&err));
            job.on_event(&event)?;
            return Ok(());
        }
    };

    job.on_event(
        &LifecycleEvent::new(JobState::Submitted)
            .with_plan(plan.clone())
            .with_sql(sql),
    )?;
    job.on_event(&LifecycleEvent::new(JobState::Running).with_plan(plan.clone()))?;

    let result = match ctx.execute_logical_plan(plan.clone()).await {
        Ok(df) => df.collect().await,
        Err(err) => Err(err),
    };
    let event = match result {
        Ok(batches) => LifecycleEvent::new(JobState::Completed).with_metrics(JobMetrics {
            rows_written: rows_written(&batches),
            bytes_written: None,
        }),
        Err(err) => {
            warn!("{job_name}: execution failed: {err}");
            LifecycleEvent::new(JobState::Failed).with_fault(JobFault::from_error(&err))
        }
    };
    job.on_event(&event.with_plan(plan).with_sql(sql))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(json) => LineageConfig::from_json(json)?,
        None => LineageConfig::default(),
    };
    if let Some(facets) = &args.disabled_facets {
        config = config.with_disabled_facets(lineage_agent::parse_facet_list(facets));
    }

    let owner = args.owner.clone();
    register_extension(ExtensionProvider::new("ownership", move || {
        Ok(Box::new(Ownership {
            owner: owner.clone(),
        }))
    }));

    let agent = LineageAgent::builder()
        .with_config(config)
        .with_emitter(Arc::new(LogEmitter))
        .build();
    info!("extension modules: {:?}", agent.module_names());

    let dir = tempfile::tempdir()?;
    let orders = dir.path().join("orders");
    std::fs::create_dir_all(&orders)?;
    std::fs::create_dir_all(dir.path().join("archive"))?;
    std::fs::write(orders.join("part-0.csv"), "id,name\n1,alpha\n2,beta\n3,gamma\n")?;

    let ctx = SessionContext::new();
    ctx.sql(&format!(
        "CREATE EXTERNAL TABLE orders (id INT, name VARCHAR) STORED AS CSV LOCATION '{}/' \
         OPTIONS ('format.has_header' 'true')",
        orders.display()
    ))
    .await?;

    let statements = if args.sql.is_empty() {
        default_statements(dir.path())
    } else {
        args.sql.clone()
    };
    for (index, sql) in statements.iter().enumerate() {
        let job_name = format!("{}_{index}", args.job_name);
        run_job(&agent, &ctx, &job_name, sql).await?;
    }
    Ok(())
}
