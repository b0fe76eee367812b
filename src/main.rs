use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logviewer_engine::config::Config;
use logviewer_engine::filter::{combine_filter_flags, parse_query_expression};
use logviewer_engine::models::{FieldValue, Query, Range};
use logviewer_engine::util::time::{parse_absolute_instant, parse_relative_duration};
use logviewer_engine::Engine;

#[derive(Parser)]
#[command(name = "lve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query heterogeneous log backends through one uniform interface")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "logviewer.toml")]
    config: String,

    /// Log level for lve's own diagnostics
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Subcommand)]
enum TopCommand {
    /// Run a query against one or more configured backends.
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },
}

#[derive(Subcommand)]
enum QueryAction {
    /// Fetch or stream log entries.
    Log(QueryArgs),
    /// Discover fields present in matching entries.
    Field(QueryArgs),
    /// Discover distinct values for the given fields.
    Values {
        #[command(flatten)]
        args: QueryArgs,
        /// Fields to collect distinct values for.
        fields: Vec<String>,
    },
}

#[derive(Args, Clone)]
struct QueryArgs {
    /// One or more backend config names.
    #[arg(short = 'i', required = true)]
    names: Vec<String>,

    /// hl-syntax or legacy leaf filter expression; repeatable, combined with AND.
    #[arg(short = 'f')]
    filter_flags: Vec<String>,

    /// Full boolean query expression; overrides `-f` when present.
    #[arg(short = 'q')]
    query_expr: Option<String>,

    #[arg(long)]
    last: Option<String>,

    #[arg(long)]
    gte: Option<String>,

    #[arg(long)]
    lte: Option<String>,

    #[arg(long)]
    size: Option<usize>,

    #[arg(long)]
    follow: bool,

    #[arg(long)]
    json: bool,

    #[arg(long = "page-token")]
    page_token: Option<String>,
}

impl QueryArgs {
    fn range(&self) -> anyhow::Result<Option<Range>> {
        if let Some(last) = &self.last {
            return Ok(Some(Range::Relative(parse_relative_duration(last)?)));
        }
        if self.gte.is_some() || self.lte.is_some() {
            let gte = self.gte.as_deref().map(parse_absolute_instant).transpose()?;
            let lte = self.lte.as_deref().map(parse_absolute_instant).transpose()?;
            return Ok(Some(Range::Absolute { gte, lte }));
        }
        Ok(None)
    }

    fn filter(&self) -> anyhow::Result<Option<logviewer_engine::filter::FilterNode>> {
        if let Some(expr) = &self.query_expr {
            return Ok(Some(parse_query_expression(expr)?));
        }
        if !self.filter_flags.is_empty() {
            return Ok(Some(combine_filter_flags(&self.filter_flags)?));
        }
        Ok(None)
    }

    fn to_query(&self) -> anyhow::Result<Query> {
        let mut query = Query::new();
        query.range = self.range()?;
        query.size = self.size;
        query.follow = self.follow;
        query.filter = self.filter()?;
        query.page_token = self.page_token.clone();
        Ok(query)
    }
}

fn init_tracing(log_level: &str) {
    let filter = format!("logviewer_engine={log_level},lve={log_level}");
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    info!("Starting lve v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let engine = Engine::new(config);

    match run(&engine, cli.command).await {
        Ok(partial_failure) => {
            if partial_failure {
                warn!("one or more sub-sources failed; results may be incomplete");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("query failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` on partial failure (some sub-sources failed, at
/// least one succeeded) — exit code stays 0 per spec §6, with the caller
/// emitting a stderr notice.
async fn run(engine: &Engine, command: TopCommand) -> anyhow::Result<bool> {
    let TopCommand::Query { action } = command;
    match action {
        QueryAction::Log(args) => run_log(engine, &args).await,
        QueryAction::Field(args) => run_field(engine, &args).await,
        QueryAction::Values { args, fields } => run_values(engine, &args, &fields).await,
    }
}

async fn run_log(engine: &Engine, args: &QueryArgs) -> anyhow::Result<bool> {
    let query = args.to_query()?;
    let result = engine.query_many(&args.names, query).await?;
    let partial_failure = result.error_rx.is_some();

    if args.json {
        for entry in &result.initial {
            println!("{}", serde_json::to_string(entry)?);
        }
    } else {
        for entry in &result.initial {
            print_plain(entry);
        }
    }

    if let Some(mut follow_rx) = result.follow_rx {
        while let Some(batch) = follow_rx.recv().await {
            for entry in &batch {
                if args.json {
                    println!("{}", serde_json::to_string(entry)?);
                } else {
                    print_plain(entry);
                }
            }
        }
    }

    if let Some(mut error_rx) = result.error_rx {
        while let Ok(msg) = error_rx.try_recv() {
            warn!("{msg}");
        }
    }

    Ok(partial_failure)
}

fn print_plain(entry: &logviewer_engine::Entry) {
    let ts = entry.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default();
    let level = entry.level.as_deref().unwrap_or("-");
    println!("{ts} [{level}] {}", entry.message);
}

async fn run_field(engine: &Engine, args: &QueryArgs) -> anyhow::Result<bool> {
    let query = args.to_query()?;
    let mut discovered: std::collections::HashMap<String, Vec<String>> = Default::default();
    let mut partial_failure = false;

    for name in &args.names {
        match engine.query(name, query.deep_copy()).await {
            Ok(result) => {
                let field_names: Vec<String> = result.discovered_fields.into_iter().collect();
                let values = logviewer_engine::adapters::values_from_entries(&result.initial, &field_names);
                for (field, observed) in values {
                    let bucket = discovered.entry(field).or_default();
                    for value in observed {
                        if !bucket.contains(&value) {
                            bucket.push(value);
                        }
                    }
                }
            }
            Err(e) => {
                warn!("backend '{name}' failed: {e}");
                partial_failure = true;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&discovered)?);
    Ok(partial_failure)
}

async fn run_values(engine: &Engine, args: &QueryArgs, fields: &[String]) -> anyhow::Result<bool> {
    let query = args.to_query()?;
    let mut merged: std::collections::HashMap<String, Vec<FieldValue>> = Default::default();
    let mut partial_failure = false;

    for name in &args.names {
        match engine.get_field_values(name, query.deep_copy(), fields).await {
            Ok(values) => {
                for (field, observed) in values {
                    let bucket = merged.entry(field).or_default();
                    for value in observed {
                        let value = FieldValue::String(value);
                        if !bucket.contains(&value) {
                            bucket.push(value);
                        }
                    }
                }
            }
            Err(e) => {
                warn!("backend '{name}' failed: {e}");
                partial_failure = true;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(partial_failure)
}
