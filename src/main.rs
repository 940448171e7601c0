use askdb::config::Config;
use askdb::guard;
use askdb::llm::LlmClient;
use askdb::pipeline::{Pipeline, PipelineOptions, PipelineResponse};
use askdb::result::ResultSet;
use askdb::schema::SchemaDescriptor;
use askdb::server::{self, AppState};
use askdb::store::Store;
use askdb::synthesizer::CandidateQuery;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Ask questions about the products table in plain English")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (or set BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,

        /// SQLite file, or :memory: (or set DATABASE_PATH)
        #[arg(short, long)]
        database: Option<String>,
    },
    /// Answer a single question and print the result
    Ask {
        /// The question in natural language
        question: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// SQLite file, or :memory: (or set DATABASE_PATH)
        #[arg(short, long)]
        database: Option<String>,
    },
    /// Run the query guard on a SQL statement without calling the LLM
    Check {
        /// SQL text to validate
        sql: String,
    },
    /// Print the schema descriptor
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    let schema = Arc::new(SchemaDescriptor::products());

    match args.command {
        Commands::Serve { bind, database } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(database) = database {
                config.database_path = database;
            }
            serve(config, schema).await
        }
        Commands::Ask { question, format, database } => {
            if let Some(database) = database {
                config.database_path = database;
            }
            ask(config, schema, &question, format).await
        }
        Commands::Check { sql } => check(&config, &schema, &sql),
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(schema.as_ref())?);
            Ok(())
        }
    }
}

fn build_pipeline(config: &Config, schema: Arc<SchemaDescriptor>) -> Result<Pipeline> {
    config.require_api_key()?;
    let llm = LlmClient::new(&config.llm)?;
    info!("Using model {}", llm.model());

    let store = Store::open(&config.database_path, &schema)
        .with_context(|| format!("Failed to open store at {}", config.database_path))?
        .with_query_timeout(config.query_timeout);

    Ok(Pipeline::new(
        Arc::new(llm),
        schema,
        store,
        PipelineOptions {
            guard: config.guard,
            summary_max_rows: config.summary_max_rows,
        },
    ))
}

async fn serve(config: Config, schema: Arc<SchemaDescriptor>) -> Result<()> {
    let pipeline = build_pipeline(&config, schema.clone())?;
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    let state = Arc::new(AppState { pipeline, schema });
    server::serve(listener, state).await?;
    Ok(())
}

async fn ask(config: Config, schema: Arc<SchemaDescriptor>, question: &str, format: OutputFormat) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let pipeline = build_pipeline(&config, schema)?;
    let response = pipeline.run(question.trim()).await;

    match (&response, format) {
        (PipelineResponse::Success(success), OutputFormat::Csv) => {
            write_csv(&success.rows)?;
            if !success.explanation.is_empty() {
                eprintln!("{}", success.explanation);
            }
        }
        _ => println!("{}", serde_json::to_string_pretty(&response)?),
    }

    if !response.is_success() {
        bail!("pipeline failed with status {}", response.status_code());
    }
    Ok(())
}

fn check(config: &Config, schema: &SchemaDescriptor, sql: &str) -> Result<()> {
    let candidate = CandidateQuery::new(sql);
    match guard::validate(&candidate, schema, &config.guard) {
        Ok(validated) => {
            let verdict = serde_json::json!({
                "accepted": true,
                "sql": validated.sql(),
                "tables": validated.tables(),
            });
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }
        Err(rejection) => {
            let verdict = serde_json::json!({
                "accepted": false,
                "error": rejection.reason(),
                "message": rejection.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            bail!("query rejected: {}", rejection.reason())
        }
    }
}

fn write_csv(rows: &ResultSet) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(rows.columns())?;
    for row in rows.rows() {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
