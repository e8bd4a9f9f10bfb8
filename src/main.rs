use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use campaign_tracker::campaign::{execute_batch_upsert, BatchRequest, BatchSummary, CampaignFilter};
use campaign_tracker::config::{Config, ConfigOverrides};
use campaign_tracker::output::csv::campaigns_to_csv;
use campaign_tracker::output::render_json;
use campaign_tracker::output::table::{render_campaign_table, render_summary_table};
use campaign_tracker::server::run_server;
use campaign_tracker::store::campaigns::list_campaigns;
use campaign_tracker::store::Database;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "campaign-tracker",
    about = "Monthly campaign quantity/amount tracking service"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    month: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    village: Option<String>,
    #[arg(long)]
    block: Option<String>,
}

impl From<FilterArgs> for CampaignFilter {
    fn from(value: FilterArgs) -> Self {
        Self {
            month: value.month,
            state: value.state,
            district: value.district,
            village: value.village,
            block: value.block,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the tables if they do not exist yet.
    Migrate,
    /// Submit a batch JSON file, shaped like the `PUT /update` body.
    Upsert {
        #[arg(long)]
        file: PathBuf,
    },
    Report {
        #[command(flatten)]
        filter: FilterArgs,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply_overrides(ConfigOverrides {
        host,
        port,
        db_path: cli.db.clone(),
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }

    let db_path = config.resolved_db_path();
    let db = Database::open(&db_path, config.busy_timeout())?;

    match cli.command {
        Commands::Serve { .. } => {
            let bind = config.bind_address();
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            info!("using database {}", db_path.display());
            run_server(config, db, addr).await?;
        }
        Commands::Migrate => {
            info!("schema ready at {}", db_path.display());
        }
        Commands::Upsert { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed reading batch file: {}", file.display()))?;
            let request: BatchRequest = serde_json::from_str(&raw)
                .with_context(|| format!("failed parsing batch file: {}", file.display()))?;
            let batch = request.into_batch(config.campaigns.require_user_id)?;
            let summary = db.with_conn(|conn| execute_batch_upsert(conn, &batch))??;
            print_summary(&summary, cli.output)?;
        }
        Commands::Report { filter } => {
            let filter = CampaignFilter::from(filter);
            let records = db.with_conn(|conn| list_campaigns(conn, &filter))??;
            match cli.output {
                OutputFormat::Table => println!("{}", render_campaign_table(&records)),
                OutputFormat::Json => println!("{}", render_json(&records)?),
                OutputFormat::Csv => print!("{}", campaigns_to_csv(&records)?),
            }
        }
        Commands::Config { .. } => unreachable!("config command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(
    init: bool,
    show: bool,
    config: &Config,
    config_path: &PathBuf,
) -> Result<()> {
    if init {
        if config_path.exists() {
            warn!("overwriting existing config at {}", config_path.display());
        }
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_summary_table(summary)),
        OutputFormat::Json => println!("{}", render_json(summary)?),
        OutputFormat::Csv => {
            warn!("CSV output for upsert not implemented, using JSON");
            println!("{}", render_json(summary)?);
        }
    }
    Ok(())
}
