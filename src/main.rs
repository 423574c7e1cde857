use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rampart::config::AppConfig;
use rampart::runner::Runner;
use rampart::schedule::Schedule;
use rampart::shutdown::wait_for_shutdown;
use rampart::workload::http::HttpWorkload;

#[derive(Parser)]
#[command(name = "rampart", about = "Staged-concurrency HTTP load generator")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the target URL
    #[arg(long)]
    url: Option<String>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.target.url = url;
    }

    let schedule = Schedule::new(config.load.stages.clone())?;

    tracing::info!(
        url = %config.target.url,
        stages = config.load.stages.len(),
        total_secs = schedule.total_duration().as_secs(),
        "Starting load run"
    );

    let workload = Arc::new(HttpWorkload::new(&config.target)?);
    let runner = Runner::new(workload, schedule, config.load.tick);

    let summary = runner.run_until(wait_for_shutdown()).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.render());
    }

    Ok(())
}
