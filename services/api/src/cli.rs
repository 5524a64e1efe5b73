use crate::infra::{load_capacity, read_history, RecordingNotificationPublisher, SeedFiles};
use crate::server;
use admission_ratings::admission::{
    analyze, ApplicantId, ApplicantSnapshot, BroadcastError, BudgetCapacity, StatusEngine,
};
use admission_ratings::config::AppConfig;
use admission_ratings::error::AppError;
use admission_ratings::telemetry;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Admission Rating Analytics",
    about = "Track competition list ranks, classify applicant standing and broadcast notifications",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a single notification broadcast cycle over seeded data and print its summary
    Broadcast(BroadcastArgs),
    /// Analyze a rank history CSV and optionally classify the enrollment
    Analyze(AnalyzeArgs),
}

/// CSV files used to pre-populate the in-memory stores.
#[derive(Args, Debug, Default)]
pub(crate) struct SeedArgs {
    /// Profiles CSV (user_id,applicant_id,gender,gpa[,exams])
    #[arg(long)]
    pub(crate) profiles: Option<PathBuf>,
    /// Competition snapshot CSV, one row per enrollment
    #[arg(long)]
    pub(crate) applicants: Option<PathBuf>,
    /// Rank observations CSV (applicant_id,direction,rank,date)
    #[arg(long)]
    pub(crate) ratings: Option<PathBuf>,
}

impl SeedArgs {
    pub(crate) fn files(&self) -> SeedFiles<'_> {
        SeedFiles {
            profiles: self.profiles.as_deref(),
            applicants: self.applicants.as_deref(),
            ratings: self.ratings.as_deref(),
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
}

#[derive(Args, Debug)]
pub(crate) struct BroadcastArgs {
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
    /// Override the configured page size
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) page_size: Option<u64>,
}

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Rank history CSV (rank,date)
    #[arg(long)]
    pub(crate) history: PathBuf,
    /// Admission probability of the enrollment; enables status classification
    #[arg(long)]
    pub(crate) probability: Option<f64>,
    /// Current rank (defaults to the latest rank in the history)
    #[arg(long)]
    pub(crate) rank: Option<u32>,
    /// Budget seats for the direction (defaults to the configured capacity table)
    #[arg(long)]
    pub(crate) budget_seats: Option<u32>,
    /// Direction name used for the capacity lookup
    #[arg(long, default_value = "direction")]
    pub(crate) direction: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Broadcast(args) => run_broadcast(args).await,
        Command::Analyze(args) => run_analyze(args),
    }
}

async fn run_broadcast(args: BroadcastArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(page_size) = args.page_size {
        config.broadcast.settings.page_size = page_size as usize;
    }
    telemetry::init(&config.telemetry)?;

    let publisher = RecordingNotificationPublisher::default();
    let components = server::assemble(&config, &args.seed, Arc::new(publisher.clone()))?;
    let (summary, aborted) = match components.orchestrator.broadcast().await {
        Ok(summary) => (summary, None),
        Err(BroadcastError::MissingCapacity { direction, summary }) => (summary, Some(direction)),
        Err(err) => return Err(err.into()),
    };

    println!(
        "{:#}",
        json!({
            "summary": summary,
            "aborted_on_direction": aborted,
            "notifications": publisher.sent(),
        })
    );
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let history = read_history(std::fs::File::open(&args.history)?)?;
    let trajectory = analyze(&history)?;

    let assessment = match args.probability {
        Some(probability) => {
            let capacity = match args.budget_seats {
                Some(seats) => BudgetCapacity::new().with_direction(args.direction.clone(), seats),
                None => load_capacity(&config)?,
            };
            let rank = args
                .rank
                .or_else(|| history.latest().map(|position| position.rank))
                .unwrap_or_default();
            let snapshot = ApplicantSnapshot {
                applicant_id: history
                    .latest()
                    .map(|position| position.applicant_id)
                    .unwrap_or(ApplicantId(0)),
                institute: String::new(),
                direction: args.direction,
                points: 0,
                bonus_points: 0,
                priority: 1,
                probability,
                rank,
                original: true,
            };
            let engine = StatusEngine::new(config.thresholds, Arc::new(capacity));
            Some(engine.assess(&snapshot, &history)?)
        }
        None => None,
    };

    println!(
        "{:#}",
        json!({
            "observations": history.len(),
            "trajectory": trajectory,
            "assessment": assessment,
        })
    );
    Ok(())
}
