use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use panel_allocator::allocation::Allocator;
use panel_allocator::calendar::{load_bank_holidays, CalendarSet, SlotGenerator};
use panel_allocator::display::{print_allocation, write_schedule_to_file};
use panel_allocator::writeback::{JsonFileWriteBack, NoWriteBack, WriteBack};
use panel_allocator::{demo, load_roster, web, AllocatorConfig};

#[derive(Parser)]
#[command(name = "panel-allocator")]
#[command(about = "Allocates interviewers to interview panels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Allocator configuration (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate panels for the upcoming slots.
    Allocate {
        /// Roster of interviewers (CSV)
        #[arg(long)]
        roster: PathBuf,
        /// Everybody's calendars and the bookings calendar (JSON)
        #[arg(long)]
        calendars: PathBuf,
        /// gov.uk bank holiday feed (JSON)
        #[arg(long)]
        bank_holidays: Option<PathBuf>,
        /// Date to allocate from, defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Where to write the slot outcomes (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write a plain-text schedule here
        #[arg(long)]
        schedule: Option<PathBuf>,
    },

    /// Serve allocations over HTTP.
    Web {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(long, env = "ADMIN_PASSWORD")]
        admin_password: String,
    },

    /// Allocate a randomly generated roster.
    Demo {
        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Number of people on the roster
        #[arg(short, long, default_value = "30")]
        people: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AllocatorConfig> {
    match path {
        Some(path) => AllocatorConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(AllocatorConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Allocate {
            roster,
            calendars,
            bank_holidays,
            today,
            output,
            schedule,
        } => {
            let roster = load_roster(&roster).with_context(|| format!("loading roster {}", roster.display()))?;
            let calendars =
                CalendarSet::load(&calendars).with_context(|| format!("loading calendars {}", calendars.display()))?;
            let holidays = match bank_holidays {
                Some(path) => load_bank_holidays(&path)
                    .with_context(|| format!("loading bank holidays {}", path.display()))?,
                None => Default::default(),
            };
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            info!(people = roster.len(), %today, "Loaded roster");

            let slots = SlotGenerator::new(today, config.slots.clone(), holidays).generate(calendars.bookings())?;
            let mut sink: Box<dyn WriteBack> = match &output {
                Some(path) => Box::new(JsonFileWriteBack::new(path)),
                None => Box::new(NoWriteBack),
            };
            let allocation = Allocator::new(slots, &roster, &config).allocate(&calendars, sink.as_mut())?;

            print_allocation(&roster, &allocation);
            if let Some(path) = schedule {
                write_schedule_to_file(&roster, &allocation, &path)?;
                println!("Schedule saved to {}", path.display());
            }
        }
        Commands::Web { port, admin_password } => {
            println!("Starting web server on port {}...", port);
            println!("Access the API at http://localhost:{}/api/schedule", port);
            web::start_server(port, admin_password, config).await?;
        }
        Commands::Demo { seed, people } => {
            let today = Utc::now().date_naive();
            let demo = demo::generate(seed, people, today, &config.slots)?;
            info!(seed, people, slots = demo.slots.len(), "Generated demo");
            let allocation = Allocator::new(demo.slots, &demo.roster, &config).allocate(&demo.conflicts, &mut NoWriteBack)?;
            print_allocation(&demo.roster, &allocation);
        }
    }

    Ok(())
}
