use autodj::config::StationConfig;
use autodj::report::{self, ReportFilter};
use autodj::shows::ShowSchedule;
use autodj::station::Station;
use autodj::track::Library;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autodj", about = "Automated radio DJ orchestrator CLI")]
struct Cli {
    /// Path to the station config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator polling loop
    Run,
    /// Run a single DJ cycle immediately, ignoring the signal file
    Cycle {
        /// Listener request text to pass to the brain
        #[arg(long)]
        listener: Option<String>,
    },
    /// Analyze the orchestrator log and rate the DJ's track choices
    Report {
        /// Start time (YYYY-MM-DD [HH:MM[:SS]])
        #[arg(long)]
        from: Option<String>,
        /// End time (YYYY-MM-DD [HH:MM[:SS]])
        #[arg(long)]
        to: Option<String>,
        /// Filter by show name (partial match, case-insensitive)
        #[arg(long)]
        show: Option<String>,
        /// Log file to analyze (defaults to the configured one)
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show station status
    Status,
    /// Scan a music directory and write the library listing
    Scan {
        /// Directory to scan recursively for audio files
        dir: PathBuf,
    },
    /// Station configuration
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Write a default config file
    Init,
    /// Print the effective configuration
    Show,
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(StationConfig::default_path);
    let config = StationConfig::load(&config_path);

    let result = match cli.command {
        Commands::Run => {
            Station::new(config).run();
            Ok(())
        }
        Commands::Cycle { listener } => {
            let station = Station::new(config);
            let outcome = station.run_cycle(listener.as_deref());
            println!("Cycle finished: {:?}", outcome);
            Ok(())
        }
        Commands::Report {
            from,
            to,
            show,
            log,
        } => cmd_report(&config, from, to, show, log),
        Commands::Status => cmd_status(&config),
        Commands::Scan { dir } => cmd_scan(&config, &dir),
        Commands::Config { action } => match action {
            ConfigCmd::Init => config.save(&config_path).map(|_| {
                println!("Wrote default config to {}", config_path.display());
            }),
            ConfigCmd::Show => {
                match serde_json::to_string_pretty(&config) {
                    Ok(json) => {
                        println!("{}", json);
                        Ok(())
                    }
                    Err(e) => Err(format!("Serialize error: {}", e)),
                }
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_report(
    config: &StationConfig,
    from: Option<String>,
    to: Option<String>,
    show: Option<String>,
    log: Option<PathBuf>,
) -> Result<(), String> {
    let filter = ReportFilter {
        from: from
            .map(|s| report::parse_window_timestamp(&s))
            .transpose()?,
        to: to.map(|s| report::parse_window_timestamp(&s)).transpose()?,
        show,
    };
    let log_path = log.unwrap_or_else(|| config.resolve(&config.log_file));
    let content = std::fs::read_to_string(&log_path)
        .map_err(|e| format!("Could not read log {}: {}", log_path.display(), e))?;
    let buckets = report::parse_log(&content, &filter);
    println!("{}", report::format_report(&buckets, &filter));
    Ok(())
}

fn cmd_status(config: &StationConfig) -> Result<(), String> {
    let schedule = ShowSchedule::load(&config.resolve(&config.schedule_file));
    let show = schedule.effective_at(Local::now().time());
    println!("Active show: {} ({})", show.name, show.id);
    if let Some(style) = &show.music_style {
        println!("Music style: {}", style);
    }

    let queue = autodj::queue::PlayQueue::new(&config.resolve(&config.queue_file));
    match queue.last_track_name() {
        Some(track) => println!("Last queued track: {}", track),
        None => println!("Last queued track: (none)"),
    }

    let pool_name = show
        .suggestion_pool
        .clone()
        .or_else(|| config.default_pool.clone());
    match pool_name {
        Some(name) => {
            let pool = autodj::pool::SuggestionPool::open(
                &config.resolve(&config.pools_dir).join(&name),
            );
            println!("Suggestion pool: {} ({} entries)", name, pool.entries().len());
        }
        None => println!("Suggestion pool: (none bound)"),
    }

    let listing = config.resolve(&config.library_listing);
    match Library::load_listing(&listing) {
        Ok(library) => println!("Library: {} tracks", library.len()),
        Err(e) => println!("Library: unavailable ({})", e),
    }
    Ok(())
}

fn cmd_scan(config: &StationConfig, dir: &PathBuf) -> Result<(), String> {
    let library = Library::scan_dir(dir)?;
    let listing = config.resolve(&config.library_listing);
    library.write_listing(&listing)?;
    println!(
        "Scanned {} tracks into {}",
        library.len(),
        listing.display()
    );
    Ok(())
}
