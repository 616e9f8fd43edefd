use aircast::catalog::Catalog;
use aircast::config::StationConfig;
use aircast::player::AudioPlayer;
use aircast::station::StationController;
use chrono::{Local, Timelike};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "aircast", about = "Unattended broadcast engine CLI")]
struct Cli {
    /// Config file path (default: user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the station unattended
    Run {
        /// Use the simulated audio backend (no sound device needed)
        #[arg(long)]
        simulate: bool,
        /// Stop after this many seconds (default: run until killed)
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Show station configuration and catalog summary
    Status,
    /// Station configuration
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Show current configuration
    Show,
    /// Write a default configuration file
    Init,
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(StationConfig::default_path);

    match cli.command {
        Commands::Run { simulate, duration } => run_station(&config_path, simulate, duration),
        Commands::Status => {
            let config = StationConfig::load(&config_path);
            let catalog = Catalog::load(&config.catalog_path);
            println!("aircast v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Personas: {} ({}:00-{}:00) / {} (overnight)",
                config.morning_persona,
                config.morning_hour,
                config.evening_hour,
                config.evening_persona
            );
            println!(
                "Catalog: {} song(s) at {} | Content root: {} | Queue low water: {}",
                catalog.len(),
                config.catalog_path.display(),
                config.content_root.display(),
                config.queue_low_water
            );
        }
        Commands::Config { action } => match action {
            ConfigCmd::Show => {
                let config = StationConfig::load(&config_path);
                match serde_json::to_string_pretty(&config) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigCmd::Init => {
                if config_path.exists() {
                    eprintln!("Error: {} already exists", config_path.display());
                    std::process::exit(1);
                }
                let config = StationConfig::default();
                match config.save(&config_path) {
                    Ok(()) => println!("Wrote default config to {}", config_path.display()),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },
    }
}

fn run_station(config_path: &PathBuf, simulate: bool, duration: Option<u64>) {
    let config = StationConfig::load(config_path);
    let catalog = Catalog::load(&config.catalog_path);
    if catalog.is_empty() {
        eprintln!(
            "Error: catalog at '{}' is empty. Nothing to broadcast.",
            config.catalog_path.display()
        );
        std::process::exit(1);
    }

    let player = if simulate {
        AudioPlayer::simulated(Duration::from_secs(3))
    } else {
        AudioPlayer::rodio()
    };
    let station = StationController::new(player, &config);

    station.top_up_from_catalog(&catalog);
    if let Err(e) = station.start() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    println!(
        "On air: {} song(s) in rotation, content root {}",
        catalog.len(),
        config.content_root.display()
    );

    let started = Instant::now();
    let mut last_announced_hour: Option<u32> = None;
    let mut last_report = Instant::now();

    loop {
        thread::sleep(Duration::from_secs(1));
        station.top_up_from_catalog(&catalog);

        // Top-of-hour time check, followed by a weather spot.
        let now = Local::now().naive_local();
        if now.minute() == 0 && last_announced_hour != Some(now.hour()) {
            if station.announce_time(now) {
                println!("Time announcement queued for {}:00", now.hour());
            }
            if station.announce_weather() {
                println!("Weather spot queued");
            }
            last_announced_hour = Some(now.hour());
        }

        if last_report.elapsed() >= Duration::from_secs(30) {
            let status = station.get_status();
            println!(
                "[{}] {} | up {}s | songs: {} | outros: {} | errors: {}",
                Local::now().format("%H:%M:%S"),
                status.state,
                status.uptime_secs,
                status.songs_played,
                status.outros_played,
                status.errors_count
            );
            last_report = Instant::now();
        }

        if let Some(limit) = duration {
            if started.elapsed() >= Duration::from_secs(limit) {
                break;
            }
        }
    }

    station.stop();
    let status = station.get_status();
    println!(
        "Off air after {}s: {} song(s), {} outro(s), {} error(s)",
        status.uptime_secs, status.songs_played, status.outros_played, status.errors_count
    );
}
