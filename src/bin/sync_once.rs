use solar_sync::app::weather_job::WeatherSyncStatus;
use solar_sync::app::{OnceTarget, run_once};
use solar_sync::domain::sync_summary::{LevelCounts, RunStatus};

fn main() {
    let target = match parse_target(std::env::args().skip(1)) {
        Ok(Some(target)) => target,
        Ok(None) => {
            print_help();
            return;
        }
        Err(error) => {
            eprintln!("{error}");
            print_help();
            std::process::exit(2);
        }
    };

    let report = match run_once(target) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("manual sync failed: {error}");
            std::process::exit(1);
        }
    };

    let mut failed = false;

    if let Some(weather) = &report.weather {
        match &weather.status {
            WeatherSyncStatus::Stored { snapshot_id } => println!(
                "weather: stored snapshot {snapshot_id} (captured_at {})",
                weather.captured_at
            ),
            WeatherSyncStatus::Failed(reason) => {
                failed = true;
                println!("weather: failed: {reason}");
            }
            WeatherSyncStatus::SkippedOverlap => println!("weather: skipped, already running"),
        }
    }

    if let Some(summary) = &report.sync {
        println!("sync run {} ({} -> {})", summary.run_id, summary.started_at, summary.finished_at);
        match &summary.status {
            RunStatus::Completed => println!("  status: completed"),
            RunStatus::Aborted(reason) => println!("  status: aborted: {reason}"),
            RunStatus::SkippedOverlap => println!("  status: skipped, already running"),
        }
        print_counts("stations", &summary.stations);
        print_counts("devices", &summary.devices);
        print_counts("telemetry", &summary.telemetry);
        println!("  device list failures: {}", summary.device_list_failures);
        failed |= summary.has_failures();
    }

    if failed {
        std::process::exit(1);
    }
}

fn parse_target(args: impl Iterator<Item = String>) -> Result<Option<OnceTarget>, String> {
    let mut target = OnceTarget::Both;
    for arg in args {
        target = match (arg.as_str(), target) {
            ("--weather-only", OnceTarget::Both) => OnceTarget::WeatherOnly,
            ("--vendor-only", OnceTarget::Both) => OnceTarget::VendorOnly,
            ("--weather-only" | "--vendor-only", _) => {
                return Err("--weather-only and --vendor-only are mutually exclusive".to_string());
            }
            ("--help" | "-h", _) => return Ok(None),
            (other, _) => return Err(format!("unknown argument: {other}")),
        };
    }
    Ok(Some(target))
}

fn print_counts(level: &str, counts: &LevelCounts) {
    println!(
        "  {level}: {} processed, {} skipped, {} failed",
        counts.processed, counts.skipped, counts.failed
    );
}

fn print_help() {
    println!("sync_once");
    println!();
    println!("Runs the weather job and the full vendor sync once against DB_PATH.");
    println!();
    println!("Usage:");
    println!("  cargo run --bin sync_once -- [--weather-only | --vendor-only]");
}
