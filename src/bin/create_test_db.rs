use std::path::Path;

use solar_sync::adapters::db::{count_rows, open_connection, run_migrations, schema_version};

const DEFAULT_PATH: &str = "./target/testdb/solar_sync_template.db";
const TABLES: [&str; 4] = ["stations", "devices", "weather_snapshots", "telemetry_records"];

struct Options {
    path: String,
    force: bool,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("failed to create test db: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        print_help();
        return Ok(());
    };

    let path_ref = Path::new(&options.path);
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create parent directory: {error}"))?;
    }

    if options.force && path_ref.exists() {
        std::fs::remove_file(path_ref)
            .map_err(|error| format!("failed to remove existing db file: {error}"))?;
    }

    let mut connection = open_connection(&options.path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;
    let version = schema_version(&connection).map_err(|error| error.to_string())?;

    println!("created/updated sqlite template at: {}", options.path);
    println!("schema version: {version}");
    for table in TABLES {
        let rows = count_rows(&connection, table).map_err(|error| error.to_string())?;
        println!("  {table}: {rows} rows");
    }
    println!("point tests at it with TEST_DB_TEMPLATE_PATH={}", options.path);
    Ok(())
}

/// `None` when help was requested.
fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options {
        path: DEFAULT_PATH.to_string(),
        force: false,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--path" => {
                options.path = args
                    .next()
                    .ok_or_else(|| "--path requires a value".to_string())?;
            }
            "--force" => options.force = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(Some(options))
}

fn print_help() {
    println!("create_test_db");
    println!();
    println!("Usage:");
    println!("  cargo run --bin create_test_db -- [--path <file>] [--force]");
    println!();
    println!("Options:");
    println!("  --path <file>   target sqlite file (default: {DEFAULT_PATH})");
    println!("  --force         delete existing file before migrating");
}
