fn main() {
    if let Err(err) = solar_sync::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
