fn main() {
    if let Err(err) = solar_sync::app::run_service() {
        eprintln!("service startup failed: {err}");
        std::process::exit(1);
    }
}
