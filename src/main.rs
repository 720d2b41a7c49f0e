use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use chainscope::ui;

fn main() {
    // Warn-level default: the alternate screen owns stdout while the UI is
    // up, so routine logging stays quiet unless RUST_LOG raises it.
    if let Err(e) = SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
    {
        eprintln!("Failed to initialize logger: {}", e);
    }

    info!("Starting blockchain network visualizer");

    if let Err(e) = ui::run() {
        error!("Visualizer exited with error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
