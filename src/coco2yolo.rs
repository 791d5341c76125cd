use clap::Parser;
use log::{error, info};

use uuv_synth_data::{convert_coco_file, ConvertArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ConvertArgs::parse().into_config();

    info!("Starting the conversion process...");

    match convert_coco_file(&config) {
        Ok(summary) => summary.print_summary(),
        Err(e) => {
            error!("Failed to convert {}: {}", config.json_path.display(), e);
            std::process::exit(1);
        }
    }
}
