use clap::Parser;
use log::{error, info};

use uuv_synth_data::host::HostBridge;
use uuv_synth_data::{run_render, RenderArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RenderArgs::parse();
    let host_cmd = args.host_cmd.clone();
    let config = args.into_config();

    let scratch_dir = std::env::temp_dir().join(format!("synth-render-{}", std::process::id()));
    if let Err(e) = std::fs::create_dir_all(&scratch_dir) {
        error!("Failed to create {}: {}", scratch_dir.display(), e);
        std::process::exit(1);
    }

    info!("Starting host application: {}", host_cmd);
    let result = HostBridge::spawn(&host_cmd, &scratch_dir)
        .and_then(|mut host| run_render(&config, &mut host));

    let _ = std::fs::remove_dir_all(&scratch_dir);

    match result {
        Ok(summary) => summary.print_summary(),
        Err(e) => {
            error!("Failed to render dataset {}: {}", config.dataset_name, e);
            std::process::exit(1);
        }
    }
}
