// Copyright (c) 2023 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use clap::Parser;
use env_logger;

use camera_cis::select_sensor::{model_by_name, sensor_models};
use camera_cis::sensor_model::SensorModel;
use camera_cis::timing::{frame_timing, integration_us};

/// Lists the sensor modes of the supported sensor models, with their frame
/// timing and seamless mode groups.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Only list this model.
    #[arg(short, long)]
    model: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let models: Vec<&'static dyn SensorModel> = match &args.model {
        Some(name) => vec![model_by_name(name).unwrap()],
        None => sensor_models().to_vec(),
    };
    for model in models {
        let desc = model.descriptor();
        println!("{} (id {:#06x}): {} modes, retention {}",
                 model.name(), desc.sensor_id, model.mode_count(),
                 if desc.retention.is_some() { "yes" } else { "no" });
        for (i, mode) in desc.modes.iter().enumerate() {
            let timing = frame_timing(&mode.pll, mode.height).unwrap();
            let (pclk, llp) = (mode.pll.pclk, mode.pll.line_length_pck);
            let min_exp = integration_us(pclk, llp, mode.min_coarse_integration_time,
                                         desc.min_fine_integration_time).unwrap();
            let max_exp = integration_us(pclk, llp, mode.max_coarse_integration_time(),
                                         desc.max_fine_integration_time).unwrap();
            println!("  {:2}: {:24} {}x{} {}fps min frame {}us exposure {}..{}us fci {:?}",
                     i, mode.name, mode.width, mode.height, timing.max_fps,
                     timing.min_frame_us_time, min_exp, max_exp, mode.fast_change_idx);
            println!("      groups {}", model.mode_groups(i));
        }
    }
}
