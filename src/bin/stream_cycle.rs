// Copyright (c) 2023 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use chrono::Local;
use clap::Parser;
use env_logger;
use log::info;

use camera_cis::abstract_cis::{AbstractCis, HdrMode, LowNoiseMode};
use camera_cis::cis::Cis;
use camera_cis::clock::SystemClock;
use camera_cis::config::CisConfig;
use camera_cis::select_sensor::model_by_name;
use camera_cis::sim_bus::SimSensorBus;

/// Exercises the stream on/off and seamless mode switch sequence against a
/// simulated sensor with retention enabled, timing each step.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Sensor model to simulate.
    #[arg(short, long, default_value = "S5KGN3")]
    model: String,

    /// Number of stream on/off cycles.
    #[arg(short, long, default_value_t = 3)]
    cycles: u32,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let model = model_by_name(&args.model).unwrap();
    let bus = SimSensorBus::for_sensor(model.descriptor());
    let mut cis = Cis::new(bus, SystemClock::new(), model,
                           CisConfig::default().with_retention());
    cis.init().unwrap();
    cis.set_global_setting().unwrap();
    cis.mode_change(0).unwrap();
    info!("{} retention {:?}, groups {}",
          cis.model(), cis.retention_state(), cis.mode_groups());

    for cycle in 0..args.cycles {
        let start = Local::now();
        AbstractCis::stream_on(&mut cis).unwrap();
        AbstractCis::wait_streamon(&mut cis).unwrap();
        let on_elapsed = Local::now() - start;

        // Alternate sub-modes so each cycle takes a seamless switch.
        if cycle % 2 == 0 {
            cis.set_low_noise_mode(LowNoiseMode::Ln2);
        } else {
            cis.set_hdr_mode(HdrMode::Aeb);
        }
        let switched = cis.update_seamless_mode().unwrap();

        let stop = Local::now();
        AbstractCis::stream_off(&mut cis).unwrap();
        AbstractCis::wait_streamoff(&mut cis).unwrap();
        let off_elapsed = Local::now() - stop;
        info!("cycle {}: streamon {}ms, seamless switch {}, mode {}, streamoff {}ms",
              cycle, on_elapsed.num_milliseconds(), switched,
              cis.data().sens_config_index_cur, off_elapsed.num_milliseconds());
        cis.set_low_noise_mode(LowNoiseMode::Off);
        cis.set_hdr_mode(HdrMode::Single);
    }
    cis.log_status().unwrap();
    cis.deinit().unwrap();
}
