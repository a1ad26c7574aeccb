// Copyright (c) 2023 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use clap::Parser;
use env_logger;
use log::info;

use camera_cis::abstract_cis::{AeParam, AbstractCis};
use camera_cis::clock::ManualClock;
use camera_cis::config::CisConfig;
use camera_cis::select_sensor::{model_by_name, select_sensor};
use camera_cis::sim_bus::SimSensorBus;

/// Utility program that sweeps exposure time and analog gain over a
/// simulated sensor, logging the register values each setting produces.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Sensor model to simulate.
    #[arg(short, long, default_value = "S5KGN3")]
    model: String,

    /// Sensor mode index.
    #[arg(long, default_value_t = 0)]
    mode: usize,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let model = model_by_name(&args.model).unwrap();
    let desc = model.descriptor();
    let bus = SimSensorBus::for_sensor(desc);
    let mut cis = select_sensor(Some(&args.model), bus, ManualClock::new(),
                                CisConfig::default()).unwrap();
    cis.mode_change(args.mode).unwrap();

    let min_exp = cis.get_min_exposure_time().unwrap();
    let max_exp = cis.get_max_exposure_time().unwrap();
    let min_gain = cis.get_min_analog_gain().unwrap();
    let max_gain = cis.get_max_analog_gain().unwrap();
    info!("{} mode {}: exposure {}..{}us, analog gain {}..{} permille",
          cis.model(), args.mode, min_exp, max_exp, min_gain, max_gain);

    for gain in [1000, 2000, 4000, 8000, 16000, 64000] {
        cis.set_analog_gain(&AeParam::uniform(gain)).unwrap();
        for exp_us in [10, 100, 1000, 10_000, 33_000, 100_000] {
            let frame_us = cis.adjust_frame_duration(exp_us);
            cis.set_frame_duration(frame_us).unwrap();
            cis.set_exposure_time(&AeParam::uniform(exp_us)).unwrap();
            let again = cis.get_analog_gain().unwrap();
            let (again, dgain) =
                cis.compensate_gain_for_extremely_br(exp_us, again, 1000).unwrap();
            let data = cis.data();
            info!("gain {} exp {}us: frame {}us coarse {} shifter {}, compensated {}/{}",
                  gain, exp_us, data.cur_frame_us_time, data.cur_long_exposure_coarse,
                  data.cur_cit_shifter, again, dgain);
        }
    }
}
