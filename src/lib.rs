// Copyright (c) 2023 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

pub mod abstract_cis;
pub mod calibration;
pub mod cis;
pub mod cis_data;
pub mod clock;
pub mod config;
pub mod exposure;
pub mod gain_codec;
pub mod gn3;
pub mod hm3;
pub mod register_bus;
pub mod select_sensor;
pub mod sensor_mode;
pub mod sensor_model;
pub mod sim_bus;
pub mod streaming;
pub mod timing;
