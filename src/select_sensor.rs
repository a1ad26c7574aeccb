use canonical_error::{CanonicalError, failed_precondition_error, not_found_error};
use log::info;

use crate::abstract_cis::AbstractCis;
use crate::cis::Cis;
use crate::clock::Clock;
use crate::config::CisConfig;
use crate::gn3::S5KGN3;
use crate::hm3::S5KHM3;
use crate::register_bus::RegisterBus;
use crate::sensor_model::SensorModel;

/// Every sensor model this crate can drive.
pub fn sensor_models() -> [&'static dyn SensorModel; 2] {
    [&S5KGN3, &S5KHM3]
}

/// Looks a sensor model up by name, ignoring case.
pub fn model_by_name(name: &str) -> Result<&'static dyn SensorModel, CanonicalError> {
    sensor_models().into_iter()
        .find(|m| m.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| not_found_error(format!("Unknown sensor model {}", name).as_str()))
}

/// Reads the model id register and returns the matching sensor model.
pub fn probe_model(bus: &mut dyn RegisterBus) -> Result<&'static dyn SensorModel, CanonicalError> {
    for model in sensor_models() {
        let desc = model.descriptor();
        if bus.read16(desc.regs.model_id)? == desc.sensor_id {
            return Ok(model);
        }
    }
    Err(not_found_error("No supported sensor found"))
}

// Probes the sensor on `bus` and returns an initialized controller for it.
// If `model_name` is given, the probed sensor must be that model.
pub fn select_sensor<B, C>(model_name: Option<&str>, mut bus: B, clock: C,
                           config: CisConfig)
                           -> Result<Box<dyn AbstractCis + Send>, CanonicalError>
where B: RegisterBus + 'static, C: Clock + 'static
{
    let model = probe_model(&mut bus)?;
    if let Some(name) = model_name {
        let requested = model_by_name(name)?;
        if requested.name() != model.name() {
            return Err(failed_precondition_error(
                format!("Found {} sensor but {} was requested",
                        model.name(), requested.name()).as_str()));
        }
    }
    info!("[select_sensor] found {}, {} modes", model.name(), model.mode_count());
    let mut cis = Cis::new(bus, clock, model, config);
    cis.init()?;
    Ok(Box::new(cis))
}
