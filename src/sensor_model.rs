use crate::gain_codec::GainCodec;
use crate::register_bus::RegisterOp;
use crate::sensor_mode::{ModeGroupTable, SensorModeInfo};

/// Addresses of the standard control registers.
#[derive(Copy, Clone, Debug)]
pub struct ControlRegisters {
    pub model_id: u16,
    pub revision: u16,
    /// 8-bit frame counter. Reads as the stream-off sentinel when idle.
    pub frame_count: u16,
    pub mode_select: u16,
    pub stream_on_value: u16,
    pub stream_off_value: u16,
    pub group_param_hold: u16,
    pub coarse_integration_time: u16,
    /// Shifter registers, if the sensor has them.
    pub cit_shifter: Option<u16>,
    pub frame_length_lines: u16,
    pub fll_shifter: Option<u16>,
    pub analog_gain: u16,
    pub digital_gain: u16,
    pub x_addr_start: u16,
    pub y_addr_start: u16,
    pub x_addr_end: u16,
    pub y_addr_end: u16,
    pub x_output_size: u16,
    pub y_output_size: u16,
    pub test_pattern: u16,
    /// Calibration words are bursted into this data port.
    pub cal_data_port: u16,
}

/// Page select, register lock and the fast-change (seamless) mode registers.
#[derive(Copy, Clone, Debug)]
pub struct SeamlessRegisters {
    pub page_select: u16,
    pub page_value: u16,
    pub lock: u16,
    pub unlock_value: u16,
    pub lock_value: u16,
    pub fast_change_idx: u16,
    /// Written before a fast-change index update while streaming, so the
    /// switch lands on a frame boundary.
    pub fast_change_update: u16,
    pub fast_change_update_value: u16,
    /// Fast-change index value meaning "disabled".
    pub fast_change_disabled: u16,
}

/// Registers and tables for sensors that retain their RAM across stream
/// cycles.
#[derive(Copy, Clone, Debug)]
pub struct RetentionSetfiles {
    /// Global table written in place of the normal one when preparing
    /// retention.
    pub global: &'static [RegisterOp],
    /// Mode tables loaded into the retained RAM, in order.
    pub tables: &'static [&'static [RegisterOp]],
    /// Written once all tables are loaded.
    pub finish: &'static [RegisterOp],
    /// Writing `ok_value` requests a RAM checksum; the sensor clears it when
    /// the check has run.
    pub checksum_enable: u16,
    pub checksum_passed: u16,
    /// Reads `ok_value` once the RAM is ready.
    pub ram_ready: u16,
    pub ok_value: u16,
}

/// In-place alternating exposure bracketing: one control register plus a
/// long-frame and a short-frame lookup table.
#[derive(Copy, Clone, Debug)]
pub struct AebRegisters {
    pub control: u16,
    /// Enable sequence for 10-bit modes and for pseudo 12-bit modes.
    pub enable_raw10: &'static [RegisterOp],
    pub enable_pseudo12: &'static [RegisterOp],
    /// Base addresses of the long and short lookup tables.
    pub lut_long: u16,
    pub lut_short: u16,
    pub lut_offset_cit: u16,
    pub lut_offset_again: u16,
    pub lut_offset_dgain: u16,
    pub lut_offset_fll: u16,
}

/// How the sensor implements AEB.
#[derive(Copy, Clone, Debug)]
pub enum AebControl {
    Unsupported,
    /// Toggled by register writes without changing mode.
    InPlace(&'static AebRegisters),
    /// Separate modes reached through the Aeb/AebIdcg mode group slots.
    ModeSwitch,
}

/// One step of the diagnostic register dump.
#[derive(Copy, Clone, Debug)]
pub enum StatusProbe {
    Read8(u16, &'static str),
    Read16(u16, &'static str),
    Write16(u16, u16, &'static str),
}

/// Everything about a sensor model that does not change at runtime.
pub struct SensorDescriptor {
    pub name: &'static str,
    pub sensor_id: u16,
    pub max_width: u32,
    pub max_height: u32,

    pub min_fine_integration_time: u32,
    pub max_fine_integration_time: u32,
    /// Minimum gain codes (1.0x).
    pub min_analog_gain: u32,
    pub min_digital_gain: u32,
    /// Exposures whose coarse integration falls at or below this many lines
    /// get gain compensation.
    pub cit_compensation_threshold: u32,
    /// Frame counter value meaning "not streaming".
    pub stream_off_sentinel: u8,

    pub regs: ControlRegisters,
    pub seamless: SeamlessRegisters,
    pub modes: &'static [SensorModeInfo],
    pub global_setting: &'static [RegisterOp],
    /// Written after calibration data.
    pub golden_cal: &'static [RegisterOp],
    pub load_sram: &'static [&'static [RegisterOp]],
    pub retention: Option<&'static RetentionSetfiles>,
    pub aeb: AebControl,
    pub status_registers: &'static [StatusProbe],
}

/// A sensor model plugs its static tables, its gain format and its mode
/// adjacency rules into the generic controller.
pub trait SensorModel: Sync {
    fn descriptor(&self) -> &'static SensorDescriptor;

    fn gain_codec(&self) -> &'static dyn GainCodec;

    /// Mode group table for base mode `mode`: which modes implement its
    /// low-noise, 12-bit, AEB and cropped remosaic variants.
    fn mode_groups(&self, mode: usize) -> ModeGroupTable;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }

    fn mode_count(&self) -> usize {
        self.descriptor().modes.len()
    }
}
