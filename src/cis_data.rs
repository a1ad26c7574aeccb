use crate::abstract_cis::{HdrMode, LowNoiseMode, StreamState, TestPatternMode,
                          TwelveBitMode};
use crate::timing::FrameTiming;

/// A gain limit in both register code and permille.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GainBound {
    pub code: u32,
    pub permille: u32,
}

/// Runtime state of one sensor instance. Reset on every init(); mutated by
/// nearly every operation. Owned by the Cis and never shared between
/// sensors.
#[derive(Clone, Debug, Default)]
pub struct SharedCisData {
    pub sens_config_index_cur: usize,
    /// None until the first mode change after init.
    pub sens_config_index_pre: Option<usize>,
    pub cur_width: u32,
    pub cur_height: u32,

    // Clocking of the current mode, possibly adjusted by set_frame_duration().
    pub pclk: u32,
    pub frame_length_lines: u32,
    pub line_length_pck: u32,
    pub frame_length_lines_shifter: u8,

    pub timing: FrameTiming,
    /// Frame duration currently programmed.
    pub cur_frame_us_time: u32,

    pub min_coarse_integration_time: u32,
    pub max_coarse_integration_time: u32,
    pub max_margin_coarse_integration_time: u32,
    pub min_fine_integration_time: u32,
    pub max_fine_integration_time: u32,

    /// Exposure bounds in microseconds.
    pub min_exposure_us: u32,
    pub max_exposure_us: u32,

    pub min_analog_gain: GainBound,
    pub max_analog_gain: GainBound,
    pub min_digital_gain: GainBound,
    pub max_digital_gain: GainBound,

    pub cur_long_exposure_coarse: u32,
    pub cur_short_exposure_coarse: u32,
    pub cur_cit_shifter: u8,

    // Requested (cur) and last applied (pre) sub-modes.
    pub cur_lownoise_mode: LowNoiseMode,
    pub pre_lownoise_mode: LowNoiseMode,
    pub cur_12bit_mode: TwelveBitMode,
    pub pre_12bit_mode: TwelveBitMode,
    pub cur_hdr_mode: HdrMode,
    pub pre_hdr_mode: HdrMode,
    pub cur_remosaic_zoom_ratio: u32,
    pub pre_remosaic_zoom_ratio: u32,

    pub cur_pattern_mode: TestPatternMode,
    pub stream_on: bool,
    pub stream_state: StreamState,
    pub group_param_hold: bool,

    pub sen_vsync_count: u32,
    pub sen_frame_count: u8,
    pub dual_sync_slave: bool,
    pub highres_capture_mode: bool,
}
