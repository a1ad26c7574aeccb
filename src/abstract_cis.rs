use std::fmt;

use canonical_error::CanonicalError;

use crate::cis_data::SharedCisData;

/// Exposure or gain values for the frames of one capture. Single-exposure
/// modes only look at `long_val`; AEB uses `long_val` and `short_val`.
/// Exposures are in microseconds, gains in permille (1000 = 1.0x).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AeParam {
    pub long_val: u32,
    pub short_val: u32,
    pub middle_val: u32,
}

impl AeParam {
    /// Same value for every frame.
    pub fn uniform(val: u32) -> AeParam {
        AeParam{long_val: val, short_val: val, middle_val: val}
    }
}

impl fmt::Display for AeParam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.long_val, self.short_val, self.middle_val)
    }
}

pub type ExposureParam = AeParam;
pub type GainParam = AeParam;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LowNoiseMode {
    #[default]
    Off,
    Ln2,
    Ln4,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TwelveBitMode {
    #[default]
    Off,
    /// Dual conversion gain readout.
    Real12Bit,
    Pseudo12Bit,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HdrMode {
    #[default]
    Single,
    /// Alternating exposure bracketing, long and short frames on separate
    /// virtual channels.
    Aeb,
}

/// Whether the sensor keeps its register RAM alive across stream cycles so
/// that a mode change is just a fast-change index write.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RetentionState {
    #[default]
    Unsupported,
    /// Supported, but the RAM has not been loaded since power up.
    Inactive,
    Activated,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Init,
    Streaming,
    Stopping,
    Stopped,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)  // Just re-use Debug.
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TestPatternMode {
    #[default]
    Off,
    SolidColor,
    ColorBars,
    FadeToGray,
    Pn9,
}

impl TestPatternMode {
    /// Value of the test pattern mode register.
    pub fn register_value(&self) -> u16 {
        match self {
            TestPatternMode::Off => 0x0000,
            TestPatternMode::SolidColor => 0x0001,
            TestPatternMode::ColorBars => 0x0002,
            TestPatternMode::FadeToGray => 0x0003,
            TestPatternMode::Pn9 => 0x0004,
        }
    }
}

/// AbstractCis is the control surface of one camera image sensor: mode
/// selection, exposure and gain, and streaming. The camera framework drives a
/// sensor only through this trait; each sensor model plugs its register
/// tables and gain format in underneath.
///
/// Exposure times are in microseconds and gains in permille throughout.
/// Requests outside the current mode's limits are clamped, not rejected.
pub trait AbstractCis {
    /// Returns the sensor model name, e.g. "S5KGN3".
    fn model(&self) -> &'static str;

    /// Read-only view of the sensor's runtime state.
    fn data(&self) -> &SharedCisData;

    // Lifecycle.

    /// Verifies the sensor identity, resets all runtime state and computes
    /// timing for mode 0 at full resolution. Returns NotFound if the id
    /// register does not match this model.
    fn init(&mut self) -> Result<(), CanonicalError>;

    /// Called before power off. On retention-capable boards this makes sure
    /// the sensor RAM holds the last configuration.
    fn deinit(&mut self) -> Result<(), CanonicalError>;

    /// Writes the sensor-wide register table and calibration. With retention
    /// active this only verifies the retained RAM checksum.
    fn set_global_setting(&mut self) -> Result<(), CanonicalError>;

    // Mode selection.

    /// Switches to sensor mode `mode`. Returns InvalidArgument for an unknown
    /// mode. While streaming, only a seamless switch within the current mode
    /// group is allowed; anything else is PermissionDenied and nothing is
    /// written. A failed register write aborts the change and leaves the
    /// sensor partially configured; the caller must redo the mode change.
    fn mode_change(&mut self, mode: usize) -> Result<(), CanonicalError>;

    /// Evaluates pending sub-mode requests (AEB, low-noise, 12-bit, cropped
    /// remosaic) and performs at most one seamless switch. Returns true if
    /// registers were written.
    fn update_seamless_mode(&mut self) -> Result<bool, CanonicalError>;

    fn set_low_noise_mode(&mut self, mode: LowNoiseMode);
    fn set_12bit_mode(&mut self, mode: TwelveBitMode);
    fn set_hdr_mode(&mut self, mode: HdrMode);
    /// Zoom ratio x100.
    fn set_remosaic_zoom_ratio(&mut self, ratio: u32);

    /// Crops the output to a centred `width` x `height` window. Requires the
    /// stream to be off.
    fn set_size(&mut self, width: u32, height: u32) -> Result<(), CanonicalError>;

    fn set_test_pattern(&mut self, mode: TestPatternMode) -> Result<(), CanonicalError>;

    // Streaming.

    /// Starts streaming. Does not wait for the first frame; see
    /// wait_streamon().
    fn stream_on(&mut self) -> Result<(), CanonicalError>;

    /// Blocks until the sensor's frame counter shows it is streaming.
    /// Returns DeadlineExceeded when the poll budget runs out.
    fn wait_streamon(&mut self) -> Result<(), CanonicalError>;

    fn stream_off(&mut self) -> Result<(), CanonicalError>;

    /// Blocks until the frame counter reports the stream-off sentinel.
    fn wait_streamoff(&mut self) -> Result<(), CanonicalError>;

    /// Enters (`true`) or leaves (`false`) group parameter hold. Returns true
    /// if the hold register was written; some states make this a no-op.
    fn group_param_hold(&mut self, hold: bool) -> Result<bool, CanonicalError>;

    // Exposure and gain.

    fn set_exposure_time(&mut self, target: &ExposureParam) -> Result<(), CanonicalError>;
    fn get_min_exposure_time(&mut self) -> Result<u32, CanonicalError>;
    fn get_max_exposure_time(&mut self) -> Result<u32, CanonicalError>;

    /// Frame duration needed to fit `exposure_us`, never shorter than the
    /// mode's minimum frame time.
    fn adjust_frame_duration(&self, exposure_us: u32) -> u32;
    fn set_frame_duration(&mut self, duration_us: u32) -> Result<(), CanonicalError>;
    fn set_frame_rate(&mut self, fps: u32) -> Result<(), CanonicalError>;

    /// Nearest analog gain the sensor can represent, in permille.
    fn adjust_analog_gain(&self, permille: u32) -> u32;
    fn set_analog_gain(&mut self, gain: &GainParam) -> Result<(), CanonicalError>;
    fn get_analog_gain(&mut self) -> Result<u32, CanonicalError>;
    fn get_min_analog_gain(&mut self) -> Result<u32, CanonicalError>;
    fn get_max_analog_gain(&mut self) -> Result<u32, CanonicalError>;

    fn set_digital_gain(&mut self, gain: &GainParam) -> Result<(), CanonicalError>;
    fn get_digital_gain(&mut self) -> Result<u32, CanonicalError>;
    fn get_min_digital_gain(&mut self) -> Result<u32, CanonicalError>;
    fn get_max_digital_gain(&mut self) -> Result<u32, CanonicalError>;

    /// For exposures too short for the sensor's integration granularity,
    /// moves the shortfall into analog gain (then digital gain) so that the
    /// exposure-gain product is preserved. Returns the (again, dgain) to use,
    /// in permille.
    fn compensate_gain_for_extremely_br(&self, exposure_us: u32, again: u32, dgain: u32)
                                        -> Result<(u32, u32), CanonicalError>;

    /// Exposures beyond the normal frame range, using the shifter registers.
    fn set_long_term_exposure(&mut self, enable: bool, exposure_us: u32)
                              -> Result<(), CanonicalError>;

    // Diagnostics.

    /// Logs the sensor's status registers.
    fn log_status(&mut self) -> Result<(), CanonicalError>;
}
