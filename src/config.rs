use crate::abstract_cis::RetentionState;

/// Board and runtime policy for one sensor instance. Everything that is a
/// property of the sensor silicon lives in its SensorDescriptor instead.
#[derive(Clone, Debug)]
pub struct CisConfig {
    /// Frame-counter polls before wait_streamon() gives up.
    pub stream_on_timeout_cnt: u32,
    /// Frame-counter polls before wait_streamoff() gives up.
    pub stream_off_timeout_cnt: u32,
    pub poll_interval_us: u64,

    /// Poll budgets are multiplied by this for long exposures, long frames
    /// and dual-sync slave operation.
    pub long_wait_multiplier: u32,
    /// Frame durations at or above this get the extended poll budget.
    pub long_frame_threshold_us: u32,

    /// Whether this board keeps sensor RAM powered across stream cycles.
    /// Starts out Inactive when supported.
    pub retention: RetentionState,
    pub retention_crc_poll_cnt: u32,
    pub retention_crc_poll_interval_us: u64,
    /// Streamon polls when the first stream-on after power up has to
    /// re-initialize from retention.
    pub retention_stream_on_retries: u32,

    /// Zoom ratio (x100) at or above which the cropped remosaic sub-mode is
    /// selected.
    pub remosaic_zoom_ratio_threshold: u32,

    /// This sensor is the slave of a dual-sensor sync pair.
    pub dual_sync_slave: bool,
}

impl Default for CisConfig {
    fn default() -> Self {
        CisConfig{stream_on_timeout_cnt: 250,
                  stream_off_timeout_cnt: 250,
                  poll_interval_us: 2000,
                  long_wait_multiplier: 6,
                  long_frame_threshold_us: 100_000,
                  retention: RetentionState::Unsupported,
                  retention_crc_poll_cnt: 250,
                  retention_crc_poll_interval_us: 500,
                  retention_stream_on_retries: 10,
                  remosaic_zoom_ratio_threshold: 200,
                  dual_sync_slave: false}
    }
}

impl CisConfig {
    pub fn with_retention(mut self) -> Self {
        self.retention = RetentionState::Inactive;
        self
    }
}
