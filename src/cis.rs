use std::sync::{Arc, Mutex, MutexGuard};

use canonical_error::{CanonicalError, deadline_exceeded_error,
                      failed_precondition_error, internal_error,
                      invalid_argument_error, not_found_error,
                      permission_denied_error};
use log::{debug, error, info, warn};

use crate::abstract_cis::{AbstractCis, ExposureParam, GainParam, HdrMode,
                          LowNoiseMode, RetentionState, StreamState,
                          TestPatternMode, TwelveBitMode};
use crate::calibration::{CalibrationSource, write_calibration};
use crate::cis_data::SharedCisData;
use crate::clock::Clock;
use crate::config::CisConfig;
use crate::register_bus::{RegisterBus, apply_setfile};
use crate::sensor_mode::{ModeBitDepth, ModeGroupSlot, ModeGroupTable, SensorModeInfo};
use crate::sensor_model::{AebControl, AebRegisters, SensorDescriptor,
                          SensorModel, StatusProbe};
use crate::streaming::PowerSequence;
use crate::timing::frame_timing;

/// Frames to wait after a seamless switch that needs the sensor pipeline to
/// settle (low-noise combining, dual conversion gain, AEB).
pub(crate) const SEAMLESS_UPDATE_DELAY_FRAMES: u32 = 3;

const RETENTION_CRC_REQUEST_POLLS: u32 = 10;
const RETENTION_CRC_REQUEST_INTERVAL_US: u64 = 1500;
const DEINIT_DELAY_US: u64 = 10_000;

pub(crate) fn lock_bus<B: RegisterBus>(bus: &Arc<Mutex<B>>)
                                       -> Result<MutexGuard<'_, B>, CanonicalError> {
    bus.lock().map_err(|e| internal_error(
        format!("register bus lock poisoned: {}", e).as_str()))
}

/// Generic CIS controller. Holds the runtime state of one sensor and drives
/// it through the sensor model's register tables. Every register access goes
/// through the bus mutex; a multi-register sequence holds it throughout.
pub struct Cis<B: RegisterBus, C: Clock> {
    pub(crate) bus: Arc<Mutex<B>>,
    pub(crate) clock: C,
    pub(crate) model: &'static dyn SensorModel,
    pub(crate) desc: &'static SensorDescriptor,
    pub(crate) config: CisConfig,

    pub(crate) data: SharedCisData,
    pub(crate) mode_groups: ModeGroupTable,
    pub(crate) retention: RetentionState,
    pub(crate) seamless_delay_count: u32,
    pub(crate) aeb_active: bool,

    // Last values requested by the caller, replayed by recover_stream_on().
    pub(crate) backup_frame_duration: u32,
    pub(crate) backup_again: GainParam,
    pub(crate) backup_dgain: GainParam,
    pub(crate) backup_exposure: ExposureParam,

    pub(crate) mipi_clock_index_cur: Option<u32>,
    pub(crate) long_term_mode: bool,

    // The retained RAM holds the latest parameters only if they were
    // written while streaming.
    pub(crate) load_retention: bool,
    pub(crate) need_stream_on_retention: bool,
    pub(crate) cal_loaded: bool,

    pub(crate) calibration: Option<Box<dyn CalibrationSource>>,
    pub(crate) power: Option<Box<dyn PowerSequence>>,
    pub(crate) need_recovery: bool,
}

impl<B: RegisterBus, C: Clock> Cis<B, C> {
    pub fn new(bus: B, clock: C, model: &'static dyn SensorModel,
               config: CisConfig) -> Self {
        Self::with_shared_bus(Arc::new(Mutex::new(bus)), clock, model, config)
    }

    /// Like new(), for a bus shared with other users of the same device.
    pub fn with_shared_bus(bus: Arc<Mutex<B>>, clock: C,
                           model: &'static dyn SensorModel, config: CisConfig) -> Self {
        let desc = model.descriptor();
        let retention = if desc.retention.is_some() {
            config.retention
        } else {
            RetentionState::Unsupported
        };
        Cis{bus, clock, model, desc, config,
            data: SharedCisData::default(),
            mode_groups: ModeGroupTable::none(),
            retention,
            seamless_delay_count: 0,
            aeb_active: false,
            backup_frame_duration: 0,
            backup_again: GainParam::default(),
            backup_dgain: GainParam::default(),
            backup_exposure: ExposureParam::default(),
            mipi_clock_index_cur: None,
            long_term_mode: false,
            load_retention: false,
            need_stream_on_retention: true,
            cal_loaded: false,
            calibration: None,
            power: None,
            need_recovery: false}
    }

    pub fn with_calibration(mut self, calibration: Box<dyn CalibrationSource>) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_power_sequence(mut self, power: Box<dyn PowerSequence>) -> Self {
        self.power = Some(power);
        self
    }

    pub fn bus_handle(&self) -> Arc<Mutex<B>> {
        self.bus.clone()
    }

    pub fn descriptor(&self) -> &'static SensorDescriptor {
        self.desc
    }

    pub fn config(&self) -> &CisConfig {
        &self.config
    }

    pub fn retention_state(&self) -> RetentionState {
        self.retention
    }

    pub fn mode_groups(&self) -> ModeGroupTable {
        self.mode_groups
    }

    pub fn seamless_delay_count(&self) -> u32 {
        self.seamless_delay_count
    }

    pub fn aeb_active(&self) -> bool {
        self.aeb_active
    }

    /// MIPI clock index last selected for the current mode. Forgotten at
    /// every stream on.
    pub fn mipi_clock_index(&self) -> Option<u32> {
        self.mipi_clock_index_cur
    }

    pub fn set_mipi_clock_index(&mut self, index: u32) {
        self.mipi_clock_index_cur = Some(index);
    }

    /// Set after the sensor was power cycled by wait_streamon(); cleared by
    /// recover_stream_on().
    pub fn needs_recovery(&self) -> bool {
        self.need_recovery
    }

    pub(crate) fn mode_info(&self, mode: usize) -> Result<&'static SensorModeInfo, CanonicalError> {
        self.desc.modes.get(mode).ok_or_else(|| invalid_argument_error(
            format!("{}: mode {} out of range, {} modes",
                    self.desc.name, mode, self.desc.modes.len()).as_str()))
    }

    pub(crate) fn cur_mode_info(&self) -> Result<&'static SensorModeInfo, CanonicalError> {
        self.mode_info(self.data.sens_config_index_cur)
    }

    pub(crate) fn in_place_aeb(&self) -> Option<&'static AebRegisters> {
        match self.desc.aeb {
            AebControl::InPlace(aeb) => Some(aeb),
            _ => None,
        }
    }

    /// The AEB lookup tables, when exposure and gain must go through them.
    pub(crate) fn active_aeb_luts(&self) -> Option<&'static AebRegisters> {
        if self.aeb_active { self.in_place_aeb() } else { None }
    }

    pub(crate) fn remosaic_requested(&self) -> bool {
        self.data.cur_remosaic_zoom_ratio >= self.config.remosaic_zoom_ratio_threshold
    }

    /// Loads the timing of `mode` at the current output size.
    pub(crate) fn data_calculation(&mut self, mode: usize) -> Result<(), CanonicalError> {
        let info = self.mode_info(mode)?;
        let timing = frame_timing(&info.pll, self.data.cur_height)?;
        let data = &mut self.data;
        data.pclk = info.pll.pclk;
        data.frame_length_lines = info.pll.frame_length_lines;
        data.line_length_pck = info.pll.line_length_pck;
        data.frame_length_lines_shifter = 0;
        data.timing = timing;
        data.cur_frame_us_time = timing.min_frame_us_time;
        data.min_coarse_integration_time = info.min_coarse_integration_time;
        data.max_margin_coarse_integration_time = info.max_margin_coarse_integration_time;
        data.max_coarse_integration_time = info.max_coarse_integration_time();
        data.min_fine_integration_time = self.desc.min_fine_integration_time;
        data.max_fine_integration_time = self.desc.max_fine_integration_time;
        debug!("[data_calculation] mode {} {}: {:?}", mode, info.name, timing);
        Ok(())
    }

    /// Recomputes the cached exposure and gain bounds.
    pub(crate) fn refresh_bounds(&mut self) -> Result<(), CanonicalError> {
        self.get_min_exposure_time()?;
        self.get_max_exposure_time()?;
        self.get_min_analog_gain()?;
        self.get_max_analog_gain()?;
        self.get_min_digital_gain()?;
        self.get_max_digital_gain()?;
        Ok(())
    }

    pub fn init(&mut self) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let id = {
            let mut bus = lock_bus(&handle)?;
            bus.read16(self.desc.regs.model_id)?
        };
        if id != self.desc.sensor_id {
            return Err(not_found_error(
                format!("{}: sensor id {:#06x} does not match {:#06x}",
                        self.desc.name, id, self.desc.sensor_id).as_str()));
        }
        self.data = SharedCisData{cur_width: self.desc.max_width,
                                  cur_height: self.desc.max_height,
                                  dual_sync_slave: self.config.dual_sync_slave,
                                  ..Default::default()};
        self.mode_groups = ModeGroupTable::none();
        self.seamless_delay_count = 0;
        self.aeb_active = false;
        self.long_term_mode = false;
        self.need_stream_on_retention = true;
        self.need_recovery = false;
        self.data_calculation(0)?;
        self.refresh_bounds()?;
        info!("[init] {} id {:#06x} retention {:?}, {}x{}",
              self.desc.name, id, self.retention, self.data.cur_width, self.data.cur_height);
        Ok(())
    }

    pub fn deinit(&mut self) -> Result<(), CanonicalError> {
        if !self.load_retention && self.retention != RetentionState::Unsupported {
            info!("[deinit] reloading retention RAM");
            let handle = self.bus.clone();
            let mut bus = lock_bus(&handle)?;
            self.stream_on_with(&mut *bus)?;
            self.wait_streamon_with(&mut *bus, self.config.stream_on_timeout_cnt)?;
            self.stream_off_with(&mut *bus)?;
            self.wait_streamoff_with(&mut *bus)?;
        }
        self.clock.sleep_us(DEINIT_DELAY_US);
        info!("[deinit] {} done", self.desc.name);
        Ok(())
    }

    pub fn set_global_setting(&mut self) -> Result<(), CanonicalError> {
        let start = self.clock.now_us();
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        match self.retention {
            RetentionState::Unsupported => {
                apply_setfile(&mut *bus, &self.clock, self.desc.global_setting)?;
                self.load_calibration(&mut *bus, true)?;
            },
            RetentionState::Inactive => {
                self.retention_global_setting(&mut *bus)?;
                self.retention_prepare(&mut *bus)?;
            },
            RetentionState::Activated => {
                self.retention_crc_check(&mut *bus)?;
            },
        }
        info!("[set_global_setting] {} retention {:?} took {} us",
              self.desc.name, self.retention, self.clock.now_us() - start);
        Ok(())
    }

    fn load_calibration(&mut self, bus: &mut B, force: bool) -> Result<(), CanonicalError> {
        if force || !self.cal_loaded {
            if let Some(cal) = &self.calibration {
                self.cal_loaded = write_calibration(bus, self.desc.regs.cal_data_port,
                                                    cal.as_ref())?;
            }
        }
        apply_setfile(bus, &self.clock, self.desc.golden_cal)
    }

    fn retention_global_setting(&self, bus: &mut B) -> Result<(), CanonicalError> {
        match self.desc.retention {
            Some(ret) => apply_setfile(bus, &self.clock, ret.global),
            None => apply_setfile(bus, &self.clock, self.desc.global_setting),
        }
    }

    /// Loads every retained table into sensor RAM and waits for the sensor
    /// to report it ready.
    fn retention_prepare(&mut self, bus: &mut B) -> Result<(), CanonicalError> {
        let Some(ret) = self.desc.retention else {
            return Err(failed_precondition_error(
                format!("{} has no retention RAM", self.desc.name).as_str()));
        };
        self.load_calibration(bus, false)?;
        for table in ret.tables {
            apply_setfile(bus, &self.clock, table)?;
        }
        apply_setfile(bus, &self.clock, ret.finish)?;

        if self.need_stream_on_retention {
            self.stream_on_with(bus)?;
            self.wait_streamon_with(bus, self.config.retention_stream_on_retries)?;
            bus.write16(ret.checksum_enable, ret.ok_value)?;
            self.stream_off_with(bus)?;
            self.wait_streamoff_with(bus)?;
            self.need_stream_on_retention = false;
        }

        let mut ready = false;
        for _ in 0..self.config.retention_crc_poll_cnt {
            if bus.read16(ret.ram_ready)? == ret.ok_value {
                ready = true;
                break;
            }
            self.clock.sleep_us(self.config.retention_crc_poll_interval_us);
        }
        if !ready {
            error!("[retention_prepare] {} RAM not ready", self.desc.name);
            return Err(deadline_exceeded_error(
                format!("{}: retention RAM not ready after {} polls",
                        self.desc.name, self.config.retention_crc_poll_cnt).as_str()));
        }
        self.retention = RetentionState::Activated;
        info!("[retention_prepare] {} retention activated", self.desc.name);
        Ok(())
    }

    /// Verifies the retained RAM after a power transition, reloading it if
    /// the checksum does not match.
    fn retention_crc_check(&mut self, bus: &mut B) -> Result<(), CanonicalError> {
        let Some(ret) = self.desc.retention else {
            return Err(failed_precondition_error(
                format!("{} has no retention RAM", self.desc.name).as_str()));
        };
        let s = &self.desc.seamless;
        bus.write16(s.page_select, s.page_value)?;
        bus.write16(s.lock, s.unlock_value)?;
        let mut pending = true;
        for _ in 0..RETENTION_CRC_REQUEST_POLLS {
            if bus.read16(ret.checksum_enable)? == 0 {
                pending = false;
                break;
            }
            self.clock.sleep_us(RETENTION_CRC_REQUEST_INTERVAL_US);
        }
        if pending {
            warn!("[retention_crc_check] checksum request still pending");
        }
        let crc = bus.read16(ret.checksum_passed)?;
        if crc == ret.ok_value {
            bus.write16(self.desc.regs.test_pattern, 0)?;
            bus.write16(s.lock, s.lock_value)?;
            info!("[retention_crc_check] {} checksum passed", self.desc.name);
            return Ok(());
        }
        bus.write16(s.lock, s.lock_value)?;
        warn!("[retention_crc_check] {} checksum {:#06x}, reloading", self.desc.name, crc);
        self.retention_global_setting(bus)?;
        self.retention_prepare(bus)
    }

    /// Sensor lost power: the retained RAM must be reloaded.
    pub(crate) fn invalidate_retention(&mut self) {
        if self.retention != RetentionState::Unsupported {
            self.retention = RetentionState::Inactive;
            self.cal_loaded = false;
            self.need_stream_on_retention = true;
        }
    }

    /// Points the sensor at `mode`'s fast-change slot, loading its SRAM table
    /// first. While streaming the switch is deferred to a frame boundary.
    fn write_fast_change(&self, bus: &mut B, mode: usize) -> Result<(), CanonicalError> {
        let info = self.mode_info(mode)?;
        let Some(fci) = info.fast_change_idx else {
            return Err(failed_precondition_error(
                format!("mode {} {} has no fast change index", mode, info.name).as_str()));
        };
        if let Some(idx) = info.load_sram_idx {
            let Some(table) = self.desc.load_sram.get(idx) else {
                return Err(internal_error(
                    format!("mode {} load sram table {} missing", mode, idx).as_str()));
            };
            apply_setfile(bus, &self.clock, table)?;
        }
        let s = &self.desc.seamless;
        bus.write16(s.page_select, s.page_value)?;
        bus.write16(s.lock, s.unlock_value)?;
        if self.data.stream_on {
            bus.write16(s.fast_change_update, s.fast_change_update_value)?;
        }
        bus.write16(s.fast_change_idx, fci)?;
        bus.write16(s.lock, s.lock_value)?;
        debug!("[write_fast_change] mode {} fci {:#06x}", mode, fci);
        Ok(())
    }

    pub fn mode_change(&mut self, mode: usize) -> Result<(), CanonicalError> {
        let start = self.clock.now_us();
        let target = self.mode_info(mode)?;
        let fast_change = self.retention == RetentionState::Activated
            && target.fast_change_idx.is_some();
        if self.data.stream_on && !(fast_change && self.mode_groups.contains(mode)) {
            return Err(permission_denied_error(
                format!("{}: mode {} ({}) is not a seamless switch from mode {} while streaming",
                        self.desc.name, mode, target.name,
                        self.data.sens_config_index_cur).as_str()));
        }
        let groups = self.model.mode_groups(mode);

        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        if fast_change {
            self.write_fast_change(&mut *bus, mode)?;
        } else {
            let s = &self.desc.seamless;
            bus.write16(s.page_select, s.page_value)?;
            bus.write16(s.lock, s.unlock_value)?;
            bus.write16(s.fast_change_idx, s.fast_change_disabled)?;
            bus.write16(s.lock, s.lock_value)?;
            apply_setfile(&mut *bus, &self.clock, target.setfile)?;
        }
        if let Some(aeb) = self.in_place_aeb() {
            bus.write8(aeb.control, 0)?;
        }
        self.aeb_active = false;

        self.mode_groups = groups;
        self.data.sens_config_index_pre = Some(self.data.sens_config_index_cur);
        self.data.sens_config_index_cur = mode;
        let data = &mut self.data;
        data.cur_lownoise_mode = LowNoiseMode::Off;
        data.pre_lownoise_mode = LowNoiseMode::Off;
        data.cur_12bit_mode = TwelveBitMode::Off;
        data.pre_12bit_mode = TwelveBitMode::Off;
        data.cur_hdr_mode = HdrMode::Single;
        data.pre_hdr_mode = HdrMode::Single;
        data.cur_remosaic_zoom_ratio = 0;
        data.pre_remosaic_zoom_ratio = 0;
        self.data_calculation(mode)?;
        self.refresh_bounds()?;

        if self.retention == RetentionState::Activated {
            self.update_seamless_with(&mut *bus)?;
        }
        info!("[mode_change] {} mode {} {} (groups {}) took {} us",
              self.desc.name, mode, target.name, self.mode_groups,
              self.clock.now_us() - start);
        Ok(())
    }

    pub fn update_seamless_mode(&mut self) -> Result<bool, CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.update_seamless_with(&mut *bus)
    }

    fn commit_submodes(&mut self) {
        let data = &mut self.data;
        data.pre_lownoise_mode = data.cur_lownoise_mode;
        data.pre_12bit_mode = data.cur_12bit_mode;
        data.pre_hdr_mode = data.cur_hdr_mode;
        data.pre_remosaic_zoom_ratio = data.cur_remosaic_zoom_ratio;
    }

    /// In-place AEB. Returns None when AEB has nothing to do, so that the
    /// other sub-modes get evaluated.
    fn update_aeb_in_place(&mut self, bus: &mut B, aeb: &'static AebRegisters)
                           -> Result<Option<bool>, CanonicalError> {
        let hw_on = bus.read8(aeb.control)? != 0;
        let cur = self.cur_mode_info()?;
        let wanted = self.data.cur_hdr_mode == HdrMode::Aeb;
        if wanted && self.data.stream_on && cur.aeb_support {
            if hw_on {
                return Ok(Some(false));
            }
            let enable = if cur.bit_depth == ModeBitDepth::Pseudo12Bit {
                aeb.enable_pseudo12
            } else {
                aeb.enable_raw10
            };
            apply_setfile(bus, &self.clock, enable)?;
            self.aeb_active = true;
            self.seamless_delay_count = SEAMLESS_UPDATE_DELAY_FRAMES;
            info!("[update_seamless_mode] AEB on, mode {}", cur.name);
            return Ok(Some(true));
        }
        if hw_on {
            bus.write8(aeb.control, 0)?;
            self.aeb_active = false;
            info!("[update_seamless_mode] AEB off, mode {}", cur.name);
            return Ok(Some(true));
        }
        Ok(None)
    }

    /// The group member implementing the pending sub-mode requests. First
    /// request whose slot exists wins.
    pub(crate) fn resolve_seamless_target(&self, default_mode: usize) -> (usize, Option<ModeGroupSlot>) {
        let data = &self.data;
        let mut wanted = Vec::with_capacity(4);
        if matches!(self.desc.aeb, AebControl::ModeSwitch) && data.cur_hdr_mode == HdrMode::Aeb {
            wanted.push(if data.cur_12bit_mode == TwelveBitMode::Real12Bit {
                ModeGroupSlot::AebIdcg
            } else {
                ModeGroupSlot::Aeb
            });
        }
        match data.cur_lownoise_mode {
            LowNoiseMode::Ln2 => wanted.push(ModeGroupSlot::Ln2),
            LowNoiseMode::Ln4 => wanted.push(ModeGroupSlot::Ln4),
            LowNoiseMode::Off => (),
        }
        if data.cur_12bit_mode == TwelveBitMode::Real12Bit {
            wanted.push(ModeGroupSlot::Idcg);
        }
        if self.remosaic_requested() {
            wanted.push(ModeGroupSlot::CroppedRemosaic);
        }
        for slot in wanted {
            if let Some(mode) = self.mode_groups.get(slot) {
                return (mode, Some(slot));
            }
            debug!("[update_seamless_mode] no {:?} variant of mode {}", slot, default_mode);
        }
        (default_mode, None)
    }

    pub(crate) fn update_seamless_with(&mut self, bus: &mut B) -> Result<bool, CanonicalError> {
        if self.retention != RetentionState::Activated {
            return Err(failed_precondition_error(
                format!("{}: seamless mode change needs active retention, state {:?}",
                        self.desc.name, self.retention).as_str()));
        }
        self.seamless_delay_count = self.seamless_delay_count.saturating_sub(1);
        let Some(default_mode) = self.mode_groups.get(ModeGroupSlot::Default) else {
            return Err(failed_precondition_error("no mode selected yet"));
        };
        if self.mode_info(default_mode)?.fast_change_idx.is_none() {
            debug!("[update_seamless_mode] mode {} has no fast change", default_mode);
            return Ok(false);
        }
        if self.data.cur_pattern_mode != TestPatternMode::Off {
            return Ok(false);
        }

        if let Some(aeb) = self.in_place_aeb() {
            if let Some(changed) = self.update_aeb_in_place(bus, aeb)? {
                // Only the AEB request was acted on.
                self.data.pre_hdr_mode = self.data.cur_hdr_mode;
                return Ok(changed);
            }
        }

        let (next_mode, slot) = self.resolve_seamless_target(default_mode);
        let next = self.mode_info(next_mode)?;
        let Some(next_fci) = next.fast_change_idx else {
            self.commit_submodes();
            return Ok(false);
        };
        let hw_fci = bus.read16(self.desc.seamless.fast_change_idx)?;
        if hw_fci == next_fci && next_mode == self.data.sens_config_index_cur {
            self.commit_submodes();
            return Ok(false);
        }

        self.write_fast_change(bus, next_mode)?;
        self.data.sens_config_index_pre = Some(self.data.sens_config_index_cur);
        self.data.sens_config_index_cur = next_mode;
        self.data_calculation(next_mode)?;
        self.refresh_bounds()?;
        if next.low_noise > 0 || next.bit_depth == ModeBitDepth::Real12Bit {
            self.seamless_delay_count = SEAMLESS_UPDATE_DELAY_FRAMES;
        }
        self.commit_submodes();
        info!("[update_seamless_mode] {:?} -> mode {} {} fci {:#06x}",
              slot, next_mode, next.name, next_fci);
        Ok(true)
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> Result<(), CanonicalError> {
        if self.data.stream_on {
            return Err(failed_precondition_error("set_size requires stream off"));
        }
        let (max_w, max_h) = (self.desc.max_width, self.desc.max_height);
        if width == 0 || height == 0 || width > max_w || height > max_h {
            return Err(invalid_argument_error(
                format!("size {}x{} outside 1x1..{}x{}", width, height, max_w, max_h).as_str()));
        }
        let start_x = ((max_w - width) / 2) & !1;
        let start_y = ((max_h - height) / 2) & !1;
        let end_x = start_x + width - 1;
        let end_y = start_y + height - 1;

        let regs = &self.desc.regs;
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        bus.write16(regs.x_addr_start, start_x as u16)?;
        bus.write16(regs.y_addr_start, start_y as u16)?;
        bus.write16(regs.x_addr_end, end_x as u16)?;
        bus.write16(regs.y_addr_end, end_y as u16)?;
        bus.write16(regs.x_output_size, width as u16)?;
        bus.write16(regs.y_output_size, height as u16)?;

        self.data.cur_width = width;
        self.data.cur_height = height;
        let line_ns = self.data.timing.line_readout_time_ns;
        let timing = &mut self.data.timing;
        timing.frame_time_us = (line_ns * height as u64 / 1000) as u32;
        timing.frame_valid_us_time = timing.frame_time_us;
        timing.rolling_shutter_skew_ns = (height as u64 - 1) * line_ns;
        info!("[set_size] {}x{} at ({}, {}), frame time {} us",
              width, height, start_x, start_y, timing.frame_time_us);
        Ok(())
    }

    pub fn set_test_pattern(&mut self, mode: TestPatternMode) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        bus.write16(self.desc.regs.test_pattern, mode.register_value())?;
        self.data.cur_pattern_mode = mode;
        info!("[set_test_pattern] {:?}", mode);
        Ok(())
    }

    pub fn log_status(&mut self) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.log_status_with(&mut *bus);
        Ok(())
    }

    /// Dumps the status registers. Bus errors are logged, not returned: this
    /// runs on failure paths.
    pub(crate) fn log_status_with(&mut self, bus: &mut B) {
        // The probes below page and unlock the sensor behind the retained
        // RAM's back.
        if self.retention != RetentionState::Unsupported && !self.data.stream_on {
            self.retention = RetentionState::Inactive;
        }
        info!("[log_status] {} mode {} stream {} ({}) frame count {}",
              self.desc.name, self.data.sens_config_index_cur, self.data.stream_on,
              self.data.stream_state, self.data.sen_frame_count);
        for probe in self.desc.status_registers {
            match *probe {
                StatusProbe::Read8(addr, name) => match bus.read8(addr) {
                    Ok(v) => info!("[log_status] {}({:#06x}) = {:#04x}", name, addr, v),
                    Err(e) => warn!("[log_status] {}({:#06x}) failed: {:?}", name, addr, e),
                },
                StatusProbe::Read16(addr, name) => match bus.read16(addr) {
                    Ok(v) => info!("[log_status] {}({:#06x}) = {:#06x}", name, addr, v),
                    Err(e) => warn!("[log_status] {}({:#06x}) failed: {:?}", name, addr, e),
                },
                StatusProbe::Write16(addr, value, name) => {
                    if let Err(e) = bus.write16(addr, value) {
                        warn!("[log_status] {} failed: {:?}", name, e);
                    }
                },
            }
        }
    }

    /// Parameters written while stopped are not in the retained RAM.
    pub(crate) fn note_parameter_write(&mut self) {
        if !self.data.stream_on {
            self.load_retention = false;
        }
    }

    pub(crate) fn set_stream_state(&mut self, state: StreamState) {
        if self.data.stream_state != state {
            debug!("[stream_state] {} -> {}", self.data.stream_state, state);
            self.data.stream_state = state;
        }
    }
}

impl<B: RegisterBus, C: Clock> AbstractCis for Cis<B, C> {
    fn model(&self) -> &'static str {
        self.desc.name
    }

    fn data(&self) -> &SharedCisData {
        &self.data
    }

    fn init(&mut self) -> Result<(), CanonicalError> {
        Cis::init(self)
    }

    fn deinit(&mut self) -> Result<(), CanonicalError> {
        Cis::deinit(self)
    }

    fn set_global_setting(&mut self) -> Result<(), CanonicalError> {
        Cis::set_global_setting(self)
    }

    fn mode_change(&mut self, mode: usize) -> Result<(), CanonicalError> {
        Cis::mode_change(self, mode)
    }

    fn update_seamless_mode(&mut self) -> Result<bool, CanonicalError> {
        Cis::update_seamless_mode(self)
    }

    fn set_low_noise_mode(&mut self, mode: LowNoiseMode) {
        self.data.cur_lownoise_mode = mode;
    }

    fn set_12bit_mode(&mut self, mode: TwelveBitMode) {
        self.data.cur_12bit_mode = mode;
    }

    fn set_hdr_mode(&mut self, mode: HdrMode) {
        self.data.cur_hdr_mode = mode;
    }

    fn set_remosaic_zoom_ratio(&mut self, ratio: u32) {
        self.data.cur_remosaic_zoom_ratio = ratio;
    }

    fn set_size(&mut self, width: u32, height: u32) -> Result<(), CanonicalError> {
        Cis::set_size(self, width, height)
    }

    fn set_test_pattern(&mut self, mode: TestPatternMode) -> Result<(), CanonicalError> {
        Cis::set_test_pattern(self, mode)
    }

    fn stream_on(&mut self) -> Result<(), CanonicalError> {
        Cis::stream_on(self)
    }

    fn wait_streamon(&mut self) -> Result<(), CanonicalError> {
        Cis::wait_streamon(self)
    }

    fn stream_off(&mut self) -> Result<(), CanonicalError> {
        Cis::stream_off(self)
    }

    fn wait_streamoff(&mut self) -> Result<(), CanonicalError> {
        Cis::wait_streamoff(self)
    }

    fn group_param_hold(&mut self, hold: bool) -> Result<bool, CanonicalError> {
        Cis::group_param_hold(self, hold)
    }

    fn set_exposure_time(&mut self, target: &ExposureParam) -> Result<(), CanonicalError> {
        Cis::set_exposure_time(self, target)
    }

    fn get_min_exposure_time(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_min_exposure_time(self)
    }

    fn get_max_exposure_time(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_max_exposure_time(self)
    }

    fn adjust_frame_duration(&self, exposure_us: u32) -> u32 {
        Cis::adjust_frame_duration(self, exposure_us)
    }

    fn set_frame_duration(&mut self, duration_us: u32) -> Result<(), CanonicalError> {
        Cis::set_frame_duration(self, duration_us)
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<(), CanonicalError> {
        Cis::set_frame_rate(self, fps)
    }

    fn adjust_analog_gain(&self, permille: u32) -> u32 {
        Cis::adjust_analog_gain(self, permille)
    }

    fn set_analog_gain(&mut self, gain: &GainParam) -> Result<(), CanonicalError> {
        Cis::set_analog_gain(self, gain)
    }

    fn get_analog_gain(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_analog_gain(self)
    }

    fn get_min_analog_gain(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_min_analog_gain(self)
    }

    fn get_max_analog_gain(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_max_analog_gain(self)
    }

    fn set_digital_gain(&mut self, gain: &GainParam) -> Result<(), CanonicalError> {
        Cis::set_digital_gain(self, gain)
    }

    fn get_digital_gain(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_digital_gain(self)
    }

    fn get_min_digital_gain(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_min_digital_gain(self)
    }

    fn get_max_digital_gain(&mut self) -> Result<u32, CanonicalError> {
        Cis::get_max_digital_gain(self)
    }

    fn compensate_gain_for_extremely_br(&self, exposure_us: u32, again: u32, dgain: u32)
                                        -> Result<(u32, u32), CanonicalError> {
        Cis::compensate_gain_for_extremely_br(self, exposure_us, again, dgain)
    }

    fn set_long_term_exposure(&mut self, enable: bool, exposure_us: u32)
                              -> Result<(), CanonicalError> {
        Cis::set_long_term_exposure(self, enable, exposure_us)
    }

    fn log_status(&mut self) -> Result<(), CanonicalError> {
        Cis::log_status(self)
    }
}
