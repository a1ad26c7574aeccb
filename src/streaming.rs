use canonical_error::{CanonicalError, deadline_exceeded_error, unavailable_error};
use log::{debug, error, info, warn};

use crate::abstract_cis::{RetentionState, StreamState, TestPatternMode};
use crate::cis::{Cis, lock_bus};
use crate::clock::Clock;
use crate::register_bus::RegisterBus;

const POWER_CYCLE_DELAY_US: u64 = 10_000;
const RETENTION_READY_POLLS: u32 = 4;
const RETENTION_READY_INTERVAL_US: u64 = 500;
const SEAMLESS_UPDATE_DELAY_US: u64 = 100_000;

/// Board hook for powering the sensor down and back up. Used when the
/// sensor stops answering on the bus during stream-on.
pub trait PowerSequence: Send {
    fn power_off(&mut self) -> Result<(), CanonicalError>;
    fn power_on(&mut self) -> Result<(), CanonicalError>;
}

impl<B: RegisterBus, C: Clock> Cis<B, C> {
    pub fn stream_on(&mut self) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.stream_on_with(&mut *bus)
    }

    pub(crate) fn stream_on_with(&mut self, bus: &mut B) -> Result<(), CanonicalError> {
        let start = self.clock.now_us();
        self.mipi_clock_index_cur = None;
        let s = &self.desc.seamless;
        let regs = &self.desc.regs;
        bus.write16(s.page_select, s.page_value)?;
        bus.write16(s.lock, s.unlock_value)?;
        let fci = bus.read16(s.fast_change_idx)?;
        if self.retention != RetentionState::Unsupported {
            if let Some(ret) = self.desc.retention {
                bus.write16(ret.ram_ready, 0)?;
            }
            bus.write16(s.fast_change_update, 0)?;
        }
        bus.write16(s.lock, s.lock_value)?;
        bus.write16(regs.mode_select, regs.stream_on_value)?;

        self.data.stream_on = true;
        self.load_retention = true;
        self.set_stream_state(StreamState::Streaming);
        info!("[stream_on] {} mode {} fci {:#06x} took {} us",
              self.desc.name, self.data.sens_config_index_cur, fci,
              self.clock.now_us() - start);
        Ok(())
    }

    fn poll_budget(&self, base: u32) -> u32 {
        if self.long_term_mode || self.data.dual_sync_slave
            || self.data.cur_frame_us_time >= self.config.long_frame_threshold_us
        {
            base.saturating_mul(self.config.long_wait_multiplier)
        } else {
            base
        }
    }

    pub fn wait_streamon(&mut self) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.wait_streamon_with(&mut *bus, self.config.stream_on_timeout_cnt)
    }

    /// Polls the frame counter at most `timeout_cnt` times (extended for long
    /// frames) until it leaves the stream-off sentinel.
    pub(crate) fn wait_streamon_with(&mut self, bus: &mut B, timeout_cnt: u32)
                                     -> Result<(), CanonicalError> {
        let start = self.clock.now_us();
        let frame_count_reg = self.desc.regs.frame_count;
        let sentinel = self.desc.stream_off_sentinel;
        let budget = self.poll_budget(timeout_cnt);
        let threshold = bus.kind().failure_threshold();
        let mut failures = 0;
        for poll in 0..budget {
            match bus.read8(frame_count_reg) {
                Ok(count) => {
                    failures = 0;
                    if count != sentinel {
                        self.data.sen_frame_count = count;
                        info!("[wait_streamon] {} frame count {} after {} polls, {} us",
                              self.desc.name, count, poll + 1, self.clock.now_us() - start);
                        return Ok(());
                    }
                },
                Err(e) => {
                    failures += 1;
                    warn!("[wait_streamon] frame count read failed ({}): {:?}", failures, e);
                    if failures >= threshold {
                        error!("[wait_streamon] {} bus failures on {:?}, power cycling",
                               failures, bus.kind());
                        self.power_cycle();
                        return Err(unavailable_error(
                            format!("{}: {} consecutive bus failures waiting for stream on",
                                    self.desc.name, failures).as_str()));
                    }
                },
            }
            self.clock.sleep_us(self.config.poll_interval_us);
        }

        error!("[wait_streamon] {} timed out after {} polls", self.desc.name, budget);
        self.log_status_with(bus);
        let regs = &self.desc.regs;
        match bus.write16(regs.mode_select, regs.stream_off_value) {
            Ok(()) => {
                if let Err(e) = self.wait_streamoff_with(bus) {
                    warn!("[wait_streamon] stream off after timeout not confirmed: {:?}", e);
                }
            },
            Err(e) => warn!("[wait_streamon] stream off after timeout failed: {:?}", e),
        }
        Err(deadline_exceeded_error(
            format!("{}: stream on not confirmed after {} polls",
                    self.desc.name, budget).as_str()))
    }

    fn power_cycle(&mut self) {
        match self.power.as_mut() {
            Some(power) => {
                if let Err(e) = power.power_off() {
                    warn!("[power_cycle] power off failed: {:?}", e);
                }
                self.clock.sleep_us(POWER_CYCLE_DELAY_US);
                if let Err(e) = power.power_on() {
                    warn!("[power_cycle] power on failed: {:?}", e);
                }
            },
            None => warn!("[power_cycle] no power sequence for {}", self.desc.name),
        }
        self.invalidate_retention();
        self.need_recovery = true;
    }

    pub fn stream_off(&mut self) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.stream_off_with(&mut *bus)
    }

    pub(crate) fn stream_off_with(&mut self, bus: &mut B) -> Result<(), CanonicalError> {
        let start = self.clock.now_us();
        self.group_param_hold_with(bus, false)?;
        if let Some(aeb) = self.in_place_aeb() {
            if bus.read8(aeb.control)? != 0 {
                bus.write8(aeb.control, 0)?;
                info!("[stream_off] AEB off");
            }
            self.aeb_active = false;
        }
        self.data.sen_frame_count = bus.read8(self.desc.regs.frame_count)?;

        let s = &self.desc.seamless;
        let regs = &self.desc.regs;
        bus.write16(s.page_select, s.page_value)?;
        bus.write16(s.lock, s.unlock_value)?;
        let fci = bus.read16(s.fast_change_idx)?;
        if self.retention != RetentionState::Unsupported {
            if let Some(ret) = self.desc.retention {
                bus.write16(ret.checksum_enable, ret.ok_value)?;
                bus.write16(ret.checksum_passed, 0)?;
            }
            if self.retention == RetentionState::Inactive {
                self.retention = RetentionState::Activated;
            }
        }
        bus.write16(s.lock, s.lock_value)?;
        bus.write16(regs.mode_select, regs.stream_off_value)?;

        self.data.stream_on = false;
        self.set_stream_state(StreamState::Stopping);
        info!("[stream_off] {} frame count {} fci {:#06x} took {} us",
              self.desc.name, self.data.sen_frame_count, fci, self.clock.now_us() - start);
        Ok(())
    }

    pub fn wait_streamoff(&mut self) -> Result<(), CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.wait_streamoff_with(&mut *bus)
    }

    pub(crate) fn wait_streamoff_with(&mut self, bus: &mut B) -> Result<(), CanonicalError> {
        let start = self.clock.now_us();
        let frame_count_reg = self.desc.regs.frame_count;
        let sentinel = self.desc.stream_off_sentinel;
        let budget = self.poll_budget(self.config.stream_off_timeout_cnt);
        let threshold = bus.kind().failure_threshold();
        let mut failures = 0;
        let mut stopped = false;
        for poll in 0..budget {
            match bus.read8(frame_count_reg) {
                Ok(count) => {
                    failures = 0;
                    if count == sentinel {
                        debug!("[wait_streamoff] stopped after {} polls", poll + 1);
                        stopped = true;
                        break;
                    }
                },
                Err(e) => {
                    failures += 1;
                    warn!("[wait_streamoff] frame count read failed ({}): {:?}", failures, e);
                    if failures >= threshold {
                        return Err(unavailable_error(
                            format!("{}: {} consecutive bus failures waiting for stream off",
                                    self.desc.name, failures).as_str()));
                    }
                },
            }
            self.clock.sleep_us(self.config.poll_interval_us);
        }
        if !stopped {
            error!("[wait_streamoff] {} timed out after {} polls", self.desc.name, budget);
            return Err(deadline_exceeded_error(
                format!("{}: stream off not confirmed after {} polls",
                        self.desc.name, budget).as_str()));
        }

        if self.retention != RetentionState::Unsupported {
            if let Some(ret) = self.desc.retention {
                let mut ready = false;
                for _ in 0..RETENTION_READY_POLLS {
                    if bus.read16(ret.ram_ready)? == ret.ok_value {
                        ready = true;
                        break;
                    }
                    self.clock.sleep_us(RETENTION_READY_INTERVAL_US);
                }
                if !ready {
                    warn!("[wait_streamoff] retention RAM not ready");
                }
            }
        }
        self.set_stream_state(StreamState::Stopped);
        info!("[wait_streamoff] {} took {} us", self.desc.name, self.clock.now_us() - start);
        Ok(())
    }

    pub fn group_param_hold(&mut self, hold: bool) -> Result<bool, CanonicalError> {
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        self.group_param_hold_with(&mut *bus, hold)
    }

    pub(crate) fn group_param_hold_with(&mut self, bus: &mut B, hold: bool)
                                        -> Result<bool, CanonicalError> {
        if hold == self.data.group_param_hold {
            return Ok(false);
        }
        if hold && (!self.data.stream_on
                    || self.data.cur_pattern_mode != TestPatternMode::Off) {
            debug!("[group_param_hold] skipped, stream on {} pattern {:?}",
                   self.data.stream_on, self.data.cur_pattern_mode);
            return Ok(false);
        }
        bus.write8(self.desc.regs.group_param_hold, hold as u8)?;
        self.data.group_param_hold = hold;
        Ok(true)
    }

    /// Brings a power-cycled sensor back to where the caller left it: global
    /// setting, current mode, last frame duration, gains and exposure, then
    /// streaming.
    pub fn recover_stream_on(&mut self) -> Result<(), CanonicalError> {
        let mode = self.data.sens_config_index_cur;
        warn!("[recover_stream_on] {} mode {}", self.desc.name, mode);
        self.invalidate_retention();
        self.data.stream_on = false;
        self.data.group_param_hold = false;
        self.set_global_setting()?;
        self.mode_change(mode)?;
        if self.backup_frame_duration > 0 {
            self.set_frame_duration(self.backup_frame_duration)?;
        }
        let again = self.backup_again;
        if again.long_val > 0 {
            self.set_analog_gain(&again)?;
        }
        let dgain = self.backup_dgain;
        if dgain.long_val > 0 {
            self.set_digital_gain(&dgain)?;
        }
        let exposure = self.backup_exposure;
        if exposure.long_val > 0 && exposure.short_val > 0 {
            self.set_exposure_time(&exposure)?;
        }
        self.stream_on()?;
        self.wait_streamon()?;
        self.need_recovery = false;
        info!("[recover_stream_on] {} recovered", self.desc.name);
        Ok(())
    }

    pub fn recover_stream_off(&mut self) -> Result<(), CanonicalError> {
        warn!("[recover_stream_off] {}", self.desc.name);
        self.invalidate_retention();
        self.set_global_setting()?;
        self.stream_off()?;
        self.wait_streamoff()
    }

    /// Blocks for the frames a seamless switch needs to settle.
    pub fn wait_seamless_update_delay(&mut self) {
        if self.seamless_delay_count == 0 {
            return;
        }
        info!("[wait_seamless_update_delay] {} frames", self.seamless_delay_count);
        self.clock.sleep_us(SEAMLESS_UPDATE_DELAY_US * self.seamless_delay_count as u64);
        self.seamless_delay_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use canonical_error::CanonicalErrorCode;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CisConfig;
    use crate::gn3::{self, S5KGN3};
    use crate::register_bus::BusKind;
    use crate::sim_bus::{BusTransaction, FrameCounterBehavior, SimSensorBus};

    fn make_cis(bus: SimSensorBus, config: CisConfig) -> (Cis<SimSensorBus, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut cis = Cis::new(bus, clock.clone(), &S5KGN3, config);
        cis.init().unwrap();
        cis.mode_change(gn3::MODE_4080X3060_30FPS).unwrap();
        (cis, clock)
    }

    struct CountingPower {
        cycles: Arc<AtomicU32>,
    }

    impl PowerSequence for CountingPower {
        fn power_off(&mut self) -> Result<(), CanonicalError> {
            Ok(())
        }
        fn power_on(&mut self) -> Result<(), CanonicalError> {
            self.cycles.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_stream_on_off_states() {
        let (mut cis, _) = make_cis(SimSensorBus::for_sensor(&gn3::DESCRIPTOR),
                                    CisConfig::default());
        assert_eq!(cis.data.stream_state, StreamState::Init);
        cis.stream_on().unwrap();
        assert!(cis.data.stream_on);
        assert!(cis.bus.lock().unwrap().is_streaming());
        cis.wait_streamon().unwrap();
        assert_eq!(cis.data.stream_state, StreamState::Streaming);
        cis.stream_off().unwrap();
        assert_eq!(cis.data.stream_state, StreamState::Stopping);
        cis.wait_streamoff().unwrap();
        assert_eq!(cis.data.stream_state, StreamState::Stopped);
        assert!(!cis.data.stream_on);
    }

    #[test]
    fn test_wait_streamon_polls_until_counter_moves() {
        let mut bus = SimSensorBus::for_sensor(&gn3::DESCRIPTOR);
        bus.set_startup_reads(7);
        let (mut cis, clock) = make_cis(bus, CisConfig::default());
        cis.stream_on().unwrap();
        cis.wait_streamon().unwrap();
        assert_eq!(cis.bus.lock().unwrap().reads_of(0x0005), 8);
        assert_eq!(clock.sleep_count(), 7);
    }

    #[test]
    fn test_wait_streamon_timeout() {
        let mut bus = SimSensorBus::for_sensor(&gn3::DESCRIPTOR);
        bus.set_frame_counter(FrameCounterBehavior::StuckOff);
        let (mut cis, _) = make_cis(bus, CisConfig::default());
        cis.stream_on().unwrap();
        cis.bus.lock().unwrap().clear_transactions();
        let err = cis.wait_streamon().unwrap_err();
        assert_eq!(err.code, CanonicalErrorCode::DeadlineExceeded);
        assert!(cis.data.stream_on);
        let bus = cis.bus.lock().unwrap();
        assert_eq!(bus.last_write16(0x0100), Some(0x0003));
        // 250 stream-on polls, then the forced stream off is confirmed.
        let log = bus.transactions();
        let off = log.iter().position(|t| *t == BusTransaction::Write16(0x0100, 0x0003))
            .unwrap();
        let polls = |ts: &[BusTransaction]| {
            ts.iter().filter(|t| **t == BusTransaction::Read8(0x0005)).count()
        };
        assert_eq!(polls(&log[..off]), 250);
        assert_eq!(polls(&log[off..]), 1);
        assert_eq!(cis.data.stream_state, StreamState::Stopped);
    }

    #[test]
    fn test_long_frames_extend_poll_budget() {
        let mut bus = SimSensorBus::for_sensor(&gn3::DESCRIPTOR);
        bus.set_frame_counter(FrameCounterBehavior::StuckOff);
        let config = CisConfig{stream_on_timeout_cnt: 10, ..Default::default()};
        let (mut cis, _) = make_cis(bus, config);
        cis.set_frame_duration(200_000).unwrap();
        cis.stream_on().unwrap();
        assert!(cis.wait_streamon().is_err());
        // 60 stream-on polls plus the stream-off confirmation.
        assert_eq!(cis.bus.lock().unwrap().reads_of(0x0005), 61);
    }

    #[test]
    fn test_bus_failures_power_cycle() {
        let bus = SimSensorBus::for_sensor(&gn3::DESCRIPTOR).with_kind(BusKind::I3c);
        let cycles = Arc::new(AtomicU32::new(0));
        let clock = ManualClock::new();
        let mut cis = Cis::new(bus, clock, &S5KGN3, CisConfig::default().with_retention())
            .with_power_sequence(Box::new(CountingPower{cycles: cycles.clone()}));
        cis.init().unwrap();
        cis.retention = RetentionState::Activated;
        cis.stream_on().unwrap();
        cis.bus.lock().unwrap().fail_reads_of(0x0005);
        let err = cis.wait_streamon().unwrap_err();
        assert_eq!(err.code, CanonicalErrorCode::Unavailable);
        assert_eq!(cis.bus.lock().unwrap().reads_of(0x0005), 3);
        assert_eq!(cycles.load(Ordering::SeqCst), 1);
        assert!(cis.needs_recovery());
        assert_eq!(cis.retention_state(), RetentionState::Inactive);
    }

    #[test]
    fn test_wait_streamoff_timeout_and_failures() {
        let mut bus = SimSensorBus::for_sensor(&gn3::DESCRIPTOR);
        bus.set_frame_counter(FrameCounterBehavior::StuckOn);
        let (mut cis, _) = make_cis(bus, CisConfig::default());
        cis.stream_off().unwrap();
        let err = cis.wait_streamoff().unwrap_err();
        assert_eq!(err.code, CanonicalErrorCode::DeadlineExceeded);

        cis.bus.lock().unwrap().fail_reads_of(0x0005);
        let err = cis.wait_streamoff().unwrap_err();
        assert_eq!(err.code, CanonicalErrorCode::Unavailable);
    }

    #[test]
    fn test_group_param_hold_skip_conditions() {
        let (mut cis, _) = make_cis(SimSensorBus::for_sensor(&gn3::DESCRIPTOR),
                                    CisConfig::default());
        // Not streaming yet.
        assert!(!cis.group_param_hold(true).unwrap());
        cis.stream_on().unwrap();
        assert!(cis.group_param_hold(true).unwrap());
        assert!(!cis.group_param_hold(true).unwrap());
        assert_eq!(cis.bus.lock().unwrap().peek8(0x0104), 1);
        assert!(cis.group_param_hold(false).unwrap());

        cis.set_test_pattern(TestPatternMode::ColorBars).unwrap();
        assert!(!cis.group_param_hold(true).unwrap());
    }

    #[test]
    fn test_stream_off_releases_hold() {
        let (mut cis, _) = make_cis(SimSensorBus::for_sensor(&gn3::DESCRIPTOR),
                                    CisConfig::default());
        cis.stream_on().unwrap();
        cis.group_param_hold(true).unwrap();
        cis.stream_off().unwrap();
        assert!(!cis.data.group_param_hold);
        assert!(cis.bus.lock().unwrap().transactions()
                .contains(&BusTransaction::Write8(0x0104, 0)));
    }

    #[test]
    fn test_recover_stream_on_replays_parameters() {
        let (mut cis, _) = make_cis(SimSensorBus::for_sensor(&gn3::DESCRIPTOR),
                                    CisConfig::default());
        cis.set_frame_duration(50_000).unwrap();
        cis.set_analog_gain(&crate::abstract_cis::AeParam::uniform(4000)).unwrap();
        cis.set_exposure_time(&crate::abstract_cis::AeParam::uniform(10_000)).unwrap();
        cis.need_recovery = true;
        let handle = cis.bus_handle();
        handle.lock().unwrap().poke16(0x0340, 0);
        handle.lock().unwrap().poke16(0x0204, 0);
        cis.recover_stream_on().unwrap();
        assert!(!cis.needs_recovery());
        assert!(cis.data.stream_on);
        let bus = handle.lock().unwrap();
        assert_eq!(bus.peek16(0x0340), 10000);
        assert_eq!(bus.peek16(0x0204), 128);
        assert!(bus.peek16(0x0202) > 0);
    }

    #[test]
    fn test_wait_seamless_update_delay() {
        let (mut cis, clock) = make_cis(SimSensorBus::for_sensor(&gn3::DESCRIPTOR),
                                        CisConfig::default());
        let before = clock.now_us();
        cis.seamless_delay_count = 3;
        cis.wait_seamless_update_delay();
        assert_eq!(clock.now_us() - before, 300_000);
        assert_eq!(cis.seamless_delay_count(), 0);
        cis.wait_seamless_update_delay();
        assert_eq!(clock.now_us() - before, 300_000);
    }
}
