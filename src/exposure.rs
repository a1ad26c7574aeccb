use canonical_error::{CanonicalError, failed_precondition_error, invalid_argument_error};
use log::{debug, info};

use crate::abstract_cis::{ExposureParam, GainParam};
use crate::cis::{Cis, lock_bus};
use crate::cis_data::GainBound;
use crate::clock::Clock;
use crate::register_bus::RegisterBus;
use crate::sensor_mode::ModeGroupSlot;
use crate::timing::{MAX_SHIFTER, align_down, coarse_from_us, frame_length_from_us,
                    integration_us, raw_integration_pixels, shifter_for};

/// Long-term exposure halves the exposure until it fits in this.
const LONG_TERM_EXPOSURE_UNIT_US: u32 = 125_000;

fn div_ceil(num: u64, den: u64) -> u64 {
    (num + den - 1) / den
}

fn clamp_code(code: u32, min: u32, max: u32) -> u32 {
    code.max(min).min(max)
}

impl<B: RegisterBus, C: Clock> Cis<B, C> {
    pub fn set_exposure_time(&mut self, target: &ExposureParam) -> Result<(), CanonicalError> {
        if target.long_val == 0 || target.short_val == 0 {
            return Err(invalid_argument_error(
                format!("exposure {} must be positive", target).as_str()));
        }
        let start = self.clock.now_us();
        let mode = self.cur_mode_info()?;
        let data = &self.data;
        let (pclk, llp, min_fine) =
            (data.pclk, data.line_length_pck, data.min_fine_integration_time);
        let longest = target.long_val.max(target.short_val);
        let lines = coarse_from_us(pclk, llp, min_fine, longest)?;
        let shifter = shifter_for(lines, mode.min_cit_shifter)
            .max(data.frame_length_lines_shifter);
        let to_coarse = |exposure_us: u32| -> Result<u32, CanonicalError> {
            let raw = coarse_from_us(pclk, llp, min_fine, exposure_us >> shifter)?;
            let aligned = align_down(raw.min(u32::MAX as u64) as u32, mode.align_cit);
            Ok(aligned.max(data.min_coarse_integration_time)
                      .min(data.max_coarse_integration_time))
        };
        let long_coarse = to_coarse(target.long_val)?;
        let short_coarse = to_coarse(target.short_val)?;

        let regs = self.desc.regs;
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        if let Some(aeb) = self.active_aeb_luts() {
            bus.write16(aeb.lut_long + aeb.lut_offset_cit, long_coarse as u16)?;
            bus.write16(aeb.lut_short + aeb.lut_offset_cit, short_coarse as u16)?;
        } else {
            bus.write16(regs.coarse_integration_time, long_coarse as u16)?;
        }
        match regs.cit_shifter {
            Some(reg) => bus.write8(reg, shifter)?,
            None if shifter > 0 => debug!("[set_exposure_time] no shifter register"),
            None => (),
        }

        self.data.cur_long_exposure_coarse = long_coarse;
        self.data.cur_short_exposure_coarse = short_coarse;
        self.data.cur_cit_shifter = shifter;
        self.backup_exposure = *target;
        self.note_parameter_write();
        debug!("[set_exposure_time] {} us: coarse {}/{} shifter {}, took {} us",
               target, long_coarse, short_coarse, shifter, self.clock.now_us() - start);
        Ok(())
    }

    pub fn get_min_exposure_time(&mut self) -> Result<u32, CanonicalError> {
        let data = &self.data;
        let min = integration_us(data.pclk, data.line_length_pck,
                                 data.min_coarse_integration_time,
                                 data.min_fine_integration_time)?;
        self.data.min_exposure_us = min;
        Ok(min)
    }

    pub fn get_max_exposure_time(&mut self) -> Result<u32, CanonicalError> {
        let data = &self.data;
        let max_coarse = data.frame_length_lines
            .saturating_sub(data.max_margin_coarse_integration_time);
        let lines = max_coarse.saturating_mul(1 << data.frame_length_lines_shifter);
        let max = integration_us(data.pclk, data.line_length_pck, lines,
                                 data.max_fine_integration_time)?;
        self.data.max_coarse_integration_time = max_coarse;
        self.data.max_exposure_us = max;
        Ok(max)
    }

    pub fn adjust_frame_duration(&self, exposure_us: u32) -> u32 {
        let data = &self.data;
        let khz = data.pclk as u64 / 1000;
        let llp = data.line_length_pck as u64;
        let min_frame = data.timing.min_frame_us_time;
        if khz == 0 || llp == 0 {
            return min_frame.max(exposure_us);
        }
        let exposure = if exposure_us == 0 { min_frame } else { exposure_us };
        let raw = raw_integration_pixels(khz, data.min_fine_integration_time, exposure);
        let fll = raw / llp + data.max_margin_coarse_integration_time as u64;
        let duration = (fll * llp * 1000 / khz).min(u32::MAX as u64) as u32;
        if self.long_term_mode {
            duration
        } else {
            duration.max(min_frame)
        }
    }

    pub fn set_frame_duration(&mut self, duration_us: u32) -> Result<(), CanonicalError> {
        let data = &self.data;
        let duration = duration_us.max(data.timing.min_frame_us_time);
        let fll = frame_length_from_us(data.pclk, data.line_length_pck, duration)?;
        let min_shift = if self.long_term_mode { data.frame_length_lines_shifter } else { 0 };
        let shifter = shifter_for(fll, min_shift);
        let fll_reg = (fll >> shifter).min(0xFFFF) as u32;

        let regs = self.desc.regs;
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        if let Some(aeb) = self.active_aeb_luts() {
            // Each bracketed frame gets half of the duration.
            let half = (fll_reg / 2) as u16;
            bus.write16(aeb.lut_long + aeb.lut_offset_fll, half)?;
            bus.write16(aeb.lut_short + aeb.lut_offset_fll, half)?;
        } else {
            bus.write16(regs.frame_length_lines, fll_reg as u16)?;
            if let Some(reg) = regs.fll_shifter {
                bus.write8(reg, shifter)?;
            }
        }

        self.backup_frame_duration = duration;
        self.data.cur_frame_us_time = duration;
        self.data.frame_length_lines = fll_reg;
        self.data.frame_length_lines_shifter = shifter;
        self.get_max_exposure_time()?;
        self.note_parameter_write();
        debug!("[set_frame_duration] {} us: fll {} shifter {}", duration, fll_reg, shifter);
        Ok(())
    }

    pub fn set_frame_rate(&mut self, fps: u32) -> Result<(), CanonicalError> {
        let max_fps = self.data.timing.max_fps.max(1);
        let fps = fps.max(1).min(max_fps);
        self.set_frame_duration(1_000_000 / fps)?;
        self.data.timing.min_frame_us_time = self.data.cur_frame_us_time;
        info!("[set_frame_rate] {} fps, frame {} us", fps, self.data.cur_frame_us_time);
        Ok(())
    }

    pub fn adjust_analog_gain(&self, permille: u32) -> u32 {
        let codec = self.model.gain_codec();
        let code = clamp_code(codec.again_code(permille), self.data.min_analog_gain.code,
                              self.data.max_analog_gain.code);
        codec.again_permille(code)
    }

    pub fn set_analog_gain(&mut self, gain: &GainParam) -> Result<(), CanonicalError> {
        let codec = self.model.gain_codec();
        let (min, max) = (self.data.min_analog_gain.code, self.data.max_analog_gain.code);
        let long_code = clamp_code(codec.again_code(gain.long_val), min, max);
        let short_code = clamp_code(codec.again_code(gain.short_val), min, max);

        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        if let Some(aeb) = self.active_aeb_luts() {
            bus.write16(aeb.lut_long + aeb.lut_offset_again, long_code as u16)?;
            bus.write16(aeb.lut_short + aeb.lut_offset_again, short_code as u16)?;
        } else {
            bus.write16(self.desc.regs.analog_gain, long_code as u16)?;
        }
        self.backup_again = *gain;
        self.note_parameter_write();
        debug!("[set_analog_gain] {} permille: code {:#x}/{:#x}", gain, long_code, short_code);
        Ok(())
    }

    pub fn get_analog_gain(&mut self) -> Result<u32, CanonicalError> {
        let handle = self.bus.clone();
        let code = lock_bus(&handle)?.read16(self.desc.regs.analog_gain)?;
        Ok(self.model.gain_codec().again_permille(code as u32))
    }

    pub fn get_min_analog_gain(&mut self) -> Result<u32, CanonicalError> {
        let code = self.desc.min_analog_gain;
        let bound = GainBound{code, permille: self.model.gain_codec().again_permille(code)};
        self.data.min_analog_gain = bound;
        Ok(bound.permille)
    }

    /// Limited by the mode the pending sub-mode requests resolve to, so that
    /// a gain set now stays valid after the next seamless switch.
    pub fn get_max_analog_gain(&mut self) -> Result<u32, CanonicalError> {
        let cur = self.data.sens_config_index_cur;
        let mode = if self.aeb_active {
            cur
        } else {
            match self.mode_groups.get(ModeGroupSlot::Default) {
                Some(default_mode) => self.resolve_seamless_target(default_mode).0,
                None => cur,
            }
        };
        let code = self.mode_info(mode)?.max_analog_gain;
        let bound = GainBound{code, permille: self.model.gain_codec().again_permille(code)};
        self.data.max_analog_gain = bound;
        Ok(bound.permille)
    }

    pub fn set_digital_gain(&mut self, gain: &GainParam) -> Result<(), CanonicalError> {
        let codec = self.model.gain_codec();
        let (min, max) = (self.data.min_digital_gain.code, self.data.max_digital_gain.code);
        let long_code = clamp_code(codec.dgain_code(gain.long_val), min, max);
        let short_code = clamp_code(codec.dgain_code(gain.short_val), min, max);

        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        if let Some(aeb) = self.active_aeb_luts() {
            bus.write16(aeb.lut_long + aeb.lut_offset_dgain, long_code as u16)?;
            bus.write16(aeb.lut_short + aeb.lut_offset_dgain, short_code as u16)?;
        } else {
            bus.write16(self.desc.regs.digital_gain, long_code as u16)?;
        }
        self.backup_dgain = *gain;
        self.note_parameter_write();
        debug!("[set_digital_gain] {} permille: code {:#x}/{:#x}", gain, long_code, short_code);
        Ok(())
    }

    pub fn get_digital_gain(&mut self) -> Result<u32, CanonicalError> {
        let handle = self.bus.clone();
        let code = lock_bus(&handle)?.read16(self.desc.regs.digital_gain)?;
        Ok(self.model.gain_codec().dgain_permille(code as u32))
    }

    pub fn get_min_digital_gain(&mut self) -> Result<u32, CanonicalError> {
        let code = self.desc.min_digital_gain;
        let bound = GainBound{code, permille: self.model.gain_codec().dgain_permille(code)};
        self.data.min_digital_gain = bound;
        Ok(bound.permille)
    }

    pub fn get_max_digital_gain(&mut self) -> Result<u32, CanonicalError> {
        let code = self.cur_mode_info()?.max_digital_gain;
        let bound = GainBound{code, permille: self.model.gain_codec().dgain_permille(code)};
        self.data.max_digital_gain = bound;
        Ok(bound.permille)
    }

    /// An exposure of a handful of lines loses the fraction of a line that
    /// the coarse integration register cannot express. Scale analog gain up
    /// by the lost fraction, spilling into digital gain at the analog limit.
    /// Exposures below the minimum coarse integration are over-exposed by the
    /// sensor already and are returned unchanged.
    pub fn compensate_gain_for_extremely_br(&self, exposure_us: u32, again: u32, dgain: u32)
                                            -> Result<(u32, u32), CanonicalError> {
        let data = &self.data;
        let khz = data.pclk as u64 / 1000;
        let llp = data.line_length_pck as u64;
        if khz == 0 || llp == 0 {
            return Err(failed_precondition_error("frame timing not initialized"));
        }
        let mode = self.cur_mode_info()?;
        let raw = raw_integration_pixels(khz, data.min_fine_integration_time, exposure_us);
        let coarse = align_down((raw / llp).min(u32::MAX as u64) as u32, mode.align_cit);
        if coarse == 0 || coarse < data.min_coarse_integration_time
            || coarse > self.desc.cit_compensation_threshold
        {
            return Ok((again, dgain));
        }

        let expressed = llp * coarse as u64;
        let max_again = data.max_analog_gain.permille as u64;
        let again64 = again as u64;
        // Always at least one permille up while analog gain has headroom.
        let mut target = div_ceil(again64 * raw, expressed);
        if again64 < max_again {
            target = target.max(again64 + 1);
        }
        let new_again = target.min(max_again).max(again64);
        let mut new_dgain = dgain as u64;
        if target > new_again && new_again > 0 {
            new_dgain = div_ceil(new_dgain * target, new_again)
                .min(data.max_digital_gain.permille as u64)
                .max(dgain as u64);
        }
        debug!("[compensate_gain_for_extremely_br] {} us coarse {}: again {} -> {}, dgain {} -> {}",
               exposure_us, coarse, again, new_again, dgain, new_dgain);
        Ok((new_again as u32, new_dgain as u32))
    }

    /// Exposures past 125 ms program both shifters so that frame length and
    /// coarse integration count in units of 2^shift lines.
    pub fn set_long_term_exposure(&mut self, enable: bool, exposure_us: u32)
                                  -> Result<(), CanonicalError> {
        let regs = self.desc.regs;
        let (Some(fll_reg), Some(cit_reg)) = (regs.fll_shifter, regs.cit_shifter) else {
            return Err(failed_precondition_error(
                format!("{} has no shifter registers", self.desc.name).as_str()));
        };
        let mut shift = 0;
        if enable {
            let mut remaining = exposure_us;
            while remaining > LONG_TERM_EXPOSURE_UNIT_US && shift < MAX_SHIFTER {
                remaining /= 2;
                shift += 1;
            }
        }
        let s = self.desc.seamless;
        let handle = self.bus.clone();
        let mut bus = lock_bus(&handle)?;
        bus.write16(s.page_select, s.page_value)?;
        bus.write8(fll_reg, shift)?;
        bus.write8(cit_reg, shift)?;

        self.long_term_mode = shift > 0;
        self.data.frame_length_lines_shifter = shift;
        self.data.cur_cit_shifter = shift;
        info!("[set_long_term_exposure] enable {} {} us: shift {}", enable, exposure_us, shift);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use canonical_error::CanonicalErrorCode;

    use super::*;
    use crate::abstract_cis::{AbstractCis, AeParam, LowNoiseMode};
    use crate::clock::ManualClock;
    use crate::config::CisConfig;
    use crate::gn3::{self, S5KGN3};
    use crate::hm3::{self, S5KHM3};
    use crate::sim_bus::SimSensorBus;

    fn make_gn3() -> Cis<SimSensorBus, ManualClock> {
        let mut cis = Cis::new(SimSensorBus::for_sensor(&gn3::DESCRIPTOR), ManualClock::new(),
                               &S5KGN3, CisConfig::default());
        cis.init().unwrap();
        cis.mode_change(gn3::MODE_4080X3060_30FPS).unwrap();
        cis
    }

    fn peek16(cis: &Cis<SimSensorBus, ManualClock>, addr: u16) -> u16 {
        cis.bus.lock().unwrap().peek16(addr)
    }

    fn peek8(cis: &Cis<SimSensorBus, ManualClock>, addr: u16) -> u8 {
        cis.bus.lock().unwrap().peek8(addr)
    }

    #[test]
    fn test_exposure_bounds() {
        let mut cis = make_gn3();
        // (8800 * 4 + 256) * 1000 / 1760000
        assert_eq!(cis.get_min_exposure_time().unwrap(), 20);
        // (8800 * (6666 - 16) + 256) * 1000 / 1760000
        assert_eq!(cis.get_max_exposure_time().unwrap(), 33250);
    }

    #[test]
    fn test_zero_exposure_is_rejected() {
        let mut cis = make_gn3();
        cis.bus.lock().unwrap().clear_transactions();
        let err = cis.set_exposure_time(&AeParam{long_val: 1000, short_val: 0,
                                                 middle_val: 0}).unwrap_err();
        assert_eq!(err.code, CanonicalErrorCode::InvalidArgument);
        assert_eq!(cis.bus.lock().unwrap().write_count(), 0);
    }

    #[test]
    fn test_exposure_clamps_to_coarse_limits() {
        let mut cis = make_gn3();
        cis.set_exposure_time(&AeParam::uniform(1)).unwrap();
        assert_eq!(peek16(&cis, 0x0202), 4);
        cis.set_exposure_time(&AeParam::uniform(50_000)).unwrap();
        assert_eq!(peek16(&cis, 0x0202), 6650);
        assert_eq!(peek8(&cis, 0x0704), 0);
        cis.set_exposure_time(&AeParam::uniform(10_000)).unwrap();
        // (10000 * 1760 - 256) / 8800
        assert_eq!(peek16(&cis, 0x0202), 1999);
    }

    #[test]
    fn test_exposure_aligns_down() {
        let mut cis = make_gn3();
        cis.mode_change(gn3::MODE_4080X3060_30FPS_LN4).unwrap();
        cis.set_exposure_time(&AeParam::uniform(10_000)).unwrap();
        assert_eq!(peek16(&cis, 0x0202), 1996);
    }

    #[test]
    fn test_long_exposure_uses_shifter() {
        let mut cis = make_gn3();
        cis.set_exposure_time(&AeParam::uniform(10_000_000)).unwrap();
        // 2M lines need a shift of 5 to fit 16 bits.
        assert_eq!(peek8(&cis, 0x0704), 5);
        assert_eq!(cis.data.cur_cit_shifter, 5);
        assert_eq!(peek16(&cis, 0x0202), 6650);
    }

    #[test]
    fn test_aeb_exposure_goes_to_luts() {
        let mut cis = make_gn3();
        cis.aeb_active = true;
        cis.set_exposure_time(&AeParam{long_val: 10_000, short_val: 1000,
                                       middle_val: 0}).unwrap();
        assert_eq!(peek16(&cis, 0x0E12), 1999);
        assert_eq!(peek16(&cis, 0x0E20), 199);
        assert_eq!(peek16(&cis, 0x0202), 0);
        cis.set_analog_gain(&AeParam{long_val: 2000, short_val: 4000,
                                     middle_val: 0}).unwrap();
        assert_eq!(peek16(&cis, 0x0E14), 64);
        assert_eq!(peek16(&cis, 0x0E22), 128);
    }

    #[test]
    fn test_parameters_written_while_stopped_spoil_retention() {
        let mut cis = make_gn3();
        cis.load_retention = true;
        cis.set_exposure_time(&AeParam::uniform(10_000)).unwrap();
        assert!(!cis.load_retention);
    }

    #[test]
    fn test_adjust_frame_duration() {
        let cis = make_gn3();
        assert_eq!(cis.data.timing.min_frame_us_time, 33330);
        assert_eq!(cis.adjust_frame_duration(1000), 33330);
        // (19999 + 16) lines of 5 us.
        assert_eq!(cis.adjust_frame_duration(100_000), 100_075);
        assert!(cis.adjust_frame_duration(0) >= 33330);
    }

    #[test]
    fn test_frame_duration_shifter() {
        let mut cis = make_gn3();
        cis.set_frame_duration(2_000_000).unwrap();
        // 400000 lines, shifted by 3.
        assert_eq!(peek16(&cis, 0x0340), 50000);
        assert_eq!(peek8(&cis, 0x0702), 3);
        assert_eq!(cis.data.max_coarse_integration_time, 50000 - 16);
        assert!(cis.data.max_exposure_us > 1_900_000);
        // Too short a frame clamps to the mode's minimum.
        cis.set_frame_duration(1000).unwrap();
        assert_eq!(cis.data.cur_frame_us_time, 33330);
        assert_eq!(peek8(&cis, 0x0702), 0);
    }

    #[test]
    fn test_set_frame_rate() {
        let mut cis = make_gn3();
        cis.set_frame_rate(10).unwrap();
        assert_eq!(cis.data.cur_frame_us_time, 100_000);
        assert_eq!(peek16(&cis, 0x0340), 20000);
        assert_eq!(cis.data.timing.min_frame_us_time, 100_000);
        cis.set_frame_rate(0).unwrap();
        assert_eq!(cis.data.cur_frame_us_time, 1_000_000);
    }

    #[test]
    fn test_analog_gain_clamping() {
        let mut cis = make_gn3();
        assert_eq!(cis.adjust_analog_gain(500), 1000);
        assert_eq!(cis.adjust_analog_gain(100_000), 64000);
        assert_eq!(cis.adjust_analog_gain(1500), 1500);
        cis.set_analog_gain(&AeParam::uniform(1500)).unwrap();
        assert_eq!(peek16(&cis, 0x0204), 48);
        assert_eq!(cis.get_analog_gain().unwrap(), 1500);
        cis.set_analog_gain(&AeParam::uniform(1_000_000)).unwrap();
        assert_eq!(peek16(&cis, 0x0204), 0x800);
    }

    #[test]
    fn test_digital_gain() {
        let mut cis = make_gn3();
        assert_eq!(cis.get_min_digital_gain().unwrap(), 1000);
        assert_eq!(cis.get_max_digital_gain().unwrap(), 16000);
        cis.set_digital_gain(&AeParam::uniform(2000)).unwrap();
        assert_eq!(peek16(&cis, 0x020E), 0x200);
        assert_eq!(cis.get_digital_gain().unwrap(), 2000);
    }

    #[test]
    fn test_max_analog_gain_follows_pending_submode() {
        let mut cis = make_gn3();
        assert_eq!(cis.get_max_analog_gain().unwrap(), 64000);
        AbstractCis::set_low_noise_mode(&mut cis, LowNoiseMode::Ln2);
        assert_eq!(cis.get_max_analog_gain().unwrap(), 16000);
    }

    #[test]
    fn test_q10_gain_codes() {
        let mut cis = Cis::new(SimSensorBus::for_sensor(&hm3::DESCRIPTOR), ManualClock::new(),
                               &S5KHM3, CisConfig::default());
        cis.init().unwrap();
        cis.mode_change(hm3::MODE_4000X3000_30FPS).unwrap();
        cis.set_analog_gain(&AeParam::uniform(2000)).unwrap();
        assert_eq!(peek16(&cis, 0x0204), 2048);
        assert_eq!(cis.get_max_analog_gain().unwrap(), 16000);
    }

    #[test]
    fn test_compensation_raises_analog_gain() {
        let cis = make_gn3();
        // 100 us is 19.97 lines; the register holds 19.
        let (again, dgain) = cis.compensate_gain_for_extremely_br(100, 2000, 1000).unwrap();
        assert_eq!(again, 2103);
        assert_eq!(dgain, 1000);
        let (again, _) = cis.compensate_gain_for_extremely_br(25, 2000, 1000).unwrap();
        assert!(again > 2000);
    }

    #[test]
    fn test_compensation_spills_into_digital_gain() {
        let cis = make_gn3();
        let (again, dgain) = cis.compensate_gain_for_extremely_br(100, 64000, 1000).unwrap();
        assert_eq!(again, 64000);
        assert_eq!(dgain, 1052);
    }

    #[test]
    fn test_compensation_skipped_below_min_coarse() {
        let cis = make_gn3();
        // 10 us is under two lines, raised to the 4 line minimum.
        for exposure_us in [1, 10, 19] {
            assert_eq!(cis.compensate_gain_for_extremely_br(exposure_us, 2000, 1000).unwrap(),
                       (2000, 1000));
        }
    }

    #[test]
    fn test_compensation_with_whole_lines_still_raises_gain() {
        let mut cis = make_gn3();
        cis.data.min_fine_integration_time = 0;
        // 100 us is exactly 20 lines.
        let (again, dgain) = cis.compensate_gain_for_extremely_br(100, 2000, 1000).unwrap();
        assert_eq!(again, 2001);
        assert_eq!(dgain, 1000);
    }

    #[test]
    fn test_compensation_never_lowers_gain() {
        let cis = make_gn3();
        let max = cis.data.max_analog_gain.permille;
        for exposure_us in (1..600).step_by(7) {
            for again in [1000, 2000, 16000, max - 1, max] {
                let (a, d) = cis.compensate_gain_for_extremely_br(exposure_us, again, 1000)
                    .unwrap();
                assert!(a >= again && d >= 1000, "{} us again {}: {}/{}",
                        exposure_us, again, a, d);
            }
        }
    }

    #[test]
    fn test_no_compensation_for_long_exposures() {
        let cis = make_gn3();
        assert_eq!(cis.compensate_gain_for_extremely_br(10_000, 2000, 1000).unwrap(),
                   (2000, 1000));
    }

    #[test]
    fn test_long_term_exposure() {
        let mut cis = make_gn3();
        cis.set_long_term_exposure(true, 1_000_000).unwrap();
        assert_eq!(peek8(&cis, 0x0702), 3);
        assert_eq!(peek8(&cis, 0x0704), 3);
        assert!(cis.long_term_mode);
        // Not clamped to the mode's minimum frame time.
        assert!(cis.adjust_frame_duration(1000) < 33330);
        cis.set_frame_duration(1_000_000).unwrap();
        assert_eq!(cis.data.frame_length_lines_shifter, 3);

        cis.set_long_term_exposure(false, 0).unwrap();
        assert_eq!(peek8(&cis, 0x0702), 0);
        assert!(!cis.long_term_mode);
    }
}
