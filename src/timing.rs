// Frame timing arithmetic. Everything here is a pure function of the PLL
// parameters, so the controller can recompute its cached values after every
// mode or size change.

use canonical_error::{CanonicalError, failed_precondition_error};

use crate::sensor_mode::PllInfo;

/// Coarse integration and frame length registers are 16 bits wide; longer
/// values are expressed with a power-of-two shifter of at most this much.
pub const MAX_SHIFTER: u8 = 6;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameTiming {
    pub min_frame_us_time: u32,
    pub max_fps: u32,
    pub line_readout_time_ns: u64,
    pub frame_valid_us_time: u32,
    pub frame_time_us: u32,
    pub rolling_shutter_skew_ns: u64,
}

/// Derives frame timing for `pll` at an output height of `cur_height` lines.
pub fn frame_timing(pll: &PllInfo, cur_height: u32)
                    -> Result<FrameTiming, CanonicalError> {
    let pclk = pll.pclk as u64;
    if pclk == 0 {
        return Err(failed_precondition_error("pixel clock is zero"));
    }
    let llp = pll.line_length_pck as u64;
    let fll = pll.frame_length_lines as u64;
    if llp == 0 || fll == 0 {
        return Err(failed_precondition_error(
            format!("invalid frame geometry fll {} llp {}", fll, llp).as_str()));
    }
    let frame_pixels = fll * llp;

    // Round-to-nearest on the tenths digit.
    let frame_rate = pclk / frame_pixels;
    let frame_rate_x10 = pclk * 10 / frame_pixels;
    let max_fps = if frame_rate_x10 % 10 >= 5 { frame_rate + 1 } else { frame_rate };

    let line_readout_time_ns = llp * 1_000_000_000 / pclk;
    let height = cur_height as u64;
    Ok(FrameTiming{
        min_frame_us_time: (frame_pixels * 1_000_000 / pclk) as u32,
        max_fps: max_fps as u32,
        line_readout_time_ns,
        frame_valid_us_time: (height * llp * 1_000_000 / pclk) as u32,
        frame_time_us: (line_readout_time_ns * height / 1000) as u32,
        rolling_shutter_skew_ns: height.saturating_sub(1) * line_readout_time_ns,
    })
}

fn pclk_khz(pclk: u32) -> Result<u64, CanonicalError> {
    let khz = pclk as u64 / 1000;
    if khz == 0 {
        return Err(failed_precondition_error("pixel clock below 1 kHz"));
    }
    Ok(khz)
}

/// Converts an integration time in line and pixel units to microseconds.
pub fn integration_us(pclk: u32, line_length_pck: u32, coarse: u32, fine: u32)
                      -> Result<u32, CanonicalError> {
    let khz = pclk_khz(pclk)?;
    Ok(((line_length_pck as u64 * coarse as u64 + fine as u64) * 1000 / khz) as u32)
}

/// Number of whole lines needed for an exposure of `exposure_us`, before any
/// alignment or clamping.
pub fn coarse_from_us(pclk: u32, line_length_pck: u32, min_fine: u32, exposure_us: u32)
                      -> Result<u64, CanonicalError> {
    let khz = pclk_khz(pclk)?;
    if line_length_pck == 0 {
        return Err(failed_precondition_error("line length is zero"));
    }
    Ok(raw_integration_pixels(khz, min_fine, exposure_us) / line_length_pck as u64)
}

/// Exposure expressed in pixel clocks, less the minimum fine integration.
pub fn raw_integration_pixels(pclk_khz: u64, min_fine: u32, exposure_us: u32) -> u64 {
    (exposure_us as u64 * pclk_khz / 1000).saturating_sub(min_fine as u64)
}

/// Frame length in lines for a frame duration of `duration_us`.
pub fn frame_length_from_us(pclk: u32, line_length_pck: u32, duration_us: u32)
                            -> Result<u64, CanonicalError> {
    let khz = pclk_khz(pclk)?;
    if line_length_pck == 0 {
        return Err(failed_precondition_error("line length is zero"));
    }
    Ok(khz * duration_us as u64 / (line_length_pck as u64 * 1000))
}

/// Rounds `value` down to a multiple of `align`. Alignments of 0 and 1 mean
/// no constraint.
pub fn align_down(value: u32, align: u32) -> u32 {
    if align <= 1 {
        value
    } else {
        value / align * align
    }
}

/// Smallest shift (not less than `min_shift`) that brings `lines` into the
/// 16-bit register range, capped at MAX_SHIFTER.
pub fn shifter_for(lines: u64, min_shift: u8) -> u8 {
    let mut shift = min_shift.min(MAX_SHIFTER);
    while (lines >> shift) > 0xFFFF && shift < MAX_SHIFTER {
        shift += 1;
    }
    shift
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pll(pclk: u32, fll: u32, llp: u32) -> PllInfo {
        PllInfo{ext_clk: 26_000_000, mipi_datarate: 2_000_000_000,
                pclk, frame_length_lines: fll, line_length_pck: llp}
    }

    #[test]
    fn test_frame_timing_scenario() {
        let timing = frame_timing(&make_pll(600_000_000, 3000, 6000), 3000).unwrap();
        assert_eq!(timing.min_frame_us_time, 30000);
        assert_eq!(timing.max_fps, 33);
        assert_eq!(timing.line_readout_time_ns, 10000);
        assert_eq!(timing.frame_valid_us_time, 30000);
        assert_eq!(timing.frame_time_us, 30000);
        assert_eq!(timing.rolling_shutter_skew_ns, 2999 * 10000);
    }

    #[test]
    fn test_max_fps_rounds_to_nearest() {
        // 600M / (2000 * 6000) = 50 exactly.
        assert_eq!(frame_timing(&make_pll(600_000_000, 2000, 6000), 0).unwrap().max_fps, 50);
        // 600M / (3600 * 6000) = 27.78.
        assert_eq!(frame_timing(&make_pll(600_000_000, 3600, 6000), 0).unwrap().max_fps, 28);
    }

    #[test]
    fn test_zero_pclk_is_rejected() {
        assert!(frame_timing(&make_pll(0, 3000, 6000), 100).is_err());
        assert!(frame_timing(&make_pll(600_000_000, 3000, 0), 100).is_err());
        assert!(integration_us(999, 6000, 4, 0).is_err());
    }

    #[test]
    fn test_zero_height_has_no_skew() {
        let timing = frame_timing(&make_pll(600_000_000, 3000, 6000), 0).unwrap();
        assert_eq!(timing.rolling_shutter_skew_ns, 0);
        assert_eq!(timing.frame_valid_us_time, 0);
    }

    #[test]
    fn test_integration_us() {
        // 600 MHz, 6000 pixels per line: 10 us per line.
        assert_eq!(integration_us(600_000_000, 6000, 4, 0).unwrap(), 40);
        assert_eq!(integration_us(600_000_000, 6000, 2992, 0x100).unwrap(), 29920);
    }

    #[test]
    fn test_coarse_from_us() {
        assert_eq!(coarse_from_us(600_000_000, 6000, 0, 1010).unwrap(), 101);
        // Fine integration eats into the first line.
        assert_eq!(coarse_from_us(600_000_000, 6000, 0x100, 1010).unwrap(), 100);
        assert_eq!(coarse_from_us(600_000_000, 6000, 0x100, 0).unwrap(), 0);
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(101, 4), 100);
        assert_eq!(align_down(100, 4), 100);
        assert_eq!(align_down(101, 1), 101);
        assert_eq!(align_down(101, 0), 101);
    }

    #[test]
    fn test_shifter_for() {
        assert_eq!(shifter_for(0xFFFF, 0), 0);
        assert_eq!(shifter_for(0x10000, 0), 1);
        assert_eq!(shifter_for(0x3_0000, 0), 2);
        assert_eq!(shifter_for(100, 2), 2);
        assert_eq!(shifter_for(u64::MAX, 0), MAX_SHIFTER);
    }

    #[test]
    fn test_frame_length_from_us() {
        assert_eq!(frame_length_from_us(600_000_000, 6000, 30000).unwrap(), 3000);
    }
}
