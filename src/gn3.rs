// Samsung S5KGN3 50MP tetra-pixel sensor. AEB is toggled in place through
// the bracketing LUT registers; low-noise, IDCG and cropped remosaic are
// separate modes reached through the fast-change index.

use crate::gain_codec::{DEFAULT_GAIN_CODEC, GainCodec};
use crate::register_bus::RegisterOp::{self, DelayUs, Write16};
use crate::sensor_mode::{ModeBitDepth, ModeGroupSlot, ModeGroupTable, PllInfo,
                         SensorModeInfo};
use crate::sensor_model::{AebControl, AebRegisters, ControlRegisters,
                          RetentionSetfiles, SeamlessRegisters, SensorDescriptor,
                          SensorModel, StatusProbe};

pub const MODE_4080X3060_30FPS: usize = 0;
pub const MODE_4080X3060_30FPS_LN2: usize = 1;
pub const MODE_4080X3060_30FPS_LN4: usize = 2;
pub const MODE_4080X3060_30FPS_CROP: usize = 3;
pub const MODE_4080X3060_30FPS_R12: usize = 4;
pub const MODE_4080X3060_30FPS_LN2_R12: usize = 5;
pub const MODE_4080X3060_30FPS_IDCG_R12: usize = 6;
pub const MODE_4080X2296_60FPS: usize = 7;
pub const MODE_4080X2296_30FPS_LN2: usize = 8;
pub const MODE_8160X6120_15FPS: usize = 9;
pub const MODE_2040X1148_480FPS: usize = 10;

const PCLK: u32 = 1_760_000_000;

const PLL_30FPS: PllInfo = PllInfo{ext_clk: 26_000_000, mipi_datarate: 2_236_000_000,
                                   pclk: PCLK, frame_length_lines: 6666,
                                   line_length_pck: 8800};

const BASE_MODE: SensorModeInfo = SensorModeInfo{
    name: "",
    width: 4080,
    height: 3060,
    pll: PLL_30FPS,
    min_coarse_integration_time: 4,
    max_margin_coarse_integration_time: 16,
    align_cit: 1,
    min_cit_shifter: 0,
    max_analog_gain: 0x800,
    max_digital_gain: 0x1000,
    bit_depth: ModeBitDepth::Raw10,
    low_noise: 0,
    aeb_support: false,
    fast_change_idx: None,
    load_sram_idx: None,
    setfile: &[],
};

static SETFILE_4080X3060_30FPS: [RegisterOp; 10] = [
    Write16(0xFCFC, 0x4000), Write16(0x0344, 0x0008), Write16(0x0346, 0x0008),
    Write16(0x0348, 0x1FE7), Write16(0x034A, 0x17EF), Write16(0x034C, 0x0FF0),
    Write16(0x034E, 0x0BF4), Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260),
    Write16(0x0900, 0x2222)];

static SETFILE_4080X3060_30FPS_LN2: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260),
    Write16(0x0B20, 0x0002)];

static SETFILE_4080X3060_30FPS_LN4: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260),
    Write16(0x0B20, 0x0004)];

static SETFILE_4080X3060_30FPS_CROP: [RegisterOp; 6] = [
    Write16(0xFCFC, 0x4000), Write16(0x0344, 0x0FF8), Write16(0x0346, 0x0BF8),
    Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260), Write16(0x0900, 0x0011)];

static SETFILE_4080X3060_30FPS_R12: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260),
    Write16(0x0112, 0x0C0C)];

static SETFILE_4080X3060_30FPS_LN2_R12: [RegisterOp; 5] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260),
    Write16(0x0112, 0x0C0C), Write16(0x0B20, 0x0002)];

static SETFILE_4080X3060_30FPS_IDCG_R12: [RegisterOp; 5] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260),
    Write16(0x0112, 0x0C0C), Write16(0x0B22, 0x0001)];

static SETFILE_4080X2296_60FPS: [RegisterOp; 6] = [
    Write16(0xFCFC, 0x4000), Write16(0x0346, 0x0308), Write16(0x034C, 0x0FF0),
    Write16(0x034E, 0x08F8), Write16(0x0340, 0x0D05), Write16(0x0342, 0x2260)];

static SETFILE_4080X2296_30FPS_LN2: [RegisterOp; 6] = [
    Write16(0xFCFC, 0x4000), Write16(0x0346, 0x0308), Write16(0x034E, 0x08F8),
    Write16(0x0340, 0x1A0A), Write16(0x0342, 0x2260), Write16(0x0B20, 0x0002)];

static SETFILE_8160X6120_15FPS: [RegisterOp; 6] = [
    Write16(0xFCFC, 0x4000), Write16(0x034C, 0x1FE0), Write16(0x034E, 0x17E8),
    Write16(0x0340, 0x1A0A), Write16(0x0342, 0x44C0), Write16(0x0900, 0x0011)];

static SETFILE_2040X1148_480FPS: [RegisterOp; 6] = [
    Write16(0xFCFC, 0x4000), Write16(0x034C, 0x07F8), Write16(0x034E, 0x047C),
    Write16(0x0340, 0x0341), Write16(0x0342, 0x1130), Write16(0x0900, 0x0144)];

static MODES: [SensorModeInfo; 11] = [
    SensorModeInfo{name: "4080x3060_30fps", aeb_support: true,
                   fast_change_idx: Some(0x0000),
                   setfile: &SETFILE_4080X3060_30FPS, ..BASE_MODE},
    SensorModeInfo{name: "4080x3060_30fps_ln2", low_noise: 2, align_cit: 2,
                   max_analog_gain: 0x200, fast_change_idx: Some(0x0001),
                   load_sram_idx: Some(0),
                   setfile: &SETFILE_4080X3060_30FPS_LN2, ..BASE_MODE},
    SensorModeInfo{name: "4080x3060_30fps_ln4", low_noise: 4, align_cit: 4,
                   max_analog_gain: 0x200, fast_change_idx: Some(0x0002),
                   load_sram_idx: Some(1),
                   setfile: &SETFILE_4080X3060_30FPS_LN4, ..BASE_MODE},
    SensorModeInfo{name: "4080x3060_30fps_crop", max_analog_gain: 0x200,
                   fast_change_idx: Some(0x0003), load_sram_idx: Some(2),
                   setfile: &SETFILE_4080X3060_30FPS_CROP, ..BASE_MODE},
    SensorModeInfo{name: "4080x3060_30fps_r12", bit_depth: ModeBitDepth::Pseudo12Bit,
                   aeb_support: true, fast_change_idx: Some(0x0100),
                   setfile: &SETFILE_4080X3060_30FPS_R12, ..BASE_MODE},
    SensorModeInfo{name: "4080x3060_30fps_ln2_r12", bit_depth: ModeBitDepth::Pseudo12Bit,
                   low_noise: 2, align_cit: 2, max_analog_gain: 0x200,
                   fast_change_idx: Some(0x0101), load_sram_idx: Some(0),
                   setfile: &SETFILE_4080X3060_30FPS_LN2_R12, ..BASE_MODE},
    SensorModeInfo{name: "4080x3060_30fps_idcg_r12", bit_depth: ModeBitDepth::Real12Bit,
                   max_analog_gain: 0x400, fast_change_idx: Some(0x0102),
                   load_sram_idx: Some(3),
                   setfile: &SETFILE_4080X3060_30FPS_IDCG_R12, ..BASE_MODE},
    SensorModeInfo{name: "4080x2296_60fps", height: 2296,
                   pll: PllInfo{frame_length_lines: 3333, ..PLL_30FPS},
                   aeb_support: true, fast_change_idx: Some(0x0200),
                   setfile: &SETFILE_4080X2296_60FPS, ..BASE_MODE},
    SensorModeInfo{name: "4080x2296_30fps_ln2", height: 2296, low_noise: 2,
                   align_cit: 2, max_analog_gain: 0x200,
                   fast_change_idx: Some(0x0201), load_sram_idx: Some(0),
                   setfile: &SETFILE_4080X2296_30FPS_LN2, ..BASE_MODE},
    SensorModeInfo{name: "8160x6120_15fps", width: 8160, height: 6120,
                   pll: PllInfo{line_length_pck: 17600, ..PLL_30FPS},
                   max_analog_gain: 0x200,
                   setfile: &SETFILE_8160X6120_15FPS, ..BASE_MODE},
    SensorModeInfo{name: "2040x1148_480fps", width: 2040, height: 1148,
                   pll: PllInfo{frame_length_lines: 833, line_length_pck: 4400,
                                ..PLL_30FPS},
                   max_margin_coarse_integration_time: 8,
                   setfile: &SETFILE_2040X1148_480FPS, ..BASE_MODE},
];

static GLOBAL_SETTING: [RegisterOp; 8] = [
    Write16(0xFCFC, 0x4000), Write16(0x6000, 0x0005), Write16(0x6010, 0x0001),
    DelayUs(24_000),
    Write16(0x6214, 0xF9F0), Write16(0x6218, 0xE150), Write16(0x6242, 0x0E00),
    Write16(0x6000, 0x0085)];

static GOLDEN_CAL: [RegisterOp; 3] = [
    Write16(0xFCFC, 0x4000), Write16(0x0D0A, 0x0101), Write16(0x0B00, 0x0180)];

static LOAD_SRAM_LN2: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x1130), Write16(0x6F12, 0x0002)];
static LOAD_SRAM_LN4: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x1130), Write16(0x6F12, 0x0004)];
static LOAD_SRAM_CROP: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x5670), Write16(0x6F12, 0x0001)];
static LOAD_SRAM_IDCG: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x1132), Write16(0x6F12, 0x0001)];

static LOAD_SRAM: [&[RegisterOp]; 4] =
    [&LOAD_SRAM_LN2, &LOAD_SRAM_LN4, &LOAD_SRAM_CROP, &LOAD_SRAM_IDCG];

static RETENTION_GLOBAL: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x6000, 0x0005), Write16(0x010C, 0x0100),
    Write16(0x6000, 0x0085)];
static RETENTION_TABLE_30FPS: [RegisterOp; 3] = [
    Write16(0x6028, 0x2000), Write16(0x602A, 0x0F74), Write16(0x6F12, 0x0000)];
static RETENTION_TABLE_60FPS: [RegisterOp; 3] = [
    Write16(0x6028, 0x2000), Write16(0x602A, 0x0F78), Write16(0x6F12, 0x2002)];
static RETENTION_FINISH: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x6000, 0x0005), Write16(0x0B30, 0x01FF),
    Write16(0x6000, 0x0085)];

static RETENTION: RetentionSetfiles = RetentionSetfiles{
    global: &RETENTION_GLOBAL,
    tables: &[&RETENTION_TABLE_30FPS, &RETENTION_TABLE_60FPS],
    finish: &RETENTION_FINISH,
    checksum_enable: 0x010E,
    checksum_passed: 0x19C2,
    ram_ready: 0x19C4,
    ok_value: 0x0100,
};

// bracketing_lut_control + lut_mode, one repetition, then per-LUT image and
// embedded-data virtual channel / data type.
static AEB_ENABLE_RAW10: [RegisterOp; 9] = [
    Write16(0x0E00, 0x0203), Write16(0x0E02, 0x0000), Write16(0x0E04, 0x1C23),
    Write16(0x0E18, 0x002B), Write16(0x0E1A, 0x0200), Write16(0x0E1C, 0x2B00),
    Write16(0x0E26, 0x012B), Write16(0x0E28, 0x0300), Write16(0x0E2A, 0x2B00)];
static AEB_ENABLE_PSEUDO12: [RegisterOp; 9] = [
    Write16(0x0E00, 0x0203), Write16(0x0E02, 0x0000), Write16(0x0E04, 0x1C23),
    Write16(0x0E18, 0x002C), Write16(0x0E1A, 0x0200), Write16(0x0E1C, 0x2B00),
    Write16(0x0E26, 0x012C), Write16(0x0E28, 0x0300), Write16(0x0E2A, 0x2B00)];

static AEB: AebRegisters = AebRegisters{
    control: 0x0E00,
    enable_raw10: &AEB_ENABLE_RAW10,
    enable_pseudo12: &AEB_ENABLE_PSEUDO12,
    lut_long: 0x0E10,
    lut_short: 0x0E1E,
    lut_offset_fll: 0x0,
    lut_offset_cit: 0x2,
    lut_offset_again: 0x4,
    lut_offset_dgain: 0x6,
};

static STATUS_REGISTERS: [StatusProbe; 18] = [
    StatusProbe::Read8(0x0104, "group_param_hold"),
    StatusProbe::Write16(0x6000, 0x0005, "page unlock"),
    StatusProbe::Write16(0xFCFC, 0x4000, "0x4000 page"),
    StatusProbe::Read16(0x0000, "model_id"),
    StatusProbe::Read16(0x0002, "revision_number"),
    StatusProbe::Read16(0x0100, "mode_select"),
    StatusProbe::Read16(0x0202, "coarse_integration_time"),
    StatusProbe::Read16(0x0702, "fll_shifter"),
    StatusProbe::Read16(0x0704, "cit_shifter"),
    StatusProbe::Read16(0x0340, "frame_length_lines"),
    StatusProbe::Read16(0x0342, "line_length_pck"),
    StatusProbe::Read16(0x0344, "x_addr_start"),
    StatusProbe::Read16(0x0346, "y_addr_start"),
    StatusProbe::Read16(0x034C, "x_output_size"),
    StatusProbe::Read16(0x034E, "y_output_size"),
    StatusProbe::Read16(0x0B30, "fast_change_idx"),
    StatusProbe::Read16(0x0E00, "aeb_control"),
    StatusProbe::Write16(0x6000, 0x0085, "page lock"),
];

pub static DESCRIPTOR: SensorDescriptor = SensorDescriptor{
    name: "S5KGN3",
    sensor_id: 0x08E3,
    max_width: 8160,
    max_height: 6120,
    min_fine_integration_time: 0x100,
    max_fine_integration_time: 0x100,
    min_analog_gain: 0x20,
    min_digital_gain: 0x100,
    cit_compensation_threshold: 1024,
    stream_off_sentinel: 0xFF,
    regs: ControlRegisters{
        model_id: 0x0000,
        revision: 0x0002,
        frame_count: 0x0005,
        mode_select: 0x0100,
        stream_on_value: 0x0103,
        stream_off_value: 0x0003,
        group_param_hold: 0x0104,
        coarse_integration_time: 0x0202,
        cit_shifter: Some(0x0704),
        frame_length_lines: 0x0340,
        fll_shifter: Some(0x0702),
        analog_gain: 0x0204,
        digital_gain: 0x020E,
        x_addr_start: 0x0344,
        y_addr_start: 0x0346,
        x_addr_end: 0x0348,
        y_addr_end: 0x034A,
        x_output_size: 0x034C,
        y_output_size: 0x034E,
        test_pattern: 0x0600,
        cal_data_port: 0x6F12,
    },
    seamless: SeamlessRegisters{
        page_select: 0xFCFC,
        page_value: 0x4000,
        lock: 0x6000,
        unlock_value: 0x0005,
        lock_value: 0x0085,
        fast_change_idx: 0x0B30,
        fast_change_update: 0x0B32,
        fast_change_update_value: 0x0100,
        fast_change_disabled: 0x00FF,
    },
    modes: &MODES,
    global_setting: &GLOBAL_SETTING,
    golden_cal: &GOLDEN_CAL,
    load_sram: &LOAD_SRAM,
    retention: Some(&RETENTION),
    aeb: AebControl::InPlace(&AEB),
    status_registers: &STATUS_REGISTERS,
};

pub struct S5kgn3;

pub static S5KGN3: S5kgn3 = S5kgn3;

impl SensorModel for S5kgn3 {
    fn descriptor(&self) -> &'static SensorDescriptor {
        &DESCRIPTOR
    }

    fn gain_codec(&self) -> &'static dyn GainCodec {
        &DEFAULT_GAIN_CODEC
    }

    fn mode_groups(&self, mode: usize) -> ModeGroupTable {
        let table = ModeGroupTable::with_default(mode);
        match mode {
            MODE_4080X3060_30FPS => {
                table.with(ModeGroupSlot::Ln2, MODE_4080X3060_30FPS_LN2)
                     .with(ModeGroupSlot::Ln4, MODE_4080X3060_30FPS_LN4)
                     .with(ModeGroupSlot::CroppedRemosaic, MODE_4080X3060_30FPS_CROP)
            },
            // Cropped remosaic is only reachable from the base mode.
            MODE_4080X3060_30FPS_LN2 | MODE_4080X3060_30FPS_LN4
            | MODE_4080X3060_30FPS_CROP => {
                table.with(ModeGroupSlot::Ln2, MODE_4080X3060_30FPS_LN2)
                     .with(ModeGroupSlot::Ln4, MODE_4080X3060_30FPS_LN4)
            },
            MODE_4080X3060_30FPS_R12 | MODE_4080X3060_30FPS_LN2_R12
            | MODE_4080X3060_30FPS_IDCG_R12 => {
                table.with(ModeGroupSlot::Ln2, MODE_4080X3060_30FPS_LN2_R12)
                     .with(ModeGroupSlot::Idcg, MODE_4080X3060_30FPS_IDCG_R12)
            },
            MODE_4080X2296_60FPS | MODE_4080X2296_30FPS_LN2 => {
                table.with(ModeGroupSlot::Ln2, MODE_4080X2296_30FPS_LN2)
            },
            _ => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{frame_timing, integration_us};

    #[test]
    fn test_every_mode_has_sane_timing() {
        for (i, mode) in MODES.iter().enumerate() {
            let timing = frame_timing(&mode.pll, mode.height).unwrap();
            assert!(timing.max_fps >= 1, "mode {} {}", i, mode.name);
            let min = integration_us(mode.pll.pclk, mode.pll.line_length_pck,
                                     mode.min_coarse_integration_time,
                                     DESCRIPTOR.min_fine_integration_time).unwrap();
            let max = integration_us(mode.pll.pclk, mode.pll.line_length_pck,
                                     mode.max_coarse_integration_time(),
                                     DESCRIPTOR.max_fine_integration_time).unwrap();
            assert!(min < max, "mode {} {}", i, mode.name);
        }
    }

    #[test]
    fn test_frame_rates() {
        let fps = |m: usize| frame_timing(&MODES[m].pll, MODES[m].height).unwrap().max_fps;
        assert_eq!(fps(MODE_4080X3060_30FPS), 30);
        assert_eq!(fps(MODE_4080X2296_60FPS), 60);
        assert_eq!(fps(MODE_8160X6120_15FPS), 15);
        assert_eq!(fps(MODE_2040X1148_480FPS), 480);
    }

    #[test]
    fn test_group_slots_point_at_matching_modes() {
        for base in 0..MODES.len() {
            let groups = S5KGN3.mode_groups(base);
            if let Some(m) = groups.get(ModeGroupSlot::Ln2) {
                assert_eq!(MODES[m].low_noise, 2);
            }
            if let Some(m) = groups.get(ModeGroupSlot::Ln4) {
                assert_eq!(MODES[m].low_noise, 4);
            }
            if let Some(m) = groups.get(ModeGroupSlot::Idcg) {
                assert_eq!(MODES[m].bit_depth, ModeBitDepth::Real12Bit);
            }
            for slot in ModeGroupSlot::ALL {
                if let Some(m) = groups.get(slot) {
                    assert!(m < MODES.len());
                }
            }
        }
    }

    #[test]
    fn test_cropped_remosaic_only_from_base_mode() {
        assert_eq!(S5KGN3.mode_groups(MODE_4080X3060_30FPS).get(ModeGroupSlot::CroppedRemosaic),
                   Some(MODE_4080X3060_30FPS_CROP));
        for variant in [MODE_4080X3060_30FPS_LN2, MODE_4080X3060_30FPS_LN4,
                        MODE_4080X3060_30FPS_CROP] {
            let groups = S5KGN3.mode_groups(variant);
            assert_eq!(groups.get(ModeGroupSlot::CroppedRemosaic), None);
            assert_eq!(groups.get(ModeGroupSlot::Ln2), Some(MODE_4080X3060_30FPS_LN2));
        }
    }

    #[test]
    fn test_modes_without_fast_change_have_no_variants() {
        let groups = S5KGN3.mode_groups(MODE_8160X6120_15FPS);
        assert_eq!(groups, ModeGroupTable::with_default(MODE_8160X6120_15FPS));
        assert_eq!(MODES[MODE_8160X6120_15FPS].fast_change_idx, None);
    }

    #[test]
    fn test_load_sram_indices_in_range() {
        for mode in MODES.iter() {
            if let Some(idx) = mode.load_sram_idx {
                assert!(idx < LOAD_SRAM.len());
            }
        }
    }
}
