// Samsung S5KHM3 108MP nona-pixel sensor. Gains are Q10. AEB has its own
// fast-change modes rather than an in-place register toggle.

use crate::gain_codec::{GainCodec, Q10_GAIN_CODEC};
use crate::register_bus::RegisterOp::{self, DelayUs, Write16, Write8};
use crate::sensor_mode::{ModeBitDepth, ModeGroupSlot, ModeGroupTable, PllInfo,
                         SensorModeInfo};
use crate::sensor_model::{AebControl, ControlRegisters, RetentionSetfiles,
                          SeamlessRegisters, SensorDescriptor, SensorModel,
                          StatusProbe};

pub const MODE_4000X3000_30FPS: usize = 0;
pub const MODE_4000X3000_30FPS_LN2: usize = 1;
pub const MODE_4000X3000_30FPS_AEB: usize = 2;
pub const MODE_4000X3000_30FPS_R12: usize = 3;
pub const MODE_4000X3000_30FPS_IDCG: usize = 4;
pub const MODE_4000X3000_30FPS_AEB_IDCG: usize = 5;
pub const MODE_12000X9000_8FPS: usize = 6;

const PLL_30FPS: PllInfo = PllInfo{ext_clk: 19_200_000, mipi_datarate: 1_795_000_000,
                                   pclk: 1_600_000_000, frame_length_lines: 4444,
                                   line_length_pck: 12000};

const BASE_MODE: SensorModeInfo = SensorModeInfo{
    name: "",
    width: 4000,
    height: 3000,
    pll: PLL_30FPS,
    min_coarse_integration_time: 8,
    max_margin_coarse_integration_time: 24,
    align_cit: 1,
    min_cit_shifter: 0,
    max_analog_gain: 0x4000,
    max_digital_gain: 0x4000,
    bit_depth: ModeBitDepth::Raw10,
    low_noise: 0,
    aeb_support: false,
    fast_change_idx: None,
    load_sram_idx: None,
    setfile: &[],
};

static SETFILE_4000X3000_30FPS: [RegisterOp; 7] = [
    Write16(0xFCFC, 0x4000), Write16(0x034C, 0x0FA0), Write16(0x034E, 0x0BB8),
    Write16(0x0340, 0x115C), Write16(0x0342, 0x2EE0), Write8(0x0900, 0x33),
    Write8(0x0901, 0x33)];

static SETFILE_4000X3000_30FPS_LN2: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x115C), Write16(0x0342, 0x2EE0),
    Write16(0x0B20, 0x0002)];

static SETFILE_4000X3000_30FPS_AEB: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x115C), Write16(0x0342, 0x2EE0),
    Write16(0x0E00, 0x0203)];

static SETFILE_4000X3000_30FPS_R12: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x115C), Write16(0x0342, 0x2EE0),
    Write16(0x0112, 0x0C0C)];

static SETFILE_4000X3000_30FPS_IDCG: [RegisterOp; 5] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x115C), Write16(0x0342, 0x2EE0),
    Write16(0x0112, 0x0C0C), Write16(0x0B22, 0x0001)];

static SETFILE_4000X3000_30FPS_AEB_IDCG: [RegisterOp; 6] = [
    Write16(0xFCFC, 0x4000), Write16(0x0340, 0x115C), Write16(0x0342, 0x2EE0),
    Write16(0x0112, 0x0C0C), Write16(0x0B22, 0x0001), Write16(0x0E00, 0x0203)];

static SETFILE_12000X9000_8FPS: [RegisterOp; 7] = [
    Write16(0xFCFC, 0x4000), Write16(0x034C, 0x2EE0), Write16(0x034E, 0x2328),
    Write16(0x0340, 0x22B8), Write16(0x0342, 0x5DC0), Write8(0x0900, 0x11),
    Write8(0x0901, 0x11)];

static MODES: [SensorModeInfo; 7] = [
    SensorModeInfo{name: "4000x3000_30fps", fast_change_idx: Some(0x0000),
                   setfile: &SETFILE_4000X3000_30FPS, ..BASE_MODE},
    SensorModeInfo{name: "4000x3000_30fps_ln2", low_noise: 2, align_cit: 2,
                   max_analog_gain: 0x1000, fast_change_idx: Some(0x0001),
                   load_sram_idx: Some(0),
                   setfile: &SETFILE_4000X3000_30FPS_LN2, ..BASE_MODE},
    SensorModeInfo{name: "4000x3000_30fps_aeb", aeb_support: true,
                   fast_change_idx: Some(0x0002), load_sram_idx: Some(1),
                   setfile: &SETFILE_4000X3000_30FPS_AEB, ..BASE_MODE},
    SensorModeInfo{name: "4000x3000_30fps_r12", bit_depth: ModeBitDepth::Pseudo12Bit,
                   fast_change_idx: Some(0x0100),
                   setfile: &SETFILE_4000X3000_30FPS_R12, ..BASE_MODE},
    SensorModeInfo{name: "4000x3000_30fps_idcg", bit_depth: ModeBitDepth::Real12Bit,
                   max_analog_gain: 0x2000, fast_change_idx: Some(0x0101),
                   load_sram_idx: Some(2),
                   setfile: &SETFILE_4000X3000_30FPS_IDCG, ..BASE_MODE},
    SensorModeInfo{name: "4000x3000_30fps_aeb_idcg", bit_depth: ModeBitDepth::Real12Bit,
                   aeb_support: true, max_analog_gain: 0x2000,
                   fast_change_idx: Some(0x0102), load_sram_idx: Some(3),
                   setfile: &SETFILE_4000X3000_30FPS_AEB_IDCG, ..BASE_MODE},
    SensorModeInfo{name: "12000x9000_8fps", width: 12000, height: 9000,
                   pll: PllInfo{frame_length_lines: 8888, line_length_pck: 24000,
                                ..PLL_30FPS},
                   min_cit_shifter: 1, max_analog_gain: 0x1000,
                   setfile: &SETFILE_12000X9000_8FPS, ..BASE_MODE},
];

static GLOBAL_SETTING: [RegisterOp; 7] = [
    Write16(0xFCFC, 0x4000), Write16(0x6000, 0x0005), Write16(0x6010, 0x0001),
    DelayUs(18_000),
    Write16(0x6214, 0xFF7D), Write16(0x6218, 0x0000), Write16(0x6000, 0x0085)];

static GOLDEN_CAL: [RegisterOp; 2] = [Write16(0xFCFC, 0x4000), Write16(0x0D0A, 0x0101)];

static LOAD_SRAM_LN2: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x3A40), Write16(0x6F12, 0x0002)];
static LOAD_SRAM_AEB: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x3A42), Write16(0x6F12, 0x0001)];
static LOAD_SRAM_IDCG: [RegisterOp; 3] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x3A44), Write16(0x6F12, 0x0001)];
static LOAD_SRAM_AEB_IDCG: [RegisterOp; 4] = [
    Write16(0x6028, 0x2001), Write16(0x602A, 0x3A42), Write16(0x6F12, 0x0001),
    Write16(0x6F12, 0x0001)];

static LOAD_SRAM: [&[RegisterOp]; 4] =
    [&LOAD_SRAM_LN2, &LOAD_SRAM_AEB, &LOAD_SRAM_IDCG, &LOAD_SRAM_AEB_IDCG];

static RETENTION_GLOBAL: [RegisterOp; 3] = [
    Write16(0xFCFC, 0x4000), Write16(0x6000, 0x0005), Write16(0x6000, 0x0085)];
static RETENTION_TABLE: [RegisterOp; 3] = [
    Write16(0x6028, 0x2000), Write16(0x602A, 0x1F80), Write16(0x6F12, 0x0001)];
static RETENTION_FINISH: [RegisterOp; 4] = [
    Write16(0xFCFC, 0x4000), Write16(0x6000, 0x0005), Write16(0x0B30, 0x01FF),
    Write16(0x6000, 0x0085)];

static RETENTION: RetentionSetfiles = RetentionSetfiles{
    global: &RETENTION_GLOBAL,
    tables: &[&RETENTION_TABLE],
    finish: &RETENTION_FINISH,
    checksum_enable: 0x010E,
    checksum_passed: 0x19C2,
    ram_ready: 0x19C4,
    ok_value: 0x0100,
};

static STATUS_REGISTERS: [StatusProbe; 11] = [
    StatusProbe::Read8(0x0104, "group_param_hold"),
    StatusProbe::Write16(0xFCFC, 0x4000, "0x4000 page"),
    StatusProbe::Read16(0x0000, "model_id"),
    StatusProbe::Read16(0x0002, "revision_number"),
    StatusProbe::Read16(0x0100, "mode_select"),
    StatusProbe::Read16(0x0202, "coarse_integration_time"),
    StatusProbe::Read16(0x0204, "analog_gain"),
    StatusProbe::Read16(0x0340, "frame_length_lines"),
    StatusProbe::Read16(0x0342, "line_length_pck"),
    StatusProbe::Read16(0x0B30, "fast_change_idx"),
    StatusProbe::Read16(0x19C2, "checksum_passed"),
];

pub static DESCRIPTOR: SensorDescriptor = SensorDescriptor{
    name: "S5KHM3",
    sensor_id: 0x1AD3,
    max_width: 12000,
    max_height: 9000,
    min_fine_integration_time: 0x200,
    max_fine_integration_time: 0x200,
    min_analog_gain: 0x400,
    min_digital_gain: 0x400,
    cit_compensation_threshold: 1024,
    stream_off_sentinel: 0x00,
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
    aeb: AebControl::ModeSwitch,
    status_registers: &STATUS_REGISTERS,
};

pub struct S5khm3;

pub static S5KHM3: S5khm3 = S5khm3;

impl SensorModel for S5khm3 {
    fn descriptor(&self) -> &'static SensorDescriptor {
        &DESCRIPTOR
    }

    fn gain_codec(&self) -> &'static dyn GainCodec {
        &Q10_GAIN_CODEC
    }

    fn mode_groups(&self, mode: usize) -> ModeGroupTable {
        let table = ModeGroupTable::with_default(mode);
        match mode {
            MODE_4000X3000_30FPS | MODE_4000X3000_30FPS_LN2 | MODE_4000X3000_30FPS_AEB => {
                table.with(ModeGroupSlot::Ln2, MODE_4000X3000_30FPS_LN2)
                     .with(ModeGroupSlot::Idcg, MODE_4000X3000_30FPS_IDCG)
                     .with(ModeGroupSlot::Aeb, MODE_4000X3000_30FPS_AEB)
                     .with(ModeGroupSlot::AebIdcg, MODE_4000X3000_30FPS_AEB_IDCG)
            },
            MODE_4000X3000_30FPS_R12 | MODE_4000X3000_30FPS_IDCG
            | MODE_4000X3000_30FPS_AEB_IDCG => {
                table.with(ModeGroupSlot::Idcg, MODE_4000X3000_30FPS_IDCG)
                     .with(ModeGroupSlot::Aeb, MODE_4000X3000_30FPS_AEB)
                     .with(ModeGroupSlot::AebIdcg, MODE_4000X3000_30FPS_AEB_IDCG)
            },
            _ => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::frame_timing;

    #[test]
    fn test_frame_rates() {
        let fps = |m: usize| frame_timing(&MODES[m].pll, MODES[m].height).unwrap().max_fps;
        assert_eq!(fps(MODE_4000X3000_30FPS), 30);
        // 1.6 GHz / (8888 * 24000) = 7.5, rounds up.
        assert_eq!(fps(MODE_12000X9000_8FPS), 8);
    }

    #[test]
    fn test_aeb_slots_are_aeb_modes() {
        for base in 0..MODES.len() {
            let groups = S5KHM3.mode_groups(base);
            for slot in [ModeGroupSlot::Aeb, ModeGroupSlot::AebIdcg] {
                if let Some(m) = groups.get(slot) {
                    assert!(MODES[m].aeb_support, "base {} slot {:?}", base, slot);
                }
            }
            if let Some(m) = groups.get(ModeGroupSlot::AebIdcg) {
                assert_eq!(MODES[m].bit_depth, ModeBitDepth::Real12Bit);
            }
        }
    }

    #[test]
    fn test_q10_gain_limits() {
        let codec = S5KHM3.gain_codec();
        assert_eq!(codec.again_permille(DESCRIPTOR.min_analog_gain), 1000);
        assert_eq!(codec.again_permille(MODES[MODE_4000X3000_30FPS].max_analog_gain), 16000);
    }
}
