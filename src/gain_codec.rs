/// Converts between linear gain in permille (1000 = 1.0x) and the sensor's
/// register codes. Each sensor family has its own fixed-point format.
pub trait GainCodec: Sync {
    fn again_code(&self, permille: u32) -> u32;
    fn again_permille(&self, code: u32) -> u32;
    fn dgain_code(&self, permille: u32) -> u32;
    fn dgain_permille(&self, code: u32) -> u32;
}

/// Fixed-point gain with `base` code units per 1.0x. Conversion to code rounds
/// to nearest; conversion back truncates.
#[derive(Copy, Clone, Debug)]
pub struct LinearGainCodec {
    pub again_base: u32,
    pub dgain_base: u32,
}

/// Analog gain in 1/32 steps, digital gain in 1/256 steps.
pub static DEFAULT_GAIN_CODEC: LinearGainCodec =
    LinearGainCodec{again_base: 0x20, dgain_base: 0x100};

/// Q10 analog and digital gain.
pub static Q10_GAIN_CODEC: LinearGainCodec =
    LinearGainCodec{again_base: 0x400, dgain_base: 0x400};

fn to_code(permille: u32, base: u32) -> u32 {
    ((permille as u64 * base as u64 + 500) / 1000) as u32
}

fn to_permille(code: u32, base: u32) -> u32 {
    (code as u64 * 1000 / base as u64) as u32
}

impl GainCodec for LinearGainCodec {
    fn again_code(&self, permille: u32) -> u32 {
        to_code(permille, self.again_base)
    }

    fn again_permille(&self, code: u32) -> u32 {
        to_permille(code, self.again_base)
    }

    fn dgain_code(&self, permille: u32) -> u32 {
        to_code(permille, self.dgain_base)
    }

    fn dgain_permille(&self, code: u32) -> u32 {
        to_permille(code, self.dgain_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select_sensor::sensor_models;

    #[test]
    fn test_default_codec_rounds_to_nearest() {
        // 1.5x in 1/32 units.
        assert_eq!(DEFAULT_GAIN_CODEC.again_code(1500), 48);
        // 1015 * 32 = 32480, +500 rounds up to 32.
        assert_eq!(DEFAULT_GAIN_CODEC.again_code(1015), 32);
        assert_eq!(DEFAULT_GAIN_CODEC.again_code(1016), 33);
        assert_eq!(DEFAULT_GAIN_CODEC.dgain_code(1000), 0x100);
    }

    #[test]
    fn test_q10_codec() {
        assert_eq!(Q10_GAIN_CODEC.again_code(1000), 1024);
        assert_eq!(Q10_GAIN_CODEC.again_code(64000), 65536);
        assert_eq!(Q10_GAIN_CODEC.again_permille(2048), 2000);
    }

    #[test]
    fn test_every_mode_gain_code_survives_round_trip() {
        for model in sensor_models() {
            let desc = model.descriptor();
            let codec = model.gain_codec();
            for (i, mode) in desc.modes.iter().enumerate() {
                for code in desc.min_analog_gain..=mode.max_analog_gain {
                    let back = codec.again_code(codec.again_permille(code));
                    assert!(back.abs_diff(code) <= 1, "{} mode {} again code {} came back as {}",
                            desc.name, i, code, back);
                }
                for code in desc.min_digital_gain..=mode.max_digital_gain {
                    let back = codec.dgain_code(codec.dgain_permille(code));
                    assert!(back.abs_diff(code) <= 1, "{} mode {} dgain code {} came back as {}",
                            desc.name, i, code, back);
                }
            }
        }
    }
}
