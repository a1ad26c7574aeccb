use std::fmt;

use crate::register_bus::RegisterOp;

/// PLL-derived clocking of one sensor mode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PllInfo {
    pub ext_clk: u32,
    pub mipi_datarate: u64,
    /// Pixel clock in Hz.
    pub pclk: u32,
    pub frame_length_lines: u32,
    pub line_length_pck: u32,
}

/// Readout bit depth of a mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModeBitDepth {
    Raw10,
    /// 12-bit readout using dual conversion gain (IDCG).
    Real12Bit,
    /// 12-bit container over a 10-bit readout.
    Pseudo12Bit,
}

/// Static description of one sensor mode. Compiled into the sensor model's
/// mode table and never modified.
#[derive(Copy, Clone, Debug)]
pub struct SensorModeInfo {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub pll: PllInfo,

    pub min_coarse_integration_time: u32,
    pub max_margin_coarse_integration_time: u32,
    /// Coarse integration must be a multiple of this.
    pub align_cit: u32,
    /// Minimum coarse integration shifter this mode always runs with.
    pub min_cit_shifter: u8,

    /// Register codes.
    pub max_analog_gain: u32,
    pub max_digital_gain: u32,

    pub bit_depth: ModeBitDepth,
    /// Low-noise multi-frame combining factor; 0 when not a low-noise mode.
    pub low_noise: u8,
    pub aeb_support: bool,

    /// Slot in the sensor's fast-change table. Modes without one can only be
    /// entered with a stream restart.
    pub fast_change_idx: Option<u16>,
    /// Which load-SRAM table (if any) must precede a seamless switch into
    /// this mode.
    pub load_sram_idx: Option<usize>,

    pub setfile: &'static [RegisterOp],
}

impl SensorModeInfo {
    pub fn max_coarse_integration_time(&self) -> u32 {
        self.pll.frame_length_lines.saturating_sub(self.max_margin_coarse_integration_time)
    }
}

/// Sub-mode slots of the mode group table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModeGroupSlot {
    Default,
    Idcg,
    Ln2,
    Ln4,
    Aeb,
    AebIdcg,
    CroppedRemosaic,
}

impl ModeGroupSlot {
    pub const ALL: [ModeGroupSlot; 7] = [
        ModeGroupSlot::Default, ModeGroupSlot::Idcg, ModeGroupSlot::Ln2,
        ModeGroupSlot::Ln4, ModeGroupSlot::Aeb, ModeGroupSlot::AebIdcg,
        ModeGroupSlot::CroppedRemosaic];

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Maps each sub-mode slot to the concrete mode that implements it for the
/// current base mode. Slots with no variant stay empty and are never
/// selected.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeGroupTable {
    slots: [Option<usize>; 7],
}

impl ModeGroupTable {
    /// All slots empty.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_default(mode: usize) -> Self {
        let mut table = Self::none();
        table.set(ModeGroupSlot::Default, mode);
        table
    }

    pub fn get(&self, slot: ModeGroupSlot) -> Option<usize> {
        self.slots[slot.index()]
    }

    pub fn set(&mut self, slot: ModeGroupSlot, mode: usize) {
        self.slots[slot.index()] = Some(mode);
    }

    /// Builder form of set().
    pub fn with(mut self, slot: ModeGroupSlot, mode: usize) -> Self {
        self.set(slot, mode);
        self
    }

    /// True if some slot resolves to `mode`.
    pub fn contains(&self, mode: usize) -> bool {
        self.slots.iter().any(|s| *s == Some(mode))
    }
}

impl fmt::Display for ModeGroupTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for slot in ModeGroupSlot::ALL {
            if let Some(mode) = self.get(slot) {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{:?}={}", slot, mode)?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slots_resolve_to_none() {
        let table = ModeGroupTable::with_default(4).with(ModeGroupSlot::Ln2, 5);
        assert_eq!(table.get(ModeGroupSlot::Default), Some(4));
        assert_eq!(table.get(ModeGroupSlot::Ln2), Some(5));
        for slot in [ModeGroupSlot::Idcg, ModeGroupSlot::Ln4, ModeGroupSlot::Aeb,
                     ModeGroupSlot::AebIdcg, ModeGroupSlot::CroppedRemosaic] {
            assert_eq!(table.get(slot), None);
        }
        assert!(table.contains(5));
        assert!(!table.contains(6));
    }

    #[test]
    fn test_display() {
        assert_eq!(ModeGroupTable::none().to_string(), "none");
        assert_eq!(ModeGroupTable::with_default(0).with(ModeGroupSlot::Ln4, 2).to_string(),
                   "Default=0 Ln4=2");
    }
}
