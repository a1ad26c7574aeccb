use canonical_error::CanonicalError;

use crate::clock::Clock;

/// Which board-level bus the sensor sits on. The streaming sequencer tolerates
/// a few consecutive transaction failures while polling; I3C links recover
/// less gracefully so they get a smaller budget.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusKind {
    I2c,
    I3c,
}

impl BusKind {
    /// Number of consecutive failed transactions after which a polling loop
    /// gives up on the bus.
    pub fn failure_threshold(&self) -> u32 {
        match self {
            BusKind::I2c => 5,
            BusKind::I3c => 3,
        }
    }
}

/// RegisterBus is the sensor's register transaction layer. Every operation is
/// addressed by a 16-bit register address; multi-byte values are big-endian
/// on the wire, as is conventional for CIS parts.
///
/// The array/burst/sequential variants have per-element default
/// implementations. Implementations that can do better should override them
/// to issue exactly one bus transaction, preserving element order.
pub trait RegisterBus: Send {
    fn kind(&self) -> BusKind;

    fn read8(&mut self, addr: u16) -> Result<u8, CanonicalError>;
    fn read16(&mut self, addr: u16) -> Result<u16, CanonicalError>;
    fn write8(&mut self, addr: u16, value: u8) -> Result<(), CanonicalError>;
    fn write16(&mut self, addr: u16, value: u16) -> Result<(), CanonicalError>;

    /// Writes `values` to consecutive 16-bit registers starting at `addr`.
    fn write16_array(&mut self, addr: u16, values: &[u16])
                     -> Result<(), CanonicalError> {
        for (i, value) in values.iter().enumerate() {
            self.write16(addr.wrapping_add(2 * i as u16), *value)?;
        }
        Ok(())
    }

    /// Writes all of `values` to the single data port `addr`; the sensor
    /// auto-increments its internal pointer.
    fn write16_burst(&mut self, addr: u16, values: &[u16])
                     -> Result<(), CanonicalError> {
        for value in values {
            self.write16(addr, *value)?;
        }
        Ok(())
    }

    /// Writes `values` to consecutive 8-bit registers starting at `addr`.
    fn write8_sequential(&mut self, addr: u16, values: &[u8])
                         -> Result<(), CanonicalError> {
        for (i, value) in values.iter().enumerate() {
            self.write8(addr.wrapping_add(i as u16), *value)?;
        }
        Ok(())
    }
}

/// One entry of a static register table ("setfile").
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RegisterOp {
    Write8(u16, u8),
    Write16(u16, u16),
    /// Burst of 16-bit words to one data port.
    Burst16(u16, &'static [u16]),
    DelayUs(u64),
}

/// Applies a register table in order. Stops at the first failed write; the
/// writes already issued are not undone.
pub fn apply_setfile(bus: &mut dyn RegisterBus, clock: &dyn Clock,
                     ops: &[RegisterOp]) -> Result<(), CanonicalError> {
    for op in ops {
        match *op {
            RegisterOp::Write8(addr, value) => bus.write8(addr, value)?,
            RegisterOp::Write16(addr, value) => bus.write16(addr, value)?,
            RegisterOp::Burst16(addr, values) => bus.write16_burst(addr, values)?,
            RegisterOp::DelayUs(us) => clock.sleep_us(us),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sim_bus::{BusTransaction, SimSensorBus};

    #[test]
    fn test_array_writes_consecutive_registers() {
        let mut bus = SimSensorBus::new(0x0841);
        bus.write16_array(0x0E18, &[0x2B, 0x2C, 0x2D]).unwrap();
        assert_eq!(bus.peek16(0x0E18), 0x2B);
        assert_eq!(bus.peek16(0x0E1A), 0x2C);
        assert_eq!(bus.peek16(0x0E1C), 0x2D);
    }

    #[test]
    fn test_setfile_stops_at_first_failure() {
        let mut bus = SimSensorBus::new(0x0841);
        let clock = ManualClock::new();
        bus.fail_writes_to(0x0344);
        let ops = [RegisterOp::Write16(0x0340, 0x0D05),
                   RegisterOp::DelayUs(500),
                   RegisterOp::Write16(0x0344, 0x0008),
                   RegisterOp::Write16(0x0346, 0x0008)];
        assert!(apply_setfile(&mut bus, &clock, &ops).is_err());
        assert_eq!(bus.peek16(0x0340), 0x0D05);
        assert_eq!(bus.peek16(0x0346), 0);
        assert_eq!(clock.now_us(), 500);
    }

    #[test]
    fn test_burst_is_one_transaction() {
        let mut bus = SimSensorBus::new(0x0841);
        let clock = ManualClock::new();
        static WORDS: [u16; 4] = [1, 2, 3, 4];
        apply_setfile(&mut bus, &clock, &[RegisterOp::Burst16(0x6F12, &WORDS)]).unwrap();
        assert_eq!(bus.transactions(),
                   &[BusTransaction::Burst16(0x6F12, WORDS.to_vec())]);
    }

    #[test]
    fn test_failure_thresholds() {
        assert_eq!(BusKind::I2c.failure_threshold(), 5);
        assert_eq!(BusKind::I3c.failure_threshold(), 3);
    }
}
