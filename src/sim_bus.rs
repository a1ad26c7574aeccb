// Simulated sensor register file. For testing and for the demo binaries.

use std::collections::{HashMap, HashSet};

use canonical_error::{CanonicalError, unavailable_error};

use crate::register_bus::{BusKind, RegisterBus};
use crate::sensor_model::{RetentionSetfiles, SensorDescriptor};

const MODEL_ID_ADDR: u16 = 0x0000;
const MODE_SELECT_ADDR: u16 = 0x0100;
const FRAME_COUNT_ADDR: u16 = 0x0005;

#[derive(Clone, Debug, PartialEq)]
pub enum BusTransaction {
    Read8(u16),
    Read16(u16),
    Write8(u16, u8),
    Write16(u16, u16),
    Array16(u16, Vec<u16>),
    Burst16(u16, Vec<u16>),
    Sequential8(u16, Vec<u8>),
}

impl BusTransaction {
    pub fn is_write(&self) -> bool {
        !matches!(self, BusTransaction::Read8(_) | BusTransaction::Read16(_))
    }
}

/// How the frame counter behaves while the sensor is told to stream.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FrameCounterBehavior {
    /// Counts frames whenever mode_select has its stream bit set.
    Normal,
    /// Always reads as the stream-off sentinel.
    StuckOff,
    /// Never reads as the stream-off sentinel.
    StuckOn,
}

/// Byte-addressed register map holding big-endian 16-bit values. The frame
/// counter at 0x0005 follows the stream bit of mode_select (0x0100), and
/// side-effect writes can be attached to the stream-off transition.
pub struct SimSensorBus {
    kind: BusKind,
    regs: HashMap<u16, u8>,
    off_sentinel: u8,
    frame_counter: FrameCounterBehavior,
    frame_count: u8,
    // Reads of the frame counter after stream-on that still report "off".
    startup_reads: u32,
    startup_remaining: u32,
    on_stream_off: Vec<(u16, u16)>,

    failing_reads: HashSet<u16>,
    failing_writes: HashSet<u16>,

    log: Vec<BusTransaction>,
    port_words: HashMap<u16, Vec<u16>>,
}

impl SimSensorBus {
    pub fn new(model_id: u16) -> Self {
        let mut bus = SimSensorBus{kind: BusKind::I2c,
                                   regs: HashMap::new(),
                                   off_sentinel: 0xFF,
                                   frame_counter: FrameCounterBehavior::Normal,
                                   frame_count: 0,
                                   startup_reads: 0,
                                   startup_remaining: 0,
                                   on_stream_off: Vec::new(),
                                   failing_reads: HashSet::new(),
                                   failing_writes: HashSet::new(),
                                   log: Vec::new(),
                                   port_words: HashMap::new()};
        bus.poke16(MODEL_ID_ADDR, model_id);
        bus
    }

    /// A bus answering like `desc`'s sensor, including its retention RAM
    /// handshake if it has one.
    pub fn for_sensor(desc: &SensorDescriptor) -> Self {
        let mut bus = SimSensorBus::new(desc.sensor_id)
            .with_off_sentinel(desc.stream_off_sentinel);
        if let Some(retention) = desc.retention {
            bus.emulate_retention(retention);
        }
        bus
    }

    pub fn with_kind(mut self, kind: BusKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_off_sentinel(mut self, sentinel: u8) -> Self {
        self.off_sentinel = sentinel;
        self
    }

    pub fn set_frame_counter(&mut self, behavior: FrameCounterBehavior) {
        self.frame_counter = behavior;
    }

    /// After each stream-on, the frame counter keeps reporting "off" for this
    /// many reads.
    pub fn set_startup_reads(&mut self, reads: u32) {
        self.startup_reads = reads;
    }

    /// Registers written by the sensor itself when streaming stops.
    pub fn on_stream_off(&mut self, addr: u16, value: u16) {
        self.on_stream_off.push((addr, value));
    }

    /// Stream-off completes the retention checksum: the request register
    /// clears and both status registers report `ok_value`.
    pub fn emulate_retention(&mut self, retention: &RetentionSetfiles) {
        self.on_stream_off(retention.checksum_enable, 0);
        self.on_stream_off(retention.checksum_passed, retention.ok_value);
        self.on_stream_off(retention.ram_ready, retention.ok_value);
    }

    pub fn fail_reads_of(&mut self, addr: u16) {
        self.failing_reads.insert(addr);
    }

    pub fn fail_writes_to(&mut self, addr: u16) {
        self.failing_writes.insert(addr);
    }

    pub fn clear_failures(&mut self) {
        self.failing_reads.clear();
        self.failing_writes.clear();
    }

    pub fn peek8(&self, addr: u16) -> u8 {
        *self.regs.get(&addr).unwrap_or(&0)
    }

    pub fn peek16(&self, addr: u16) -> u16 {
        (self.peek8(addr) as u16) << 8 | self.peek8(addr.wrapping_add(1)) as u16
    }

    /// Sets a register without logging a transaction.
    pub fn poke16(&mut self, addr: u16, value: u16) {
        self.regs.insert(addr, (value >> 8) as u8);
        self.regs.insert(addr.wrapping_add(1), value as u8);
    }

    pub fn transactions(&self) -> &[BusTransaction] {
        &self.log
    }

    pub fn clear_transactions(&mut self) {
        self.log.clear();
    }

    pub fn write_count(&self) -> usize {
        self.log.iter().filter(|t| t.is_write()).count()
    }

    pub fn reads_of(&self, addr: u16) -> usize {
        self.log.iter().filter(|t| match t {
            BusTransaction::Read8(a) | BusTransaction::Read16(a) => *a == addr,
            _ => false,
        }).count()
    }

    /// All words written to `addr` as a data port, in order.
    pub fn port_words(&self, addr: u16) -> &[u16] {
        self.port_words.get(&addr).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Last value written to `addr` with write16, if any.
    pub fn last_write16(&self, addr: u16) -> Option<u16> {
        self.log.iter().rev().find_map(|t| match t {
            BusTransaction::Write16(a, v) if *a == addr => Some(*v),
            _ => None,
        })
    }

    pub fn is_streaming(&self) -> bool {
        self.peek8(MODE_SELECT_ADDR) & 0x01 != 0
    }

    fn check_read(&self, addr: u16) -> Result<(), CanonicalError> {
        if self.failing_reads.contains(&addr) {
            return Err(unavailable_error(
                format!("simulated read failure at {:#06x}", addr).as_str()));
        }
        Ok(())
    }

    fn check_write(&self, addr: u16) -> Result<(), CanonicalError> {
        if self.failing_writes.contains(&addr) {
            return Err(unavailable_error(
                format!("simulated write failure at {:#06x}", addr).as_str()));
        }
        Ok(())
    }

    fn frame_counter_value(&mut self) -> u8 {
        let streaming = self.is_streaming();
        match self.frame_counter {
            FrameCounterBehavior::StuckOff => self.off_sentinel,
            FrameCounterBehavior::StuckOn => {
                self.next_frame_count()
            },
            FrameCounterBehavior::Normal => {
                if !streaming {
                    return self.off_sentinel;
                }
                if self.startup_remaining > 0 {
                    self.startup_remaining -= 1;
                    return self.off_sentinel;
                }
                self.next_frame_count()
            },
        }
    }

    fn next_frame_count(&mut self) -> u8 {
        self.frame_count = self.frame_count.wrapping_add(1);
        if self.frame_count == self.off_sentinel {
            self.frame_count = self.frame_count.wrapping_add(1);
        }
        self.frame_count
    }

    fn store8(&mut self, addr: u16, value: u8) {
        let was_streaming = self.is_streaming();
        self.regs.insert(addr, value);
        if addr == MODE_SELECT_ADDR {
            let streaming = self.is_streaming();
            if streaming && !was_streaming {
                self.startup_remaining = self.startup_reads;
            } else if !streaming && was_streaming {
                for (reg, val) in self.on_stream_off.clone() {
                    self.poke16(reg, val);
                }
            }
        }
    }

    fn store16(&mut self, addr: u16, value: u16) {
        self.store8(addr, (value >> 8) as u8);
        self.store8(addr.wrapping_add(1), value as u8);
        self.port_words.entry(addr).or_default().push(value);
    }
}

impl RegisterBus for SimSensorBus {
    fn kind(&self) -> BusKind {
        self.kind
    }

    fn read8(&mut self, addr: u16) -> Result<u8, CanonicalError> {
        self.log.push(BusTransaction::Read8(addr));
        self.check_read(addr)?;
        if addr == FRAME_COUNT_ADDR {
            return Ok(self.frame_counter_value());
        }
        Ok(self.peek8(addr))
    }

    fn read16(&mut self, addr: u16) -> Result<u16, CanonicalError> {
        self.log.push(BusTransaction::Read16(addr));
        self.check_read(addr)?;
        Ok(self.peek16(addr))
    }

    fn write8(&mut self, addr: u16, value: u8) -> Result<(), CanonicalError> {
        self.log.push(BusTransaction::Write8(addr, value));
        self.check_write(addr)?;
        self.store8(addr, value);
        Ok(())
    }

    fn write16(&mut self, addr: u16, value: u16) -> Result<(), CanonicalError> {
        self.log.push(BusTransaction::Write16(addr, value));
        self.check_write(addr)?;
        self.store16(addr, value);
        Ok(())
    }

    fn write16_array(&mut self, addr: u16, values: &[u16])
                     -> Result<(), CanonicalError> {
        self.log.push(BusTransaction::Array16(addr, values.to_vec()));
        self.check_write(addr)?;
        for (i, value) in values.iter().enumerate() {
            self.store16(addr.wrapping_add(2 * i as u16), *value);
        }
        Ok(())
    }

    fn write16_burst(&mut self, addr: u16, values: &[u16])
                     -> Result<(), CanonicalError> {
        self.log.push(BusTransaction::Burst16(addr, values.to_vec()));
        self.check_write(addr)?;
        for value in values {
            self.store16(addr, *value);
        }
        Ok(())
    }

    fn write8_sequential(&mut self, addr: u16, values: &[u8])
                         -> Result<(), CanonicalError> {
        self.log.push(BusTransaction::Sequential8(addr, values.to_vec()));
        self.check_write(addr)?;
        for (i, value) in values.iter().enumerate() {
            self.store8(addr.wrapping_add(i as u16), *value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_counter_follows_mode_select() {
        let mut bus = SimSensorBus::new(0x0841);
        assert_eq!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0xFF);
        bus.write16(MODE_SELECT_ADDR, 0x0103).unwrap();
        assert_ne!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0xFF);
        bus.write16(MODE_SELECT_ADDR, 0x0003).unwrap();
        assert_eq!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0xFF);
    }

    #[test]
    fn test_counter_never_reports_sentinel_while_streaming() {
        let mut bus = SimSensorBus::new(0x0841).with_off_sentinel(0x00);
        bus.write16(MODE_SELECT_ADDR, 0x0103).unwrap();
        for _ in 0..600 {
            assert_ne!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0x00);
        }
    }

    #[test]
    fn test_startup_reads() {
        let mut bus = SimSensorBus::new(0x0841);
        bus.set_startup_reads(2);
        bus.write16(MODE_SELECT_ADDR, 0x0103).unwrap();
        assert_eq!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0xFF);
        assert_eq!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0xFF);
        assert_ne!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0xFF);
    }

    #[test]
    fn test_stream_off_side_effects() {
        let mut bus = SimSensorBus::new(0x0841);
        bus.on_stream_off(0x19C4, 0x0100);
        bus.write16(MODE_SELECT_ADDR, 0x0103).unwrap();
        assert_eq!(bus.peek16(0x19C4), 0);
        bus.write16(MODE_SELECT_ADDR, 0x0003).unwrap();
        assert_eq!(bus.peek16(0x19C4), 0x0100);
    }

    #[test]
    fn test_for_sensor_uses_descriptor() {
        let mut bus = SimSensorBus::for_sensor(&crate::hm3::DESCRIPTOR);
        assert_eq!(bus.read16(MODEL_ID_ADDR).unwrap(), 0x1AD3);
        assert_eq!(bus.read8(FRAME_COUNT_ADDR).unwrap(), 0x00);
        bus.write16(MODE_SELECT_ADDR, 0x0103).unwrap();
        bus.write16(MODE_SELECT_ADDR, 0x0003).unwrap();
        assert_eq!(bus.peek16(0x19C2), 0x0100);
    }

    #[test]
    fn test_failure_injection_is_logged() {
        let mut bus = SimSensorBus::new(0x0841);
        bus.fail_reads_of(0x0005);
        assert!(bus.read8(0x0005).is_err());
        assert_eq!(bus.reads_of(0x0005), 1);
        bus.clear_failures();
        assert!(bus.read8(0x0005).is_ok());
    }
}
