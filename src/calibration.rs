use canonical_error::{CanonicalError, invalid_argument_error};
use log::{debug, info};

use crate::register_bus::RegisterBus;

/// Byte range of the calibration buffer. `end` is the offset of the last
/// 16-bit word, so the range covers `start..=end + 1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CalRange {
    pub start: usize,
    pub end: usize,
    /// Write the range as one burst instead of word by word.
    pub burst: bool,
}

/// Supplies per-module calibration data, typically read from the camera
/// module's EEPROM. The buffer layout is owned by the module vendor; the
/// controller only sees byte ranges to copy into the sensor.
pub trait CalibrationSource: Send {
    /// Returns None if the calibration data could not be read.
    fn buffer(&self) -> Option<&[u8]>;

    fn ranges(&self) -> &[CalRange];

    /// If true, the first range starts with a two byte marker: 0xFF 0x00 for
    /// big-endian words, anything else for little-endian.
    fn endian_marker(&self) -> bool {
        false
    }
}

/// Calibration held in memory. Used by tests and the demo binaries.
pub struct StaticCalibration {
    pub data: Vec<u8>,
    pub ranges: Vec<CalRange>,
    pub endian_marker: bool,
}

impl CalibrationSource for StaticCalibration {
    fn buffer(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn ranges(&self) -> &[CalRange] {
        &self.ranges
    }

    fn endian_marker(&self) -> bool {
        self.endian_marker
    }
}

const EMPTY_RUN: usize = 16;

fn all_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0xFF)
}

/// An unprogrammed EEPROM reads all 0xFF. We look at 16 bytes just past the
/// first range's header and the last 16 bytes of the final range.
fn is_empty(buf: &[u8], ranges: &[CalRange]) -> bool {
    if let Some(first) = ranges.first() {
        if let Some(head) = buf.get(first.start + 2..first.start + 2 + EMPTY_RUN) {
            if all_erased(head) {
                return true;
            }
        }
    }
    if let Some(last) = ranges.last() {
        if last.end + 1 >= EMPTY_RUN {
            if let Some(tail) = buf.get(last.end + 1 - EMPTY_RUN..=last.end) {
                if all_erased(tail) {
                    return true;
                }
            }
        }
    }
    false
}

/// Copies the calibration ranges into the sensor through `data_port`.
/// Returns false (and writes nothing) when there is no usable calibration.
pub fn write_calibration(bus: &mut dyn RegisterBus, data_port: u16,
                         source: &dyn CalibrationSource) -> Result<bool, CanonicalError> {
    let Some(buf) = source.buffer() else {
        info!("[write_calibration] calibration not read, skipping");
        return Ok(false);
    };
    let ranges = source.ranges();
    if ranges.is_empty() {
        info!("[write_calibration] no calibration ranges, skipping");
        return Ok(false);
    }
    if is_empty(buf, ranges) {
        info!("[write_calibration] empty calibration, skipping");
        return Ok(false);
    }
    for range in ranges {
        if range.start > range.end || range.end + 1 >= buf.len() {
            return Err(invalid_argument_error(
                format!("calibration range {:#x}..{:#x} outside buffer of {} bytes",
                        range.start, range.end, buf.len()).as_str()));
        }
        if (range.end + 2 - range.start) % 2 != 0 {
            return Err(invalid_argument_error(
                format!("calibration range {:#x}..{:#x} is not a whole number of words",
                        range.start, range.end).as_str()));
        }
    }

    let mut big_endian = true;
    for (i, range) in ranges.iter().enumerate() {
        let mut start = range.start;
        if i == 0 && source.endian_marker() {
            big_endian = buf[start] == 0xFF && buf[start + 1] == 0x00;
            start += 2;
        }
        let words: Vec<u16> = buf[start..=range.end + 1].chunks_exact(2).map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        }).collect();
        debug!("[write_calibration] range {:#x}..{:#x} {} words burst {}",
               start, range.end, words.len(), range.burst);
        if range.burst {
            bus.write16_burst(data_port, &words)?;
        } else {
            for word in words {
                bus.write16(data_port, word)?;
            }
        }
    }
    info!("[write_calibration] done, big endian {}", big_endian);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_bus::{BusTransaction, SimSensorBus};

    fn make_cal(endian_marker: bool, burst: bool) -> StaticCalibration {
        let mut data: Vec<u8> = (0..64u8).collect();
        if endian_marker {
            data[0] = 0xFF;
            data[1] = 0x00;
        }
        StaticCalibration{data,
                          ranges: vec![CalRange{start: 0, end: 30, burst},
                                       CalRange{start: 40, end: 46, burst}],
                          endian_marker}
    }

    #[test]
    fn test_big_endian_marker_skips_header() {
        let mut bus = SimSensorBus::new(0x0841);
        let cal = make_cal(true, false);
        assert!(write_calibration(&mut bus, 0x6F12, &cal).unwrap());
        let words = bus.port_words(0x6F12);
        // First range is 2..=31, 15 words; second is 40..=47, 4 words.
        assert_eq!(words.len(), 19);
        assert_eq!(words[0], 0x0203);
        assert_eq!(words[15], 0x2829);
    }

    #[test]
    fn test_little_endian_without_marker_byte() {
        let mut bus = SimSensorBus::new(0x0841);
        let mut cal = make_cal(true, false);
        cal.data[1] = 0x01;
        assert!(write_calibration(&mut bus, 0x6F12, &cal).unwrap());
        assert_eq!(bus.port_words(0x6F12)[0], 0x0302);
    }

    #[test]
    fn test_burst_ranges() {
        let mut bus = SimSensorBus::new(0x0841);
        let cal = make_cal(false, true);
        assert!(write_calibration(&mut bus, 0x6F12, &cal).unwrap());
        let bursts = bus.transactions().iter()
            .filter(|t| matches!(t, BusTransaction::Burst16(0x6F12, _))).count();
        assert_eq!(bursts, 2);
        assert_eq!(bus.port_words(0x6F12)[0], 0x0001);
    }

    #[test]
    fn test_erased_calibration_is_skipped() {
        let mut bus = SimSensorBus::new(0x0841);
        let mut cal = make_cal(false, false);
        for b in &mut cal.data[2..18] {
            *b = 0xFF;
        }
        assert!(!write_calibration(&mut bus, 0x6F12, &cal).unwrap());
        assert_eq!(bus.write_count(), 0);

        let mut cal = make_cal(false, false);
        for b in &mut cal.data[31..=46] {
            *b = 0xFF;
        }
        assert!(!write_calibration(&mut bus, 0x6F12, &cal).unwrap());
        assert_eq!(bus.write_count(), 0);
    }

    #[test]
    fn test_range_outside_buffer() {
        let mut bus = SimSensorBus::new(0x0841);
        let mut cal = make_cal(false, false);
        cal.ranges.push(CalRange{start: 60, end: 70, burst: false});
        assert!(write_calibration(&mut bus, 0x6F12, &cal).is_err());
        assert_eq!(bus.write_count(), 0);
    }

    #[test]
    fn test_odd_length_range_rejected() {
        let mut bus = SimSensorBus::new(0x0841);
        let mut cal = make_cal(false, false);
        cal.ranges.push(CalRange{start: 49, end: 52, burst: false});
        let err = write_calibration(&mut bus, 0x6F12, &cal).unwrap_err();
        assert_eq!(err.code, canonical_error::CanonicalErrorCode::InvalidArgument);
        assert_eq!(bus.write_count(), 0);
    }
}
