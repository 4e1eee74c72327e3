use serde::{Deserialize, Serialize};

use super::{ParseResult, ProtocolError};

// telemetry body : voltage(2) + current(2) + status(1) + temperature(1) + timestamp(4)
pub const TELEMETRY_FRAME_SIZE: usize =
    u16::WIDTH + i16::WIDTH + u8::WIDTH + i8::WIDTH + u32::WIDTH;

const _: () = assert!(TELEMETRY_FRAME_SIZE == 10);

/// A fixed-width field written little-endian with no padding.
pub trait LeField: Copy {
    const WIDTH: usize;

    fn write_le(self, out: &mut [u8]);
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! le_field {
    ($($ty:ty),* $(,)?) => {$(
        impl LeField for $ty {
            const WIDTH: usize = core::mem::size_of::<$ty>();

            fn write_le(self, out: &mut [u8]) {
                out[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; core::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::WIDTH]);
                <$ty>::from_le_bytes(raw)
            }
        }
    )*};
}

le_field!(u8, i8, u16, i16, u32);

/// Sequential writer over a buffer sized from the same field widths.
struct LeWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> LeWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put<F: LeField>(&mut self, value: F) -> &mut Self {
        value.write_le(&mut self.buf[self.pos..]);
        self.pos += F::WIDTH;
        self
    }
}

struct LeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<F: LeField>(&mut self) -> F {
        let value = F::read_le(&self.buf[self.pos..]);
        self.pos += F::WIDTH;
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PowerStatus {
    Off = 0,
    On = 1,
}

impl TryFrom<u8> for PowerStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PowerStatus::Off),
            1 => Ok(PowerStatus::On),
            _ => Err(ProtocolError::InvalidStatus(value)),
        }
    }
}

/// One snapshot of battery measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Millivolts.
    pub voltage_mv: u16,
    /// Milliamps, negative while charging.
    pub current_ma: i16,
    pub status: PowerStatus,
    /// Whole degrees Celsius.
    pub temperature_c: i8,
    /// Seconds since boot or since the Unix epoch, depending on the device clock.
    pub timestamp: u32,
}

impl TelemetryRecord {
    pub fn encode(&self) -> [u8; TELEMETRY_FRAME_SIZE] {
        let mut bytes = [0u8; TELEMETRY_FRAME_SIZE];

        LeWriter::new(&mut bytes)
            .put(self.voltage_mv)
            .put(self.current_ma)
            .put(self.status as u8)
            .put(self.temperature_c)
            .put(self.timestamp);

        bytes
    }

    pub fn decode(bytes: &[u8]) -> ParseResult<Self> {
        if bytes.len() < TELEMETRY_FRAME_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: TELEMETRY_FRAME_SIZE,
                available: bytes.len(),
            });
        }

        let mut reader = LeReader::new(bytes);

        Ok(Self {
            voltage_mv: reader.take(),
            current_ma: reader.take(),
            status: PowerStatus::try_from(reader.take::<u8>())?,
            temperature_c: reader.take(),
            timestamp: reader.take(),
        })
    }

    /// Text body for controllers that expect a plain voltage, e.g. `3.87V`.
    pub fn to_text(&self) -> String {
        format!("{:.2}V", f64::from(self.voltage_mv) / 1000.0)
    }
}
