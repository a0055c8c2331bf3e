//! Typed views over the opaque 8-byte channel values.
//!
//! The server treats channel values as opaque bytes; only the action logic
//! and device-side code need to interpret them. Sensors encode "no reading
//! yet" with sentinel values (-275 °C, -1 % humidity) rather than a
//! separate flag.

use crate::records::ChannelValue;

/// Temperature sentinel for "no reading", in °C.
pub const TEMPERATURE_NOT_AVAILABLE: f64 = -275.0;

/// Relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayValue {
    /// The relay is closed.
    pub on: bool,
    /// Relay-specific modifier bits.
    pub flags: u16,
}

impl RelayValue {
    /// Pack into the wire value.
    pub fn encode(self) -> ChannelValue {
        let mut value = [0; 8];
        value[0] = u8::from(self.on);
        value[1..3].copy_from_slice(&self.flags.to_le_bytes());
        value
    }

    /// Unpack from the wire value.
    pub fn decode(value: ChannelValue) -> Self {
        Self { on: value[0] & 0x01 != 0, flags: u16::from_le_bytes([value[1], value[2]]) }
    }

    /// The wire value with the on/off bit inverted.
    pub fn toggled(value: ChannelValue) -> ChannelValue {
        Self { on: !Self::decode(value).on, flags: 0 }.encode()
    }
}

/// Dimmer brightness, 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DimmerValue {
    /// Brightness percentage.
    pub brightness: u8,
}

impl DimmerValue {
    /// Pack into the wire value.
    pub fn encode(self) -> ChannelValue {
        let mut value = [0; 8];
        value[0] = self.brightness;
        value
    }

    /// Unpack from the wire value.
    pub fn decode(value: ChannelValue) -> Self {
        Self { brightness: value[0] }
    }
}

/// Thermometer reading in °C; `None` before the first measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TemperatureValue {
    /// Measured temperature.
    pub celsius: Option<f64>,
}

impl TemperatureValue {
    /// Pack into the wire value.
    pub fn encode(self) -> ChannelValue {
        self.celsius.unwrap_or(TEMPERATURE_NOT_AVAILABLE).to_le_bytes()
    }

    /// Unpack from the wire value.
    pub fn decode(value: ChannelValue) -> Self {
        let celsius = f64::from_le_bytes(value);
        Self { celsius: (celsius != TEMPERATURE_NOT_AVAILABLE).then_some(celsius) }
    }
}

/// Combined temperature/humidity reading, packed as two scaled `i32`s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempAndHumidityValue {
    /// Temperature in °C; `None` before the first measurement.
    pub temperature: Option<f64>,
    /// Relative humidity in percent; `None` before the first measurement.
    pub humidity: Option<f64>,
}

impl TempAndHumidityValue {
    const TEMPERATURE_NONE: i32 = -275_000;
    const HUMIDITY_NONE: i32 = -1000;

    /// Pack into the wire value.
    pub fn encode(self) -> ChannelValue {
        let temperature =
            self.temperature.map_or(Self::TEMPERATURE_NONE, |t| (t * 1000.0) as i32);
        let humidity = self.humidity.map_or(Self::HUMIDITY_NONE, |h| (h * 1000.0) as i32);
        let mut value = [0; 8];
        value[..4].copy_from_slice(&temperature.to_le_bytes());
        value[4..].copy_from_slice(&humidity.to_le_bytes());
        value
    }

    /// Unpack from the wire value.
    pub fn decode(value: ChannelValue) -> Self {
        let temperature = i32::from_le_bytes([value[0], value[1], value[2], value[3]]);
        let humidity = i32::from_le_bytes([value[4], value[5], value[6], value[7]]);
        Self {
            temperature: (temperature != Self::TEMPERATURE_NONE)
                .then(|| f64::from(temperature) / 1000.0),
            humidity: (humidity != Self::HUMIDITY_NONE).then(|| f64::from(humidity) / 1000.0),
        }
    }
}

/// Free-form numeric measurement, packed as an `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpmValue {
    /// Measured value.
    pub value: f64,
}

impl GpmValue {
    /// Pack into the wire value.
    pub fn encode(self) -> ChannelValue {
        self.value.to_le_bytes()
    }

    /// Unpack from the wire value.
    pub fn decode(value: ChannelValue) -> Self {
        Self { value: f64::from_le_bytes(value) }
    }
}
