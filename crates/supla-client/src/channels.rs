//! Typed channel helpers for device implementations.
//!
//! Every helper wraps a shared cell holding the current encoded value.
//! Handing the helper to a [`crate::Device`] registers the cell; setting
//! a value afterwards pushes the change to the server, and server-side
//! writes land back in the same cell (with an optional change callback).

use std::sync::{Arc, Mutex, OnceLock};

use supla_proto::{
    records::{ActionCaps, ChannelFlags, ChannelFunc, ChannelType, ChannelValue},
    values::{DimmerValue, GpmValue, RelayValue, TempAndHumidityValue, TemperatureValue},
};
use tokio::sync::mpsc;

/// Change callback invoked when the server writes a value.
pub type ChangeCallback = Box<dyn Fn(ChannelValue) + Send + Sync>;

/// Wire-visible identity of a channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    /// Hardware kind announced at registration.
    pub channel_type: ChannelType,
    /// Function announced at registration.
    pub default_func: ChannelFunc,
    /// Action-trigger capabilities announced at registration.
    pub action_caps: ActionCaps,
    /// Capability bits announced at registration.
    pub flags: ChannelFlags,
}

/// Shared state of one channel.
pub struct ChannelCell {
    spec: ChannelSpec,
    value: Mutex<ChannelValue>,
    on_change: Option<ChangeCallback>,
    binding: OnceLock<(u8, mpsc::UnboundedSender<(u8, ChannelValue)>)>,
}

impl ChannelCell {
    fn new(spec: ChannelSpec, initial: ChannelValue, on_change: Option<ChangeCallback>) -> Arc<Self> {
        Arc::new(Self { spec, value: Mutex::new(initial), on_change, binding: OnceLock::new() })
    }

    /// Wire-visible identity.
    pub fn spec(&self) -> ChannelSpec {
        self.spec
    }

    /// Current encoded value.
    pub fn encoded_value(&self) -> ChannelValue {
        *self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Bind the cell to a device slot; called by the device driver.
    pub(crate) fn bind(&self, number: u8, updates: mpsc::UnboundedSender<(u8, ChannelValue)>) {
        let _ = self.binding.set((number, updates));
    }

    /// Store a new value and notify the server if bound.
    pub fn set_encoded_value(&self, value: ChannelValue) {
        *self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = value;
        if let Some((number, updates)) = self.binding.get() {
            let _ = updates.send((*number, value));
        }
    }

    /// Store a value written by the server and run the change callback.
    pub(crate) fn server_write(&self, value: ChannelValue) {
        *self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = value;
        if let Some(on_change) = &self.on_change {
            on_change(value);
        }
    }
}

/// Anything a [`crate::Device`] can register as a channel.
pub trait DeviceChannel {
    /// The shared cell backing this helper.
    fn cell(&self) -> &Arc<ChannelCell>;
}

macro_rules! channel_helper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            cell: Arc<ChannelCell>,
        }

        impl DeviceChannel for $name {
            fn cell(&self) -> &Arc<ChannelCell> {
                &self.cell
            }
        }

        impl $name {
            /// The shared cell backing this helper.
            pub fn cell(&self) -> &Arc<ChannelCell> {
                &self.cell
            }

            /// Current encoded value.
            pub fn encoded_value(&self) -> ChannelValue {
                self.cell.encoded_value()
            }

            /// Replace the raw encoded value.
            pub fn set_encoded_value(&self, value: ChannelValue) {
                self.cell.set_encoded_value(value);
            }
        }
    };
}

channel_helper! {
    /// A binary relay output.
    Relay
}

impl Relay {
    /// A relay reporting off.
    pub fn new() -> Self {
        Self::with_callback(None)
    }

    /// A relay with a server-write callback.
    pub fn with_callback(on_change: Option<ChangeCallback>) -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::Relay,
            default_func: ChannelFunc::PowerSwitch,
            action_caps: ActionCaps::TURN_ON | ActionCaps::TURN_OFF,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, RelayValue::default().encode(), on_change) }
    }

    /// A relay announcing the light-switch function.
    pub fn light_switch() -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::Relay,
            default_func: ChannelFunc::LightSwitch,
            action_caps: ActionCaps::TURN_ON | ActionCaps::TURN_OFF,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, RelayValue::default().encode(), None) }
    }

    /// The relay is on.
    pub fn is_on(&self) -> bool {
        RelayValue::decode(self.encoded_value()).on
    }

    /// Switch the relay and notify the server.
    pub fn set(&self, on: bool) {
        self.cell.set_encoded_value(RelayValue { on, flags: 0 }.encode());
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

channel_helper! {
    /// A thermometer.
    Temperature
}

impl Temperature {
    /// A thermometer with no reading yet.
    pub fn new() -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::Thermometer,
            default_func: ChannelFunc::Thermometer,
            action_caps: ActionCaps::NONE,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, TemperatureValue::default().encode(), None) }
    }

    /// Latest reading in °C.
    pub fn value(&self) -> Option<f64> {
        TemperatureValue::decode(self.encoded_value()).celsius
    }

    /// Report a new reading.
    pub fn set(&self, celsius: f64) {
        self.cell.set_encoded_value(TemperatureValue { celsius: Some(celsius) }.encode());
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self::new()
    }
}

channel_helper! {
    /// A humidity sensor.
    Humidity
}

impl Humidity {
    /// A humidity sensor with no reading yet.
    pub fn new() -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::HumiditySensor,
            default_func: ChannelFunc::Humidity,
            action_caps: ActionCaps::NONE,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, TempAndHumidityValue::default().encode(), None) }
    }

    /// Latest reading in percent.
    pub fn value(&self) -> Option<f64> {
        TempAndHumidityValue::decode(self.encoded_value()).humidity
    }

    /// Report a new reading.
    pub fn set(&self, humidity: f64) {
        self.cell.set_encoded_value(
            TempAndHumidityValue { temperature: None, humidity: Some(humidity) }.encode(),
        );
    }
}

impl Default for Humidity {
    fn default() -> Self {
        Self::new()
    }
}

channel_helper! {
    /// A combined temperature and humidity sensor.
    TemperatureAndHumidity
}

impl TemperatureAndHumidity {
    /// A sensor with no readings yet.
    pub fn new() -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::HumidityAndTempSensor,
            default_func: ChannelFunc::HumidityAndTemperature,
            action_caps: ActionCaps::NONE,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, TempAndHumidityValue::default().encode(), None) }
    }

    /// Latest temperature reading in °C.
    pub fn temperature(&self) -> Option<f64> {
        TempAndHumidityValue::decode(self.encoded_value()).temperature
    }

    /// Latest humidity reading in percent.
    pub fn humidity(&self) -> Option<f64> {
        TempAndHumidityValue::decode(self.encoded_value()).humidity
    }

    /// Report a new temperature, keeping the humidity reading.
    pub fn set_temperature(&self, celsius: f64) {
        let mut value = TempAndHumidityValue::decode(self.encoded_value());
        value.temperature = Some(celsius);
        self.cell.set_encoded_value(value.encode());
    }

    /// Report a new humidity, keeping the temperature reading.
    pub fn set_humidity(&self, humidity: f64) {
        let mut value = TempAndHumidityValue::decode(self.encoded_value());
        value.humidity = Some(humidity);
        self.cell.set_encoded_value(value.encode());
    }
}

impl Default for TemperatureAndHumidity {
    fn default() -> Self {
        Self::new()
    }
}

channel_helper! {
    /// A dimmable light output.
    Dimmer
}

impl Dimmer {
    /// A dimmer reporting brightness zero.
    pub fn new() -> Self {
        Self::with_callback(None)
    }

    /// A dimmer with a server-write callback.
    pub fn with_callback(on_change: Option<ChangeCallback>) -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::Dimmer,
            default_func: ChannelFunc::Dimmer,
            action_caps: ActionCaps::TURN_ON | ActionCaps::TURN_OFF,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, DimmerValue::default().encode(), on_change) }
    }

    /// Current brightness percentage.
    pub fn brightness(&self) -> u8 {
        DimmerValue::decode(self.encoded_value()).brightness
    }

    /// Set the brightness and notify the server.
    pub fn set(&self, brightness: u8) {
        self.cell.set_encoded_value(DimmerValue { brightness }.encode());
    }
}

impl Default for Dimmer {
    fn default() -> Self {
        Self::new()
    }
}

channel_helper! {
    /// A free-form numeric measurement.
    GeneralPurposeMeasurement
}

impl GeneralPurposeMeasurement {
    /// A measurement reporting zero.
    pub fn new() -> Self {
        let spec = ChannelSpec {
            channel_type: ChannelType::GeneralPurposeMeasurement,
            default_func: ChannelFunc::GeneralPurposeMeasurement,
            action_caps: ActionCaps::NONE,
            flags: ChannelFlags::CHANNELSTATE,
        };
        Self { cell: ChannelCell::new(spec, GpmValue::default().encode(), None) }
    }

    /// Latest reading.
    pub fn value(&self) -> f64 {
        GpmValue::decode(self.encoded_value()).value
    }

    /// Report a new reading.
    pub fn set(&self, value: f64) {
        self.cell.set_encoded_value(GpmValue { value }.encode());
    }
}

impl Default for GeneralPurposeMeasurement {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_round_trip() {
        let relay = Relay::new();
        assert!(!relay.is_on());
        assert_eq!(relay.encoded_value(), [0; 8]);
        relay.set(true);
        assert!(relay.is_on());
        assert_eq!(relay.encoded_value(), [1, 0, 0, 0, 0, 0, 0, 0]);
        relay.set_encoded_value([0; 8]);
        assert!(!relay.is_on());
    }

    #[test]
    fn temperature_round_trip() {
        let temp = Temperature::new();
        assert_eq!(temp.value(), None);
        assert_eq!(temp.encoded_value(), *b"\x00\x00\x00\x00\x000q\xc0");
        temp.set(3.14);
        assert_eq!(temp.value(), Some(3.14));
        temp.set_encoded_value(*b"X9\xb4\xc8v\xbe\xf3?");
        assert_eq!(temp.value(), Some(1.234));
    }

    #[test]
    fn humidity_round_trip() {
        let humidity = Humidity::new();
        assert_eq!(humidity.value(), None);
        assert_eq!(humidity.encoded_value(), *b"\xc8\xcd\xfb\xff\x18\xfc\xff\xff");
        humidity.set(42.0);
        assert_eq!(humidity.encoded_value(), *b"\xc8\xcd\xfb\xff\x10\xa4\x00\x00");
        assert_eq!(humidity.value(), Some(42.0));
    }

    #[test]
    fn temperature_and_humidity_round_trip() {
        let sensor = TemperatureAndHumidity::new();
        assert_eq!(sensor.temperature(), None);
        assert_eq!(sensor.humidity(), None);
        sensor.set_temperature(3.14);
        assert_eq!(sensor.encoded_value(), *b"D\x0c\x00\x00\x18\xfc\xff\xff");
        sensor.set_humidity(42.0);
        assert_eq!(sensor.encoded_value(), *b"D\x0c\x00\x00\x10\xa4\x00\x00");
        assert_eq!(sensor.temperature(), Some(3.14));
        assert_eq!(sensor.humidity(), Some(42.0));
    }

    #[test]
    fn server_write_triggers_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_callback = Arc::clone(&seen);
        let relay = Relay::with_callback(Some(Box::new(move |value| {
            seen_in_callback
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(value);
        })));
        relay.cell().server_write([1, 0, 0, 0, 0, 0, 0, 0]);
        assert!(relay.is_on());
        assert_eq!(
            seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).as_slice(),
            &[[1, 0, 0, 0, 0, 0, 0, 0]]
        );
    }
}
