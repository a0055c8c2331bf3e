//! Example device: a relay, two sensors and a measurement channel that
//! push random readings every few seconds.
//!
//! ```bash
//! cargo run -p supla-client --example device
//! ```

use std::time::Duration;

use rand::Rng;
use supla_client::{
    channels::{GeneralPurposeMeasurement, Relay, Temperature, TemperatureAndHumidity},
    Device, DeviceConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let mut config = DeviceConfig::new(
        "127.0.0.1",
        2015,
        *b"\xEE\xEE\xEE\xEE\xE5\x34\xD1\xA7\x06\xAC\x5F\x41\x67\x19\x89\x9E",
    );
    config.authkey = *b"\xFF\xFF\xFF\xFF\x4A\xD3\xB8\xAA\x36\x66\x21\x6F\x2A\x86\x42\x23";
    config.name = "Test Device".to_owned();

    let relay = Relay::with_callback(Some(Box::new(|value| {
        tracing::info!("relay changed to {value:?}");
    })));
    let temperature = Temperature::new();
    let temp_and_humidity = TemperatureAndHumidity::new();
    let measurement = GeneralPurposeMeasurement::new();

    let mut device = Device::new(config);
    device
        .add(&relay)
        .add(&temperature)
        .add(&temp_and_humidity)
        .add(&measurement);
    let running = device.start().await?;
    tracing::info!("device registered");

    let updates = async {
        loop {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let mut rng = rand::thread_rng();
            temperature.set(rng.gen_range(10.0..30.0));
            temp_and_humidity.set_temperature(rng.gen_range(10.0..30.0));
            temp_and_humidity.set_humidity(rng.gen_range(50.0..80.0));
            measurement.set(rng.gen_range(-100.0..100.0));
        }
    };

    tokio::select! {
        () = updates => {},
        _ = tokio::signal::ctrl_c() => {},
    }

    running.stop().await;
    Ok(())
}
