//! Example client: register, print the startup listing, then follow
//! value updates.
//!
//! ```bash
//! cargo run -p supla-client --example client
//! ```

use supla_client::{client::ClientConfig, Client};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let mut config = ClientConfig::new("127.0.0.1", 2016, "Example Client");
    config.secure = true;

    let mut client = Client::register(config).await?;
    tracing::info!("registered as client {}", client.client_id);

    for location in &client.location_pack.items {
        tracing::info!("location {}: {}", location.id, location.caption);
    }
    for pack in &client.channel_packs {
        for channel in &pack.items {
            tracing::info!(
                "channel {}: {} ({:?}, online={})",
                channel.id,
                channel.caption,
                channel.channel_type,
                channel.online
            );
        }
    }
    for scene in &client.scene_pack.items {
        tracing::info!("scene {}: {}", scene.id, scene.caption);
    }

    loop {
        let pack = client.recv_value_pack().await?;
        for item in pack.items {
            tracing::info!(
                "value update: channel {} online={} value={:?}",
                item.id,
                item.online,
                item.value.value
            );
        }
    }
}
