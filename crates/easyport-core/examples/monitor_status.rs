//! Stream the module's status word for a second.

use easyport_core::{ConnectionConfig, EasyPort};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut port = EasyPort::open_index(0, ConnectionConfig::default())?;

    port.set_enabled_listener(|enabled| println!("monitoring enabled: {}", enabled));
    port.set_value_listener(|value| println!("status word: {:#06X}", value));

    port.enable_monitoring().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    port.disable_monitoring().await?;

    port.close().await?;
    Ok(())
}
