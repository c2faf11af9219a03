//! Open the first EasyPort device, set an output byte, and read it back.

use easyport_core::{ConnectionConfig, EasyPort, ReadByteParams, WriteByteParams};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut port = EasyPort::open_index(0, ConnectionConfig::default())?;

    let ok = port.write_byte(WriteByteParams::new(1, 0, 0, 9)).await?;
    println!("write verified: {}", ok);

    let value = port.read_byte(ReadByteParams::new(1, 0, 0)).await?;
    println!("output byte reads back as {}", value);

    port.close().await?;
    Ok(())
}
