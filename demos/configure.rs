//! Exercises the configuration surface of the command engine (C6) against a
//! real reader: reset, antenna/power selection, RF link profile, region and
//! temperature.
//!
//! Run with: `cargo run --features serial-demo --bin configure-demo -- /dev/ttyUSB0`

use std::env;
use std::error::Error;
use std::io;

use tokio_serial::{SerialPort, SerialPortBuilderExt};

use indy_r2000::transport::BaudRateControl;
use indy_r2000::{AntennaId, Reader, ReaderConfig, RfLinkProfile};

struct SerialBaud(tokio_serial::SerialStream);

impl BaudRateControl for SerialBaud {
    fn set_baud_rate(&mut self, bits_per_second: u32) -> io::Result<()> {
        self.0
            .set_baud_rate(bits_per_second)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".into());
    let port = tokio_serial::new(&path, 115_200).open_native_async()?;
    let baud_handle = SerialBaud(port.try_clone_native()?);

    let (reader, _events) = Reader::connect(port, baud_handle, ReaderConfig::default());

    reader.reset().await?;
    println!("reset ok");

    let version = reader.get_firmware_version().await?;
    println!("firmware version: {:02X?}", version);

    reader.set_working_antenna(AntennaId::A1).await?;
    println!("working antenna set to A1, now reporting {:?}", reader.get_working_antenna().await?);

    reader.set_output_power(indy_r2000::OutputPower::All(26)).await?;
    println!("output power set to 26 dBm, now reporting {:?}", reader.get_output_power().await?);

    reader.set_rf_link_profile(RfLinkProfile::P1).await?;
    println!("rf link profile now {:?}", reader.get_rf_link_profile().await?);

    let band = reader.get_frequency_band().await?;
    println!("frequency band: {band:?}");

    let temp = reader.get_temperature().await?;
    println!("module temperature: {temp} C");

    Ok(())
}
