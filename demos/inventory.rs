//! Opens a real serial link to an Indy R2000 reader and streams tag
//! sightings from a real-time inventory round until interrupted.
//!
//! Run with: `cargo run --features serial-demo --bin inventory-demo -- /dev/ttyUSB0`

use std::env;
use std::error::Error;
use std::io;

use futures_util::StreamExt;
use tokio_serial::{SerialPort, SerialPortBuilderExt};

use indy_r2000::transport::BaudRateControl;
use indy_r2000::{Event, Reader, ReaderConfig};

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

    let (reader, mut events) = Reader::connect(port, baud_handle, ReaderConfig::default());

    reader.reset().await?;
    reader.start_real_time_inventory(0).await?;

    println!("listening for tags on {path}, press ctrl-c to stop");
    loop {
        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Event::Tag(tag)) => {
                        println!(
                            "antenna {:?} freq {:?} epc {} rssi {} dBm",
                            tag.antenna,
                            tag.frequency_mhz(),
                            indy_r2000::codec::to_hex(&tag.epc),
                            tag.rssi_dbm
                        );
                    }
                    Some(Event::AntennaMissing(missing)) => {
                        println!("antenna {:?} missing: {}", missing.antenna, missing.error_code.name());
                    }
                    Some(Event::Tag6B(tag)) => {
                        println!("6B tag on antenna {:?}: {:02X?}", tag.antenna, tag.uid);
                    }
                    None => {
                        println!("event stream closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("stopping");
                break;
            }
        }
    }

    Ok(())
}
