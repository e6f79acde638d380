//! Host-side driver for the Impinj Indy R2000 UHF RFID reader family's
//! binary serial protocol.
//!
//! [`Reader`] owns the wire: a background task drives the transport's read
//! half through the frame reader (C3) and response dispatcher (C4),
//! publishing unsolicited tag events on an [`EventStream`] while the
//! typed methods in [`command`] (C6) drive the write half and await
//! replies.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::io::{split, AsyncReadExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;

pub mod accum;
pub mod catalog;
pub mod codec;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod model;
pub mod parse;
pub mod transport;

pub use catalog::*;
pub use command::OutputPower;
pub use config::ReaderConfig;
pub use error::{Error, Result};
pub use model::*;
pub use transport::{BaudRateControl, NoBaudControl, Transport};

use dispatch::Dispatcher;
use frame::FrameReader;

struct Shared<T: Transport, B: BaudRateControl> {
    dispatcher: TokioMutex<Dispatcher>,
    writer: TokioMutex<WriteHalf<T>>,
    baud: TokioMutex<B>,
}

/// A connected reader. Cloning shares the same underlying connection —
/// every clone talks to the same background task and the same pending
/// command list.
pub struct Reader<T: Transport, B: BaudRateControl = NoBaudControl> {
    shared: Arc<Shared<T, B>>,
    reader_task: Arc<JoinHandle<()>>,
}

impl<T: Transport, B: BaudRateControl> Clone for Reader<T, B> {
    fn clone(&self) -> Self {
        Reader {
            shared: self.shared.clone(),
            reader_task: self.reader_task.clone(),
        }
    }
}

impl<T: Transport, B: BaudRateControl> Drop for Reader<T, B> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.shared) == 1 {
            self.reader_task.abort();
        }
    }
}

/// A stream of unsolicited tag/antenna events, returned alongside the
/// [`Reader`] it belongs to (§9 "event vs reply duality").
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }
}

impl<T: Transport, B: BaudRateControl> Reader<T, B> {
    /// Takes ownership of `transport` and spawns the background read task.
    /// `baud` is the side channel used by [`command::Reader::set_baud_rate`]
    /// to retune the link after a successful `SET_BAUD` — pass
    /// [`NoBaudControl`] when the link's rate is fixed.
    pub fn connect(transport: T, baud: B, config: ReaderConfig) -> (Self, EventStream) {
        let (read_half, write_half) = split(transport);
        let (tx, rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            dispatcher: TokioMutex::new(Dispatcher::new(config.address)),
            writer: TokioMutex::new(write_half),
            baud: TokioMutex::new(baud),
        });

        let task_shared = shared.clone();
        let read_chunk_size = config.read_chunk_size;
        let reader_task = tokio::spawn(async move {
            run_reader_loop(task_shared, read_half, tx, read_chunk_size).await;
        });

        (
            Reader {
                shared,
                reader_task: Arc::new(reader_task),
            },
            EventStream { rx },
        )
    }

    pub async fn phase_mode(&self) -> bool {
        self.shared.dispatcher.lock().await.phase_mode()
    }

    pub async fn configured_address(&self) -> u8 {
        self.shared.dispatcher.lock().await.address()
    }
}

async fn run_reader_loop<T: Transport, B: BaudRateControl>(
    shared: Arc<Shared<T, B>>,
    mut read_half: ReadHalf<T>,
    events: mpsc::UnboundedSender<Event>,
    chunk_size: usize,
) {
    let mut framer = FrameReader::new();
    let mut chunk = vec![0u8; chunk_size];
    loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => {
                log::info!("transport closed, stopping reader task");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                log::warn!("transport read error, stopping reader task: {err}");
                return;
            }
        };
        framer.feed(&chunk[..n]);
        while let Some(packet) = framer.try_next() {
            let event = shared.dispatcher.lock().await.handle_packet(packet);
            if let Some(event) = event {
                let _ = events.send(event);
            }
        }
    }
}

/// An in-memory duplex pair, handy for tests and the `tokio::io::duplex`
/// idiom the teacher uses in its own transport tests.
pub fn mock_transport_pair(max_buf_size: usize) -> (tokio::io::DuplexStream, tokio::io::DuplexStream) {
    tokio::io::duplex(max_buf_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn reset_succeeds_on_timeout_with_no_reply() {
        let (client, _server) = mock_transport_pair(256);
        let (reader, _events) = Reader::connect(client, NoBaudControl, ReaderConfig::default());
        let result = tokio::time::timeout(Duration::from_millis(1500), reader.reset()).await;
        assert!(result.expect("should not hang").is_ok());
    }

    #[tokio::test]
    async fn set_working_antenna_round_trips_through_a_mock_transport() {
        let (client, mut server) = mock_transport_pair(256);
        let (reader, _events) = Reader::connect(client, NoBaudControl, ReaderConfig::default());

        let responder = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let outbound = [0xA0u8, 0x04, 0xFF, 0x74, 0x01];
            let mut expected = outbound.to_vec();
            expected.push(codec::lrc(&outbound));

            let mut buf = [0u8; 64];
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], expected.as_slice());

            let mut reply = vec![0xA0u8, 0x04, 0xFF, 0x74, 0x10];
            reply.push(codec::lrc(&reply));
            server.write_all(&reply).await.unwrap();
        });

        let result = reader.set_working_antenna(catalog::AntennaId::A2).await;
        assert!(result.is_ok());
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn tag_sighting_event_reaches_the_event_stream() {
        let (client, mut server) = mock_transport_pair(256);
        let (reader, mut events) = Reader::connect(client, NoBaudControl, ReaderConfig::default());
        let _ = reader.configured_address().await;

        use tokio::io::AsyncWriteExt;
        let mut payload = vec![0x04u8, 0x18, 0x00];
        payload.extend_from_slice(&[0xE2, 0x00, 0x11, 0x22, 0x33, 0x44]);
        payload.push(0x15);
        let length = (payload.len() + 3) as u8;
        let mut frame = vec![0xA0u8, length, 0xFF, catalog::Command::RealTimeInventory.opcode()];
        frame.extend_from_slice(&payload);
        let check = codec::lrc(&frame);
        frame.push(check);
        server.write_all(&frame).await.unwrap();

        let event = tokio::time::timeout(Duration::from_millis(500), events.next())
            .await
            .expect("event should arrive")
            .expect("stream should not be closed");
        assert!(matches!(event, Event::Tag(_)));
    }
}
