//! The byte-sink contract (§6): the engine asks only for an
//! `AsyncRead + AsyncWrite` byte stream. Anything satisfying that bound — a
//! real serial port, an in-memory duplex for tests, a TCP bridge — works as
//! the transport without the engine knowing the difference, the same way
//! the teacher's `ws::Server` is generic over "whatever `tokio_websockets`
//! wraps" rather than hard-coding `TcpStream`.
//!
//! Baud-rate control is a separate, optional side channel ([`BaudRateControl`])
//! rather than part of the transport bound, because changing line speed on
//! a real serial port happens on a handle distinct from the split
//! read/write halves the engine drives the wire with.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

/// The full bound a transport must satisfy to back a [`crate::Reader`].
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Implemented by a side-channel handle that can change the underlying
/// link's line speed in place, e.g. after a successful `SET_BAUD`. Supplied
/// independently of the transport so the transport itself can be split into
/// owned read/write halves without losing the ability to retune it.
pub trait BaudRateControl: Send + 'static {
    fn set_baud_rate(&mut self, bits_per_second: u32) -> io::Result<()>;
}

/// A baud handle for transports that don't support (or don't need) runtime
/// retuning — an in-memory duplex used in tests, or a fixed-rate bridge.
pub struct NoBaudControl;

impl BaudRateControl for NoBaudControl {
    fn set_baud_rate(&mut self, _bits_per_second: u32) -> io::Result<()> {
        Ok(())
    }
}
