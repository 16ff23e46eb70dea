//! Network transport traits.
//!
//! The remote event channel is framed over these so the transport can be
//! swapped (plain TCP, an in-memory pipe in tests).

use crate::error::Result;

/// Opens and accepts byte-stream connections.
pub trait NetworkBackend {
    /// Start listening for incoming connections on the given port.
    fn listen(&mut self, port: u16) -> Result<()>;

    /// Accept a pending connection. Returns `None` if no connection waiting.
    fn accept(&mut self) -> Result<Option<Box<dyn NetworkStream>>>;

    /// Open an outbound connection.
    fn connect(&mut self, address: &str, port: u16) -> Result<Box<dyn NetworkStream>>;
}

/// A bidirectional byte stream.
///
/// `read` on a stream with no pending data returns an `Io` error of kind
/// `WouldBlock`; `Ok(0)` means the peer closed the connection.
pub trait NetworkStream: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, data: &[u8]) -> Result<usize>;
    fn close(&mut self) -> Result<()>;
}
