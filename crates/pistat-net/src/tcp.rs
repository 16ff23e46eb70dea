//! `std::net` transport.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use pistat_types::backend::{NetworkBackend, NetworkStream};
use pistat_types::error::{PistatError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Non-blocking TCP backend.
#[derive(Debug, Default)]
pub struct TcpBackend {
    listener: Option<TcpListener>,
}

impl TcpBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NetworkBackend for TcpBackend {
    fn listen(&mut self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        log::info!("listening on port {port}");
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Result<Option<Box<dyn NetworkStream>>> {
        let Some(ref listener) = self.listener else {
            return Err(PistatError::Channel("not listening".to_string()));
        };
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("accepted connection from {peer}");
                Ok(Some(Box::new(TcpChannelStream::new(stream)?)))
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn connect(&mut self, address: &str, port: u16) -> Result<Box<dyn NetworkStream>> {
        let addr = (address, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| PistatError::Channel(format!("no addresses for {address}:{port}")))?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        Ok(Box::new(TcpChannelStream::new(stream)?))
    }
}

/// A connected, non-blocking TCP stream.
#[derive(Debug)]
pub struct TcpChannelStream {
    inner: TcpStream,
}

impl TcpChannelStream {
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self { inner: stream })
    }
}

impl NetworkStream for TcpChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.inner.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.inner.write(data)?)
    }

    fn close(&mut self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_port() -> u16 {
        let tmp = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = tmp.local_addr().unwrap().port();
        drop(tmp);
        port
    }

    fn read_with_retry(stream: &mut dyn NetworkStream, buf: &mut [u8]) -> usize {
        for _ in 0..50 {
            match stream.read(buf) {
                Ok(n) => return n,
                Err(PistatError::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                },
                Err(e) => panic!("read failed: {e}"),
            }
        }
        panic!("no data arrived");
    }

    #[test]
    fn accept_without_listen_is_error() {
        let mut backend = TcpBackend::new();
        assert!(backend.accept().is_err());
    }

    #[test]
    fn listen_accept_and_exchange() {
        let mut backend = TcpBackend::new();
        let port = free_port();
        backend.listen(port).unwrap();
        assert!(backend.accept().unwrap().is_none());

        let mut client = backend.connect("127.0.0.1", port).unwrap();
        let mut server = None;
        for _ in 0..50 {
            if let Some(s) = backend.accept().unwrap() {
                server = Some(s);
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let mut server = server.expect("connection accepted");

        client.write(b"hello\n").unwrap();
        let mut buf = [0u8; 32];
        let n = read_with_retry(server.as_mut(), &mut buf);
        assert_eq!(&buf[..n], b"hello\n");

        server.write(b"world\n").unwrap();
        let n = read_with_retry(client.as_mut(), &mut buf);
        assert_eq!(&buf[..n], b"world\n");

        client.close().unwrap();
        server.close().unwrap();
    }

    #[test]
    fn connect_refused_is_error() {
        let mut backend = TcpBackend::new();
        let port = free_port();
        assert!(backend.connect("127.0.0.1", port).is_err());
    }

    #[test]
    fn empty_read_is_would_block() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut backend = TcpBackend::new();
        let mut client = backend.connect("127.0.0.1", port).unwrap();
        let _server = listener.accept().unwrap();
        let mut buf = [0u8; 8];
        match client.read(&mut buf) {
            Err(PistatError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
            other => panic!("expected WouldBlock, got {other:?}"),
        }
    }
}
