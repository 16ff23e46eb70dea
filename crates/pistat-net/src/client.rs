//! Controller client over a byte stream.
//!
//! Frames envelopes as NDJSON over any [`NetworkStream`], polls without
//! blocking, and reconnects on a fixed interval. Connection changes are
//! surfaced as synthetic `connect` / `disconnect` events.

use serde_json::Value;

use pistat_types::backend::{NetworkBackend, NetworkStream};
use pistat_types::error::{PistatError, Result};

use crate::channel::EventChannel;
use crate::protocol::{Envelope, Inbound, RemoteEvent};

/// Upper bound on reads per poll so one chatty peer cannot stall a frame.
const MAX_READS_PER_POLL: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected,
}

pub struct StreamChannel {
    backend: Box<dyn NetworkBackend>,
    host: String,
    port: u16,
    stream: Option<Box<dyn NetworkStream>>,
    state: ClientState,
    /// Accumulates received bytes between polls.
    read_buf: Vec<u8>,
    /// Messages decoded but not yet handed out.
    received: Vec<Inbound>,
    reconnect_interval_ms: u64,
    last_attempt_ms: Option<u64>,
}

impl StreamChannel {
    pub fn new(
        backend: Box<dyn NetworkBackend>,
        host: &str,
        port: u16,
        reconnect_interval_ms: u64,
    ) -> Self {
        Self {
            backend,
            host: host.to_string(),
            port,
            stream: None,
            state: ClientState::Disconnected,
            read_buf: Vec::with_capacity(1024),
            received: Vec::new(),
            reconnect_interval_ms,
            last_attempt_ms: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    fn try_connect(&mut self, now_ms: u64) {
        let due = self
            .last_attempt_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.reconnect_interval_ms);
        if !due {
            return;
        }
        self.last_attempt_ms = Some(now_ms);
        match self.backend.connect(&self.host, self.port) {
            Ok(stream) => {
                log::info!("connected to controller {}:{}", self.host, self.port);
                self.stream = Some(stream);
                self.state = ClientState::Connected;
                self.read_buf.clear();
                self.received.push(Inbound::Event(RemoteEvent::Connect));
            },
            Err(e) => {
                log::debug!("connect to {}:{} failed: {e}", self.host, self.port);
            },
        }
    }

    /// Tear down the stream and queue a `disconnect` event.
    fn drop_connection(&mut self, reason: &str) {
        if self.state == ClientState::Disconnected {
            return;
        }
        log::warn!("controller link lost: {reason}");
        if let Some(ref mut stream) = self.stream {
            let _ = stream.close();
        }
        self.stream = None;
        self.state = ClientState::Disconnected;
        self.received.push(Inbound::Event(RemoteEvent::Disconnect));
    }

    fn read_available(&mut self) {
        let mut buf = [0u8; 1024];
        for _ in 0..MAX_READS_PER_POLL {
            let Some(ref mut stream) = self.stream else {
                return;
            };
            match stream.read(&mut buf) {
                Ok(0) => {
                    self.drop_connection("peer closed the connection");
                    return;
                },
                Ok(n) => self.read_buf.extend_from_slice(&buf[..n]),
                Err(PistatError::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    break;
                },
                Err(e) => {
                    self.drop_connection(&e.to_string());
                    return;
                },
            }
        }
        self.drain_lines();
    }

    /// Decode every complete line in the buffer.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.read_buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.read_buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Inbound::decode(line) {
                Ok(inbound) => self.received.push(inbound),
                Err(e) => log::warn!("ignoring controller message: {e}"),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| PistatError::Channel("not connected to controller".to_string()))?;
        let mut written = 0;
        while written < data.len() {
            let n = stream.write(&data[written..])?;
            if n == 0 {
                return Err(PistatError::Channel("controller stopped accepting data".to_string()));
            }
            written += n;
        }
        Ok(())
    }
}

impl EventChannel for StreamChannel {
    fn emit(&mut self, event: &str, payload: Value, ack: Option<&str>) -> Result<()> {
        let line = Envelope::event(event, payload, ack).encode()?;
        if let Err(e) = self.write_all(line.as_bytes()) {
            if self.stream.is_some() {
                self.drop_connection(&e.to_string());
            }
            return Err(e);
        }
        log::debug!("sent '{event}'");
        Ok(())
    }

    fn poll(&mut self, now_ms: u64) -> Vec<Inbound> {
        if self.state == ClientState::Disconnected {
            self.try_connect(now_ms);
        }
        if self.state == ClientState::Connected {
            self.read_available();
        }
        std::mem::take(&mut self.received)
    }

    fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    fn close(&mut self) {
        if let Some(ref mut stream) = self.stream {
            let _ = stream.close();
        }
        self.stream = None;
        self.state = ClientState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::protocol::{AckReply, RequestKind, RequestPhase};

    /// Scripted stream: reads pop queued chunks, writes are captured.
    #[derive(Default)]
    struct Wire {
        incoming: VecDeque<std::result::Result<Vec<u8>, std::io::ErrorKind>>,
        outgoing: Vec<u8>,
        closed: bool,
    }

    struct FakeStream(Arc<Mutex<Wire>>);

    impl NetworkStream for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let mut wire = self.0.lock().unwrap();
            match wire.incoming.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                },
                Some(Err(kind)) => Err(std::io::Error::from(kind).into()),
                None => Err(std::io::Error::from(std::io::ErrorKind::WouldBlock).into()),
            }
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            self.0.lock().unwrap().outgoing.extend_from_slice(data);
            Ok(data.len())
        }

        fn close(&mut self) -> Result<()> {
            self.0.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct FakeBackend {
        wire: Arc<Mutex<Wire>>,
        refuse: Arc<Mutex<bool>>,
        attempts: Arc<Mutex<u32>>,
    }

    impl NetworkBackend for FakeBackend {
        fn listen(&mut self, _port: u16) -> Result<()> {
            Ok(())
        }

        fn accept(&mut self) -> Result<Option<Box<dyn NetworkStream>>> {
            Ok(None)
        }

        fn connect(&mut self, _address: &str, _port: u16) -> Result<Box<dyn NetworkStream>> {
            *self.attempts.lock().unwrap() += 1;
            if *self.refuse.lock().unwrap() {
                return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
            }
            Ok(Box::new(FakeStream(Arc::clone(&self.wire))))
        }
    }

    struct Harness {
        channel: StreamChannel,
        wire: Arc<Mutex<Wire>>,
        refuse: Arc<Mutex<bool>>,
        attempts: Arc<Mutex<u32>>,
    }

    fn harness() -> Harness {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let refuse = Arc::new(Mutex::new(false));
        let attempts = Arc::new(Mutex::new(0));
        let backend = FakeBackend {
            wire: Arc::clone(&wire),
            refuse: Arc::clone(&refuse),
            attempts: Arc::clone(&attempts),
        };
        Harness {
            channel: StreamChannel::new(Box::new(backend), "controller", 5000, 1000),
            wire,
            refuse,
            attempts,
        }
    }

    fn queue(h: &Harness, text: &str) {
        h.wire
            .lock()
            .unwrap()
            .incoming
            .push_back(Ok(text.as_bytes().to_vec()));
    }

    #[test]
    fn first_poll_connects_and_reports() {
        let mut h = harness();
        assert_eq!(h.channel.state(), ClientState::Disconnected);
        let got = h.channel.poll(0);
        assert_eq!(got, vec![Inbound::Event(RemoteEvent::Connect)]);
        assert!(h.channel.is_connected());
    }

    #[test]
    fn emit_writes_one_line() {
        let mut h = harness();
        h.channel.poll(0);
        h.channel
            .emit("run_task", serde_json::json!({"task": "a"}), Some("r1"))
            .unwrap();
        let out = String::from_utf8(h.wire.lock().unwrap().outgoing.clone()).unwrap();
        assert_eq!(out.matches('\n').count(), 1);
        let env = Envelope::decode(&out).unwrap();
        assert_eq!(env.event.as_deref(), Some("run_task"));
        assert_eq!(env.ack.as_deref(), Some("r1"));
    }

    #[test]
    fn emit_while_disconnected_fails() {
        let mut h = harness();
        *h.refuse.lock().unwrap() = true;
        h.channel.poll(0);
        assert!(h.channel.emit("x", Value::Null, None).is_err());
    }

    #[test]
    fn lines_split_across_reads_are_reassembled() {
        let mut h = harness();
        h.channel.poll(0);
        queue(&h, r#"{"event":"task_output","payload":{"request_id":"r1","#);
        queue(&h, "\"line\":\"hello\"}}\n{\"ack\":\"r1\",\"payload\":{\"status\":\"ok\"}}\n");
        let got = h.channel.poll(10);
        assert_eq!(got.len(), 2);
        match &got[0] {
            Inbound::Event(RemoteEvent::Request { kind, phase, event }) => {
                assert_eq!(*kind, RequestKind::Task);
                assert_eq!(*phase, RequestPhase::Output);
                assert_eq!(event.line.as_deref(), Some("hello"));
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            got[1],
            Inbound::Ack {
                request_id: "r1".into(),
                reply: AckReply {
                    status: Some("ok".into()),
                    ..AckReply::default()
                },
            }
        );
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut h = harness();
        h.channel.poll(0);
        queue(&h, r#"{"event":"connect""#);
        assert!(h.channel.poll(1).is_empty());
        queue(&h, "}\n");
        assert_eq!(h.channel.poll(2), vec![Inbound::Event(RemoteEvent::Connect)]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mut h = harness();
        h.channel.poll(0);
        queue(&h, "garbage\n{\"event\":\"disconnect\"}\n");
        let got = h.channel.poll(1);
        assert_eq!(got, vec![Inbound::Event(RemoteEvent::Disconnect)]);
        assert!(h.channel.is_connected());
    }

    #[test]
    fn peer_close_reports_disconnect() {
        let mut h = harness();
        h.channel.poll(0);
        h.wire.lock().unwrap().incoming.push_back(Ok(Vec::new()));
        let got = h.channel.poll(1);
        assert_eq!(got, vec![Inbound::Event(RemoteEvent::Disconnect)]);
        assert!(!h.channel.is_connected());
        assert!(h.wire.lock().unwrap().closed);
    }

    #[test]
    fn read_error_reports_disconnect() {
        let mut h = harness();
        h.channel.poll(0);
        h.wire
            .lock()
            .unwrap()
            .incoming
            .push_back(Err(std::io::ErrorKind::ConnectionReset));
        assert_eq!(h.channel.poll(1), vec![Inbound::Event(RemoteEvent::Disconnect)]);
    }

    #[test]
    fn reconnect_respects_interval() {
        let mut h = harness();
        *h.refuse.lock().unwrap() = true;
        h.channel.poll(0);
        h.channel.poll(500);
        assert_eq!(*h.attempts.lock().unwrap(), 1);
        *h.refuse.lock().unwrap() = false;
        let got = h.channel.poll(1000);
        assert_eq!(*h.attempts.lock().unwrap(), 2);
        assert_eq!(got, vec![Inbound::Event(RemoteEvent::Connect)]);
    }

    #[test]
    fn close_is_silent() {
        let mut h = harness();
        h.channel.poll(0);
        h.channel.close();
        assert!(!h.channel.is_connected());
        assert!(h.wire.lock().unwrap().closed);
    }
}
