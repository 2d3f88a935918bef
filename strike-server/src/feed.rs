//! Upstream feed client — connect, handshake, stream, reconnect forever.
//!
//! Connection lifecycle: Disconnected → Connecting → Handshaking →
//! Streaming, collapsing back to Disconnected on any transport error and
//! re-entering Connecting after a fixed delay. Retries are unbounded with
//! no backoff growth: a lost live-feed subscription keeps trying for the
//! life of the process. Exactly one client runs per process.
//!
//! The transport sits behind a trait so tests drive the loop with a
//! scripted fake and assert attempt counts and delay spacing without a
//! network.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use strike_core::codec::{self, DecodeError};
use strike_core::event::{self, ParseError};

use crate::db::{InsertOutcome, Store};
use crate::relay::RelayBuffer;

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

/// Transport-level failures. All of them lead back to Disconnected.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("receive failed: {0}")]
    Recv(String),
}

/// Opens one streaming connection per call.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<Box<dyn FeedStream>, TransportError>;
}

/// One established feed connection.
#[async_trait]
pub trait FeedStream: Send {
    /// Send one text message (the subscription handshake).
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Next inbound frame. `Ok(None)` means the server closed cleanly.
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError>;
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

/// Production transport: a WebSocket connection to the feed endpoint.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: String) -> Self {
        WsTransport { url }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&mut self) -> Result<Box<dyn FeedStream>, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Box::new(WsStream { inner: stream }))
    }
}

struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedStream for WsStream {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(msg) = self.inner.next().await {
            match msg {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(_)) => return Ok(None),
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Err(TransportError::Recv(e.to_string())),
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Ingest outcomes
// ---------------------------------------------------------------------------

/// Per-frame result of the ingest pipeline. Every failure class is a
/// distinct variant; the loop continues regardless.
#[derive(Debug)]
pub enum IngestOutcome {
    Stored(InsertOutcome),
    /// Coordinates present but no source timestamp: relayed live, not
    /// persisted (the row identity cannot be formed).
    RelayedOnly,
    DecodeFailed(DecodeError),
    ParseFailed(ParseError),
    PersistFailed(rusqlite::Error),
}

/// Running counters for the life of the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub frames: u64,
    pub stored: u64,
    pub duplicates: u64,
    pub relayed_only: u64,
    pub decode_errors: u64,
    pub parse_errors: u64,
    pub persist_errors: u64,
}

// ---------------------------------------------------------------------------
// Feed client
// ---------------------------------------------------------------------------

pub struct FeedClient<T: Transport> {
    transport: T,
    handshake: String,
    reconnect_delay: Duration,
    store: Store,
    relay: Arc<RelayBuffer>,
    stats: IngestStats,
    connection_attempts: u64,
}

impl<T: Transport> FeedClient<T> {
    pub fn new(
        transport: T,
        handshake: String,
        reconnect_delay: Duration,
        store: Store,
        relay: Arc<RelayBuffer>,
    ) -> Self {
        FeedClient {
            transport,
            handshake,
            reconnect_delay,
            store,
            relay,
            stats: IngestStats::default(),
            connection_attempts: 0,
        }
    }

    /// Run forever: reconnect after every failure or clean close.
    pub async fn run(mut self) {
        loop {
            match self.session().await {
                Ok(()) => eprintln!("[feed] stream closed by server"),
                Err(e) => eprintln!("[feed] {e}"),
            }
            let s = self.stats;
            eprintln!(
                "[feed] totals: {} frames, {} stored, {} duplicate, {} relayed-only, {} decode errors, {} parse errors, {} persist errors",
                s.frames, s.stored, s.duplicates, s.relayed_only,
                s.decode_errors, s.parse_errors, s.persist_errors
            );
            eprintln!("[feed] reconnecting in {:?}", self.reconnect_delay);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection's lifetime: connect, handshake, stream until the
    /// transport gives out.
    async fn session(&mut self) -> Result<(), TransportError> {
        self.connection_attempts += 1;
        let mut stream = self.transport.connect().await?;
        stream.send(&self.handshake).await?;
        eprintln!(
            "[feed] connected (attempt {}), handshake sent",
            self.connection_attempts
        );

        while let Some(frame) = stream.next_frame().await? {
            // Every outcome continues the stream; only storage faults are
            // worth a line per frame.
            if let IngestOutcome::PersistFailed(e) = self.ingest(&frame) {
                eprintln!("[feed] persist failed: {e}");
            }
        }
        Ok(())
    }

    /// Decode → parse → relay + persist. Bad frames are dropped and
    /// counted; a storage fault never stops the loop.
    fn ingest(&mut self, frame: &str) -> IngestOutcome {
        self.stats.frames += 1;

        let text = match codec::decode(frame) {
            Ok(t) => t,
            Err(e) => {
                self.stats.decode_errors += 1;
                return IngestOutcome::DecodeFailed(e);
            }
        };

        let ev = match event::parse_event(&text) {
            Ok(ev) => ev,
            Err(e) => {
                self.stats.parse_errors += 1;
                return IngestOutcome::ParseFailed(e);
            }
        };

        // Relay and persistence are independent best-effort paths: the
        // point is buffered whether or not the insert below succeeds.
        self.relay.append(ev.point());

        let record = match ev.to_record(now()) {
            Some(r) => r,
            None => {
                self.stats.relayed_only += 1;
                return IngestOutcome::RelayedOnly;
            }
        };

        match self.store.insert(&record) {
            Ok(outcome) => {
                match outcome {
                    InsertOutcome::Inserted => self.stats.stored += 1,
                    InsertOutcome::DuplicateIgnored => self.stats.duplicates += 1,
                }
                IngestOutcome::Stored(outcome)
            }
            Err(e) => {
                self.stats.persist_errors += 1;
                IngestOutcome::PersistFailed(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Scripted transport: fails the first `fail_attempts` connects, then
    /// serves the scripted frames on every later connection.
    struct FakeTransport {
        fail_attempts: u32,
        frames: Vec<String>,
        /// Hold the connection open after the script instead of closing.
        then_hold_open: bool,
        log: Arc<AttemptLog>,
    }

    #[derive(Default)]
    struct AttemptLog {
        connects: Mutex<Vec<Instant>>,
        handshakes: Mutex<Vec<String>>,
    }

    struct FakeStream {
        frames: VecDeque<String>,
        then_hold_open: bool,
        log: Arc<AttemptLog>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&mut self) -> Result<Box<dyn FeedStream>, TransportError> {
            self.log.connects.lock().unwrap().push(Instant::now());
            if self.fail_attempts > 0 {
                self.fail_attempts -= 1;
                return Err(TransportError::Connect("connection refused".into()));
            }
            Ok(Box::new(FakeStream {
                frames: self.frames.clone().into(),
                then_hold_open: self.then_hold_open,
                log: Arc::clone(&self.log),
            }))
        }
    }

    #[async_trait]
    impl FeedStream for FakeStream {
        async fn send(&mut self, text: &str) -> Result<(), TransportError> {
            self.log.handshakes.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None if self.then_hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    fn temp_db() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strikes.db").to_str().unwrap().to_string();
        (dir, path)
    }

    fn client_with(
        transport: FakeTransport,
        db_path: &str,
        relay: Arc<RelayBuffer>,
    ) -> FeedClient<FakeTransport> {
        FeedClient::new(
            transport,
            r#"{"a":111}"#.to_string(),
            Duration::from_secs(5),
            Store::open(db_path).unwrap(),
            relay,
        )
    }

    fn frame_for(json: &str) -> String {
        codec::encode(json).unwrap()
    }

    #[tokio::test]
    async fn test_valid_frame_persists_and_relays() {
        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        let transport = FakeTransport {
            fail_attempts: 0,
            frames: vec![frame_for(
                r#"{"time":1700000000000000000,"lat":51.5,"lon":-0.12}"#,
            )],
            then_hold_open: false,
            log: Arc::clone(&log),
        };

        let mut client = client_with(transport, &db_path, Arc::clone(&relay));
        client.session().await.unwrap();

        assert_eq!(*log.handshakes.lock().unwrap(), [r#"{"a":111}"#]);
        assert_eq!(client.stats.stored, 1);

        let reader = Store::open(&db_path).unwrap();
        assert_eq!(reader.count_strikes(), 1);

        let batch = relay.drain_and_swap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].lat, 51.5);
        assert_eq!(batch[0].lon, -0.12);
    }

    #[tokio::test]
    async fn test_frame_without_coordinates_is_discarded() {
        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        // A coordinate-less frame followed by a valid one: the bad frame
        // must not end the session or leave any trace.
        let transport = FakeTransport {
            fail_attempts: 0,
            frames: vec![
                frame_for(r#"{"time":42,"sig":7}"#),
                frame_for(r#"{"time":43,"lat":1.0,"lon":2.0}"#),
            ],
            then_hold_open: false,
            log,
        };

        let mut client = client_with(transport, &db_path, Arc::clone(&relay));
        client.session().await.unwrap();

        assert_eq!(client.stats.parse_errors, 1);
        assert_eq!(client.stats.stored, 1);

        let reader = Store::open(&db_path).unwrap();
        assert_eq!(reader.count_strikes(), 1);
        assert_eq!(relay.drain_and_swap().len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_dropped() {
        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        // Code 999 with an empty dictionary is undefined.
        let garbage: String = ['x', '\u{3E7}'].iter().collect();
        let transport = FakeTransport {
            fail_attempts: 0,
            frames: vec![garbage, frame_for(r#"{"time":1,"lat":3.0,"lon":4.0}"#)],
            then_hold_open: false,
            log,
        };

        let mut client = client_with(transport, &db_path, Arc::clone(&relay));
        client.session().await.unwrap();

        assert_eq!(client.stats.decode_errors, 1);
        assert_eq!(client.stats.stored, 1);
        assert_eq!(relay.drain_and_swap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_events_store_once() {
        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        let frame = frame_for(r#"{"time":99,"lat":10.0,"lon":20.0}"#);
        let transport = FakeTransport {
            fail_attempts: 0,
            frames: vec![frame.clone(), frame],
            then_hold_open: false,
            log,
        };

        let mut client = client_with(transport, &db_path, Arc::clone(&relay));
        client.session().await.unwrap();

        assert_eq!(client.stats.stored, 1);
        assert_eq!(client.stats.duplicates, 1);

        let reader = Store::open(&db_path).unwrap();
        assert_eq!(reader.count_strikes(), 1);
        // Both decodes relayed; persistence and relay are independent.
        assert_eq!(relay.drain_and_swap().len(), 2);
    }

    #[tokio::test]
    async fn test_event_without_time_relays_but_skips_persistence() {
        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        let transport = FakeTransport {
            fail_attempts: 0,
            frames: vec![frame_for(r#"{"lat":5.0,"lon":6.0}"#)],
            then_hold_open: false,
            log,
        };

        let mut client = client_with(transport, &db_path, Arc::clone(&relay));
        client.session().await.unwrap();

        assert_eq!(client.stats.relayed_only, 1);
        assert_eq!(client.stats.stored, 0);

        let reader = Store::open(&db_path).unwrap();
        assert_eq!(reader.count_strikes(), 0);
        assert_eq!(relay.drain_and_swap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_outcomes_are_typed() {
        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        let transport = FakeTransport {
            fail_attempts: 0,
            frames: Vec::new(),
            then_hold_open: false,
            log,
        };
        let mut client = client_with(transport, &db_path, relay);

        let stored = client.ingest(&frame_for(r#"{"time":1,"lat":1.0,"lon":2.0}"#));
        assert!(matches!(
            stored,
            IngestOutcome::Stored(InsertOutcome::Inserted)
        ));

        let duplicate = client.ingest(&frame_for(r#"{"time":1,"lat":1.0,"lon":2.0}"#));
        assert!(matches!(
            duplicate,
            IngestOutcome::Stored(InsertOutcome::DuplicateIgnored)
        ));

        let empty = client.ingest("");
        assert!(matches!(
            empty,
            IngestOutcome::DecodeFailed(DecodeError::EmptyFrame)
        ));

        let no_coords = client.ingest(&frame_for(r#"{"time":2}"#));
        assert!(matches!(
            no_coords,
            IngestOutcome::ParseFailed(ParseError::MissingCoordinates)
        ));

        let no_time = client.ingest(&frame_for(r#"{"lat":3.0,"lon":4.0}"#));
        assert!(matches!(no_time, IngestOutcome::RelayedOnly));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_until_transport_succeeds() {
        const FAILURES: u32 = 3;

        let (_dir, db_path) = temp_db();
        let relay = Arc::new(RelayBuffer::new());
        let log = Arc::new(AttemptLog::default());

        let transport = FakeTransport {
            fail_attempts: FAILURES,
            frames: vec![frame_for(r#"{"time":7,"lat":51.5,"lon":-0.12}"#)],
            then_hold_open: true,
            log: Arc::clone(&log),
        };

        let client = client_with(transport, &db_path, Arc::clone(&relay));
        let task = tokio::spawn(client.run());

        // Plenty of virtual time for the retries and the first frame.
        tokio::time::sleep(Duration::from_secs(60)).await;

        let connects = log.connects.lock().unwrap().clone();
        assert_eq!(connects.len() as u32, FAILURES + 1);
        for pair in connects.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }

        // Streaming resumed after the final attempt.
        assert_eq!(log.handshakes.lock().unwrap().len(), 1);
        let reader = Store::open(&db_path).unwrap();
        assert_eq!(reader.count_strikes(), 1);
        assert_eq!(relay.drain_and_swap().len(), 1);

        task.abort();
    }
}
