//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. A response can be split into chunks so that the
//! line framer sees the partial reads a real serial port produces, and an
//! expectation can end by dropping the port to simulate an unplugged board.
//!
//! Like a real port, bytes that were never read are not discarded by the
//! next write: they are delivered ahead of the next response.
//!
//! # Example
//!
//! ```
//! use sglink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the engine sends the identity query, answer in two pieces.
//! mock.expect_chunks(b"$IDN,0\r\n", &[b"$IDN,0,ISC", b"-SG,1234\r\n"]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use sglink_core::error::{Error, Result};
use sglink_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Response chunks, delivered one per `wait_for_data`/`read_available`
    /// cycle. An empty chunk is one quiet wait.
    chunks: Vec<Vec<u8>>,
    /// Close the port once every chunk has been read.
    disconnect_after: bool,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `write()` is called, the sent
/// data is recorded and matched against the next expectation; its response
/// chunks then become readable one at a time.
///
/// When nothing is pending, `wait_for_data()` sleeps for its timeout and
/// returns `false`, like a quiet serial line.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Chunks of the current response not yet made readable.
    pending_chunks: VecDeque<Vec<u8>>,
    /// Bytes made readable by `wait_for_data` and not yet taken.
    ready: Vec<u8>,
    /// Close once `pending_chunks` and `ready` are drained.
    disconnect_when_drained: bool,
    /// Whether the transport is "open".
    open: bool,
    /// Whether writes report acknowledgment.
    write_acknowledged: bool,
    /// Log of all bytes written through this transport.
    sent_log: Vec<Vec<u8>>,
    /// Number of `write` calls, including rejected ones.
    write_calls: usize,
    /// Number of `wait_for_data` and `read_available` calls.
    read_calls: usize,
    /// Number of `open` calls.
    open_calls: usize,
}

impl MockTransport {
    /// Create a new mock transport in the open state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_chunks: VecDeque::new(),
            ready: Vec::new(),
            disconnect_when_drained: false,
            open: true,
            write_acknowledged: true,
            sent_log: Vec::new(),
            write_calls: 0,
            read_calls: 0,
            open_calls: 0,
        }
    }

    /// Add an expected request with a response delivered in one read.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expect_chunks(request, &[response]);
    }

    /// Add an expected request whose response arrives as separate reads.
    ///
    /// An empty chunk list means the device never answers.
    pub fn expect_chunks(&mut self, request: &[u8], chunks: &[&[u8]]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            disconnect_after: false,
        });
    }

    /// Add an expected request whose response arrives only after
    /// `quiet_waits` calls to `wait_for_data` found nothing.
    pub fn expect_after_silence(&mut self, request: &[u8], quiet_waits: usize, response: &[u8]) {
        let mut chunks = vec![Vec::new(); quiet_waits];
        chunks.push(response.to_vec());
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            chunks,
            disconnect_after: false,
        });
    }

    /// Add an expected request; after its response chunks are read the
    /// port reports itself closed.
    pub fn expect_then_disconnect(&mut self, request: &[u8], chunks: &[&[u8]]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            disconnect_after: true,
        });
    }

    /// Return a reference to all data that has been written.
    ///
    /// Each element is the byte slice from one `write()` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of `write()` calls, counted even when the port is closed.
    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    /// Number of read-side calls (`wait_for_data` plus `read_available`).
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Number of times `open()` was called.
    pub fn open_calls(&self) -> usize {
        self.open_calls
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the open state of the mock transport.
    ///
    /// When set to `false`, subsequent I/O returns [`Error::NotConnected`].
    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    /// Make writes report (or not report) acknowledgment within their timeout.
    pub fn set_write_acknowledged(&mut self, acknowledged: bool) {
        self.write_acknowledged = acknowledged;
    }

    fn drop_connection(&mut self) {
        self.open = false;
        self.pending_chunks.clear();
        self.ready.clear();
        self.disconnect_when_drained = false;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        self.open_calls += 1;
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.drop_connection();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<bool> {
        self.write_calls += 1;
        if !self.open {
            return Err(Error::NotConnected);
        }

        // Record what was sent.
        self.sent_log.push(data.to_vec());

        // Match against the next expectation.
        let expectation = self.expectations.pop_front().ok_or_else(|| {
            Error::Protocol("no more expectations in mock transport".into())
        })?;
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        // Unread bytes from an earlier response stay queued in front.
        self.pending_chunks.extend(expectation.chunks);
        self.disconnect_when_drained = expectation.disconnect_after;
        Ok(self.write_acknowledged)
    }

    async fn wait_for_data(&mut self, timeout: Duration) -> Result<bool> {
        self.read_calls += 1;
        if !self.open {
            return Err(Error::NotConnected);
        }

        if !self.ready.is_empty() {
            return Ok(true);
        }
        if let Some(chunk) = self.pending_chunks.pop_front() {
            if !chunk.is_empty() {
                self.ready = chunk;
                return Ok(true);
            }
            tokio::time::sleep(timeout).await;
            return Ok(false);
        }
        if self.disconnect_when_drained {
            self.drop_connection();
            return Err(Error::ConnectionLost);
        }

        tokio::time::sleep(timeout).await;
        Ok(false)
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        self.read_calls += 1;
        if !self.open {
            return Err(Error::NotConnected);
        }
        let data = std::mem::take(&mut self.ready);
        if self.disconnect_when_drained && self.pending_chunks.is_empty() {
            self.drop_connection();
        }
        Ok(data)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn mock_transport_basic_exchange() {
        let mut mock = MockTransport::new();
        mock.expect(b"$VER,0\r\n", b"$VER,0,1.4.2\r\n");

        assert!(mock.write(b"$VER,0\r\n", T).await.unwrap());
        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"$VER,0,1.4.2\r\n");

        // Nothing left: the line is quiet.
        assert!(!mock.wait_for_data(T).await.unwrap());
    }

    #[tokio::test]
    async fn mock_transport_chunks_arrive_separately() {
        let mut mock = MockTransport::new();
        mock.expect_chunks(b"$FCG,0\r\n", &[b"$FCG,0,", b"2450.00\r\n"]);
        mock.write(b"$FCG,0\r\n", T).await.unwrap();

        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"$FCG,0,");
        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"2450.00\r\n");
        assert!(!mock.wait_for_data(T).await.unwrap());
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"$ECS,0,1\r\n", b"$ECS,0,OK\r\n");
        mock.expect(b"$ECS,0,0\r\n", b"$ECS,0,OK\r\n");

        mock.write(b"$ECS,0,1\r\n", T).await.unwrap();
        mock.write(b"$ECS,0,0\r\n", T).await.unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_data()[0], b"$ECS,0,1\r\n");
        assert_eq!(mock.sent_data()[1], b"$ECS,0,0\r\n");
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"$IDN,0\r\n", b"x\r\n");

        let result = mock.write(b"$VER,0\r\n", T).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.write(b"$IDN,0\r\n", T).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn mock_transport_unacknowledged_write() {
        let mut mock = MockTransport::new();
        mock.set_write_acknowledged(false);
        mock.expect(b"$IDN,0\r\n", b"$IDN,0,X\r\n");
        assert!(!mock.write(b"$IDN,0\r\n", T).await.unwrap());
        // The reply still arrives.
        assert!(mock.wait_for_data(T).await.unwrap());
    }

    #[tokio::test]
    async fn mock_transport_disconnect_after_reply() {
        let mut mock = MockTransport::new();
        mock.expect_then_disconnect(b"$SWPD,0\r\n", &[b"$SWPD,0,2400,10,-5\r\n"]);
        mock.write(b"$SWPD,0\r\n", T).await.unwrap();

        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"$SWPD,0,2400,10,-5\r\n");
        assert!(!mock.is_open());
        assert!(matches!(
            mock.wait_for_data(T).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn mock_transport_quiet_before_answer() {
        let mut mock = MockTransport::new();
        mock.expect_after_silence(b"$IDN,0\r\n", 3, b"$IDN,0,X\r\n");
        mock.write(b"$IDN,0\r\n", T).await.unwrap();

        for _ in 0..3 {
            assert!(!mock.wait_for_data(T).await.unwrap());
        }
        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"$IDN,0,X\r\n");
    }

    #[tokio::test]
    async fn mock_transport_unread_bytes_survive_next_write() {
        let mut mock = MockTransport::new();
        mock.expect_chunks(b"$FCS,0,9\r\n", &[b"$FCS,0,ERR", b"4\r\n"]);
        mock.expect(b"$FCG,0\r\n", b"$FCG,0,2450.00\r\n");

        mock.write(b"$FCS,0,9\r\n", T).await.unwrap();
        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"$FCS,0,ERR");

        // The tail of the first reply comes out before the second reply.
        mock.write(b"$FCG,0\r\n", T).await.unwrap();
        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"4\r\n");
        assert!(mock.wait_for_data(T).await.unwrap());
        assert_eq!(mock.read_available().await.unwrap(), b"$FCG,0,2450.00\r\n");
    }

    #[tokio::test]
    async fn mock_transport_counts_rejected_writes() {
        let mut mock = MockTransport::new();
        mock.set_open(false);
        assert!(mock.write(b"$IDN,0\r\n", T).await.is_err());
        assert_eq!(mock.write_calls(), 1);
        assert!(mock.sent_data().is_empty());
    }

    #[tokio::test]
    async fn mock_transport_close_and_reopen() {
        let mut mock = MockTransport::new();
        assert!(mock.is_open());

        mock.close().await.unwrap();
        mock.close().await.unwrap();
        assert!(!mock.is_open());

        let result = mock.write(b"$IDN,0\r\n", T).await;
        assert!(matches!(result, Err(Error::NotConnected)));

        mock.open().await.unwrap();
        mock.open().await.unwrap();
        assert!(mock.is_open());
        assert_eq!(mock.open_calls(), 2);
    }

    #[tokio::test]
    async fn mock_transport_counts_reads() {
        let mut mock = MockTransport::new();
        mock.set_open(false);
        assert!(mock.wait_for_data(T).await.is_err());
        assert!(mock.read_available().await.is_err());
        assert_eq!(mock.read_calls(), 2);
        assert!(mock.sent_data().is_empty());
    }
}
