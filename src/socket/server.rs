//! Unix domain socket collector.
//!
//! Binds a `UnixListener` and serves connections strictly one after another:
//! read everything the peer sends until EOF, release the connection, then
//! decode the accumulated buffer into records for the [`RecordSink`].

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UnixListener;
use tokio::sync::watch;

use crate::config::CollectorConfig;
use crate::constants::{ACCEPT_ERROR_BACKOFF, MAX_SOCKET_PATH};
use crate::error::{CollectorError, Result};
use crate::record::trailing_len;
use crate::sink::{emit_records, RecordSink};

/// How a connection's read loop ended.
#[derive(Debug)]
pub enum ConnectionEnd {
    /// A zero-length read: the peer closed its side.
    PeerClosed,
    /// A read failed. Bytes received before the failure are still decoded.
    ReadError(io::Error),
}

/// Bytes collected from one connection.
#[derive(Debug)]
pub struct CollectedStream {
    /// Every byte received, in arrival order.
    pub buffer: Vec<u8>,
    /// Why reading stopped.
    pub end: ConnectionEnd,
}

/// What happened on one served connection.
#[derive(Debug)]
pub struct ConnectionSummary {
    /// Total bytes received.
    pub bytes_received: usize,
    /// Records handed to the sink.
    pub records: usize,
    /// Trailing bytes that did not form a full record.
    pub trailing_bytes: usize,
    /// Why reading stopped.
    pub end: ConnectionEnd,
}

/// Read from `reader` until EOF or error, `chunk_size` bytes at a time.
///
/// Takes ownership of the reader so the connection is released on every
/// exit path before the caller looks at the buffer.
pub async fn collect_stream<R>(mut reader: R, chunk_size: usize) -> CollectedStream
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; chunk_size.max(1)];

    let end = loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break ConnectionEnd::PeerClosed,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break ConnectionEnd::ReadError(e),
        }
    };

    CollectedStream { buffer, end }
}

/// Unix socket server that decodes each connection's bytes into records.
#[derive(Debug)]
pub struct CollectorServer {
    /// Path to the socket file (for cleanup).
    socket_path: PathBuf,
    /// Maximum bytes per read.
    read_chunk_size: usize,
    listener: UnixListener,
}

impl CollectorServer {
    /// Bind the collector socket described by `config`.
    ///
    /// Validates the path length, removes a stale socket file if one is
    /// left over, binds the listener and restricts it to the owner (0600).
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Bind`] if the path is too long, is held by
    /// a live listener, cannot be cleared, or cannot be bound.
    pub fn bind(config: &CollectorConfig) -> Result<Self> {
        config.validate()?;
        let socket_path = config.socket_path.clone();
        let bind_err = |source: io::Error| CollectorError::Bind {
            path: socket_path.clone(),
            source,
        };

        let path_len = socket_path.as_os_str().len();
        if path_len >= MAX_SOCKET_PATH {
            return Err(bind_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "socket path too long ({path_len} bytes, max {})",
                    MAX_SOCKET_PATH - 1
                ),
            )));
        }

        remove_stale_socket(&socket_path).map_err(bind_err)?;

        let listener = std::os::unix::net::UnixListener::bind(&socket_path).map_err(bind_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&socket_path, perms).map_err(bind_err)?;
        }

        listener.set_nonblocking(true).map_err(bind_err)?;
        let listener = UnixListener::from_std(listener).map_err(bind_err)?;

        log::info!("[Collector] Listening on {}", socket_path.display());

        Ok(Self {
            socket_path,
            read_chunk_size: config.read_chunk_size,
            listener,
        })
    }

    /// Path to the socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve connections until `shutdown` turns `true` (or its sender is
    /// dropped), then remove the socket file.
    ///
    /// A connection that is already being read is drained and decoded
    /// before shutdown is noticed.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Output`] if the sink fails. The socket
    /// file is removed in that case too.
    pub async fn run<S>(self, sink: &mut S, shutdown: watch::Receiver<bool>) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        let result = self.accept_loop(sink, shutdown).await;
        self.remove_socket_file();
        result
    }

    /// Accept loop. One connection at a time; others wait in the backlog.
    async fn accept_loop<S>(&self, sink: &mut S, mut shutdown: watch::Receiver<bool>) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        let mut served: u64 = 0;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let accepted = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        log::info!("[Collector] Shutdown sender dropped, stopping accept loop");
                        break;
                    }
                    continue;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, _addr)) => {
                    served += 1;
                    log::info!("[Collector] Connection {served} accepted");
                    let summary = self.serve_connection(stream, sink).await?;
                    log::info!(
                        "[Collector] Connection {served} done: {} bytes, {} records",
                        summary.bytes_received,
                        summary.records
                    );
                }
                Err(e) => {
                    log::error!("[Collector] Accept error: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        log::info!("[Collector] Stopped after {served} connection(s)");
        Ok(())
    }

    /// Drain one connection, then decode everything it sent.
    async fn serve_connection<S>(
        &self,
        stream: tokio::net::UnixStream,
        sink: &mut S,
    ) -> Result<ConnectionSummary>
    where
        S: RecordSink + ?Sized,
    {
        let CollectedStream { buffer, end } = collect_stream(stream, self.read_chunk_size).await;

        match &end {
            ConnectionEnd::PeerClosed => log::debug!("[Collector] Peer closed"),
            ConnectionEnd::ReadError(e) => log::warn!("[Collector] Read error: {e}"),
        }

        let records = emit_records(&buffer, sink).map_err(CollectorError::Output)?;

        let trailing_bytes = trailing_len(&buffer);
        if trailing_bytes > 0 {
            log::debug!("[Collector] Ignoring {trailing_bytes} trailing byte(s)");
        }

        Ok(ConnectionSummary {
            bytes_received: buffer.len(),
            records,
            trailing_bytes,
            end,
        })
    }

    fn remove_socket_file(&self) {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => log::debug!("[Collector] Removed {}", self.socket_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "[Collector] Failed to remove {}: {e}",
                self.socket_path.display()
            ),
        }
    }
}

/// Clear whatever is left at `path` from an earlier run.
///
/// A path nobody answers on is removed; a missing path is fine. A path
/// with a live listener behind it is refused rather than stolen.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            "socket is held by an active listener",
        ));
    }

    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("[Collector] Removed stale socket {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, ReadBuf};
    use tokio::net::UnixStream;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    struct Collector {
        sock_path: PathBuf,
        records: mpsc::UnboundedReceiver<Record>,
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<Result<()>>,
    }

    fn start(tmp: &tempfile::TempDir) -> Collector {
        let sock_path = tmp.path().join("test.sock");
        let server = CollectorServer::bind(&CollectorConfig::new(&sock_path)).unwrap();
        let (record_tx, records) = mpsc::unbounded_channel::<Record>();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut sink = record_tx;
            server.run(&mut sink, shutdown_rx).await
        });

        Collector {
            sock_path,
            records,
            shutdown,
            handle,
        }
    }

    async fn send(path: &Path, bytes: &[u8]) {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream.write_all(bytes).await.unwrap();
        drop(stream);
    }

    async fn next_record(rx: &mut mpsc::UnboundedReceiver<Record>) -> Record {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Timed out waiting for record")
            .expect("Channel closed")
    }

    fn record_with_first_byte(value: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 32];
        bytes[0] = value;
        bytes
    }

    /// Reader that yields some bytes then fails.
    struct FailingReader {
        data: Option<Vec<u8>>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(&data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "reset by peer",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_collect_stream_reads_to_eof_in_chunks() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let collected = collect_stream(&data[..], 7).await;

        assert_eq!(collected.buffer, data);
        assert!(matches!(collected.end, ConnectionEnd::PeerClosed));
    }

    #[tokio::test]
    async fn test_collect_stream_keeps_bytes_read_before_error() {
        let reader = FailingReader {
            data: Some(record_with_first_byte(9)),
        };
        let collected = collect_stream(reader, 8192).await;

        assert_eq!(collected.buffer.len(), 32);
        match collected.end {
            ConnectionEnd::ReadError(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("Expected ReadError, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_two_records_arrive_in_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut collector = start(&tmp);

        let mut payload = record_with_first_byte(0x01);
        payload.extend(record_with_first_byte(0x02));
        send(&collector.sock_path, &payload).await;

        assert_eq!(next_record(&mut collector.records).await.to_string(), "1");
        assert_eq!(next_record(&mut collector.records).await.to_string(), "2");
    }

    #[tokio::test]
    async fn test_trailing_partial_group_is_dropped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut collector = start(&tmp);

        let mut payload = record_with_first_byte(0x03);
        payload.extend_from_slice(&[0xEE; 8]);
        send(&collector.sock_path, &payload).await;
        send(&collector.sock_path, &record_with_first_byte(0x04)).await;

        // The 8 stray bytes must not merge with the next connection's record.
        assert_eq!(next_record(&mut collector.records).await.to_string(), "3");
        assert_eq!(next_record(&mut collector.records).await.to_string(), "4");
    }

    #[tokio::test]
    async fn test_empty_connection_emits_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut collector = start(&tmp);

        send(&collector.sock_path, &[]).await;
        send(&collector.sock_path, &record_with_first_byte(0x2A)).await;

        assert_eq!(next_record(&mut collector.records).await.to_string(), "42");
    }

    #[tokio::test]
    async fn test_data_split_across_many_writes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut collector = start(&tmp);

        let payload: Vec<u8> = (1..=3u8).flat_map(record_with_first_byte).collect();
        let mut stream = UnixStream::connect(&collector.sock_path).await.unwrap();
        for piece in payload.chunks(5) {
            stream.write_all(piece).await.unwrap();
        }
        drop(stream);

        for expected in ["1", "2", "3"] {
            assert_eq!(next_record(&mut collector.records).await.to_string(), expected);
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop_and_removes_socket() {
        let tmp = tempfile::TempDir::new().unwrap();
        let collector = start(&tmp);
        assert!(collector.sock_path.exists());

        collector.shutdown.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), collector.handle)
            .await
            .expect("Timed out waiting for shutdown")
            .expect("Task panicked");

        assert!(result.is_ok());
        assert!(!collector.sock_path.exists());
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_loop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let collector = start(&tmp);

        drop(collector.shutdown);
        let result = tokio::time::timeout(Duration::from_secs(2), collector.handle)
            .await
            .expect("Timed out waiting for shutdown")
            .expect("Task panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let collector = start(&tmp);
        let sock_path = collector.sock_path.clone();
        drop(collector.records);

        send(&sock_path, &record_with_first_byte(1)).await;

        let result = tokio::time::timeout(Duration::from_secs(2), collector.handle)
            .await
            .expect("Timed out waiting for sink failure")
            .expect("Task panicked");
        assert!(matches!(result, Err(CollectorError::Output(_))));
        assert!(!sock_path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_replaced() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("test.sock");

        // Bound once, then dropped without cleanup: leaves a dead socket file.
        let listener = std::os::unix::net::UnixListener::bind(&sock_path).unwrap();
        drop(listener);
        assert!(sock_path.exists());

        let server = CollectorServer::bind(&CollectorConfig::new(&sock_path));
        assert!(server.is_ok(), "Rebinding a stale path should succeed: {server:?}");
    }

    #[tokio::test]
    async fn test_rebind_after_clean_shutdown() {
        let tmp = tempfile::TempDir::new().unwrap();
        let collector = start(&tmp);
        collector.shutdown.send(true).unwrap();
        collector.handle.await.unwrap().unwrap();

        let mut again = start(&tmp);
        send(&again.sock_path, &record_with_first_byte(7)).await;
        assert_eq!(next_record(&mut again.records).await.to_string(), "7");
    }

    #[tokio::test]
    async fn test_bind_refuses_live_listener() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("test.sock");
        let _first = CollectorServer::bind(&CollectorConfig::new(&sock_path)).unwrap();

        match CollectorServer::bind(&CollectorConfig::new(&sock_path)) {
            Err(CollectorError::Bind { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
            }
            other => panic!("Expected Bind error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bind_missing_parent_directory_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("missing").join("test.sock");

        let result = CollectorServer::bind(&CollectorConfig::new(&sock_path));
        assert!(matches!(result, Err(CollectorError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_bind_path_that_is_a_directory_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir_path = tmp.path().join("taken");
        std::fs::create_dir(&dir_path).unwrap();

        let result = CollectorServer::bind(&CollectorConfig::new(&dir_path));
        assert!(matches!(result, Err(CollectorError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_socket_path_length_validation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let long_name = "a".repeat(200);
        let sock_path = tmp.path().join(long_name).join("test.sock");

        let err = CollectorServer::bind(&CollectorConfig::new(sock_path)).unwrap_err();
        let err_msg = err.to_string();
        assert!(err_msg.contains("too long"), "Error should mention path too long: {err_msg}");
    }
}
