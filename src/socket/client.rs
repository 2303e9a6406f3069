//! Producer side: push bytes or encoded records into a collector.
//!
//! Each call opens one connection, writes everything, and shuts the write
//! half down so the collector sees EOF and decodes what it received.

use std::path::Path;

use num_bigint::BigUint;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use crate::constants::RECORD_WIDTH;
use crate::error::{CollectorError, Result};
use crate::record::Record;

/// Send `bytes` to the collector at `socket_path` as one connection.
///
/// Returns the number of bytes written.
pub async fn send_bytes(socket_path: &Path, bytes: &[u8]) -> Result<usize> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|source| CollectorError::Connect {
            path: socket_path.to_path_buf(),
            source,
        })?;

    stream.write_all(bytes).await.map_err(CollectorError::Send)?;
    stream.shutdown().await.map_err(CollectorError::Send)?;

    log::info!(
        "[Sender] Sent {} bytes to {}",
        bytes.len(),
        socket_path.display()
    );
    Ok(bytes.len())
}

/// Encode `values` as consecutive records and send them as one connection.
///
/// Nothing is sent if any value is too wide for a record.
pub async fn send_records(socket_path: &Path, values: &[BigUint]) -> Result<usize> {
    let payload = encode_records(values)?;
    send_bytes(socket_path, &payload).await
}

/// Concatenate the record encodings of `values`.
pub fn encode_records(values: &[BigUint]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(values.len() * RECORD_WIDTH);
    for value in values {
        payload.extend_from_slice(Record::encode(value)?.as_le_bytes());
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode_records;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    #[test]
    fn test_encode_records_layout() {
        let values = [BigUint::from(1u8), BigUint::from(2u8)];
        let payload = encode_records(&values).unwrap();

        assert_eq!(payload.len(), 64);
        let decoded: Vec<String> = decode_records(&payload).map(|r| r.to_string()).collect();
        assert_eq!(decoded, vec!["1", "2"]);
    }

    #[test]
    fn test_encode_records_rejects_wide_value() {
        let values = [BigUint::from(1u8), BigUint::from(1u8) << 300u32];
        assert!(matches!(
            encode_records(&values),
            Err(CollectorError::RecordTooWide { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_bytes_writes_then_signals_eof() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("test.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            // read_to_end only returns once the sender shuts down its write half
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let sent = send_bytes(&sock_path, b"hello collector").await.unwrap();
        assert_eq!(sent, 15);

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), reader)
            .await
            .expect("Timed out")
            .unwrap();
        assert_eq!(received, b"hello collector");
    }

    #[tokio::test]
    async fn test_send_to_missing_socket_is_connect_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("nobody.sock");

        match send_bytes(&sock_path, b"x").await {
            Err(CollectorError::Connect { path, .. }) => assert_eq!(path, sock_path),
            other => panic!("Expected Connect error, got: {other:?}"),
        }
    }
}
