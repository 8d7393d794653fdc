//! Record codec: newline-delimited framing for the link protocols.
//!
//! A session is a sequence of records, each terminated by a single `\n`,
//! followed by the responder closing the stream. Payloads never contain the
//! terminator; JSON encoders escape it inside strings.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use link_types::PeerAddrInfo;

use crate::ProtocolError;

pub const LINE_TERMINATOR: u8 = b'\n';

/// Maximum payload size of a single record, terminator excluded.
pub const MAX_RECORD_SIZE: usize = 64 * 1024;

/// Maximum number of records accepted from one session.
pub const MAX_RECORDS: usize = 10_000;

fn frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_RECORD_SIZE {
        return Err(ProtocolError::RecordTooLarge {
            size: payload.len(),
            max: MAX_RECORD_SIZE,
        });
    }
    if payload.contains(&LINE_TERMINATOR) {
        return Err(ProtocolError::Malformed(
            "payload contains the record terminator".into(),
        ));
    }
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.extend_from_slice(payload);
    framed.push(LINE_TERMINATOR);
    Ok(framed)
}

/// Write one record (payload plus terminator) with a single `write_all`.
pub async fn write_record<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let framed = frame(payload)?;
    writer.write_all(&framed).await?;
    Ok(())
}

/// Read the next record, without its terminator.
///
/// Returns `Ok(None)` on a clean end of stream. A trailing fragment without
/// a terminator is `Malformed`; a record longer than [`MAX_RECORD_SIZE`] is
/// `RecordTooLarge` and leaves the reader mid-record.
pub async fn read_record<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(MAX_RECORD_SIZE as u64 + 1);
    let n = limited.read_until(LINE_TERMINATOR, &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&LINE_TERMINATOR) {
        buf.pop();
        return Ok(Some(buf));
    }
    if buf.len() > MAX_RECORD_SIZE {
        Err(ProtocolError::RecordTooLarge {
            size: buf.len(),
            max: MAX_RECORD_SIZE,
        })
    } else {
        Err(ProtocolError::Malformed("unterminated record".into()))
    }
}

/// Read every record until the remote side closes the stream.
///
/// Fails with `TooManyRecords` once more than `max_records` arrive.
pub async fn read_records<R>(reader: R, max_records: usize) -> Result<Vec<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut records = Vec::new();
    while let Some(record) = read_record(&mut reader).await? {
        if records.len() == max_records {
            return Err(ProtocolError::TooManyRecords { max: max_records });
        }
        records.push(record);
    }
    Ok(records)
}

/// Encode a peer's address info as a `/link/peers` payload.
pub fn encode_peer(info: &PeerAddrInfo) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(info).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

pub fn decode_peer(payload: &[u8]) -> Result<PeerAddrInfo, ProtocolError> {
    serde_json::from_slice(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Encode a content hash as a `/link/hash` payload.
pub fn encode_hash(hash: &str) -> Result<Vec<u8>, ProtocolError> {
    if hash.is_empty() || hash.chars().any(char::is_whitespace) {
        return Err(ProtocolError::Malformed(format!("invalid hash {hash:?}")));
    }
    Ok(hash.as_bytes().to_vec())
}

pub fn decode_hash(payload: &[u8]) -> Result<String, ProtocolError> {
    let hash = std::str::from_utf8(payload)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?
        .trim_end_matches('\r');
    if hash.is_empty() || hash.chars().any(char::is_whitespace) {
        return Err(ProtocolError::Malformed(format!("invalid hash {hash:?}")));
    }
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_types::PeerId;

    #[tokio::test]
    async fn write_record_appends_terminator() {
        let mut out = Vec::new();
        write_record(&mut out, b"QmHash").await.unwrap();
        assert_eq!(out, b"QmHash\n".to_vec());
    }

    #[tokio::test]
    async fn write_record_rejects_embedded_newline() {
        let mut out = Vec::new();
        let err = write_record(&mut out, b"a\nb").await.unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn read_records_splits_on_terminator() {
        let input: &[u8] = b"QmA\nQmB\n\nQmC\n";
        let records = read_records(input, MAX_RECORDS).await.unwrap();
        assert_eq!(
            records,
            vec![b"QmA".to_vec(), b"QmB".to_vec(), Vec::new(), b"QmC".to_vec()]
        );
    }

    #[tokio::test]
    async fn empty_stream_yields_no_records() {
        let input: &[u8] = b"";
        assert!(read_records(input, MAX_RECORDS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unterminated_tail_is_malformed() {
        let input: &[u8] = b"QmA\nQmPartial";
        let err = read_records(input, MAX_RECORDS).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[tokio::test]
    async fn oversized_record_is_rejected() {
        let mut input = vec![b'x'; MAX_RECORD_SIZE + 10];
        input.push(LINE_TERMINATOR);
        let err = read_records(input.as_slice(), MAX_RECORDS).await.unwrap_err();
        assert!(matches!(err, ProtocolError::RecordTooLarge { .. }));
    }

    #[tokio::test]
    async fn record_at_size_limit_is_accepted() {
        let mut input = vec![b'x'; MAX_RECORD_SIZE];
        input.push(LINE_TERMINATOR);
        let records = read_records(input.as_slice(), MAX_RECORDS).await.unwrap();
        assert_eq!(records[0].len(), MAX_RECORD_SIZE);
    }

    #[tokio::test]
    async fn record_count_is_bounded() {
        let input: &[u8] = b"a\nb\nc\n";
        let err = read_records(input, 2).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TooManyRecords { max: 2 }));
    }

    #[test]
    fn peer_payload_uses_transport_json_shape() {
        let info = PeerAddrInfo::new(
            PeerId::parse("QmPeer1").unwrap(),
            vec!["/ip4/10.0.0.1/tcp/4001".into()],
        );
        let payload = encode_peer(&info).unwrap();
        assert_eq!(
            payload,
            br#"{"ID":"QmPeer1","Addrs":["/ip4/10.0.0.1/tcp/4001"]}"#.to_vec()
        );
        assert_eq!(decode_peer(&payload).unwrap(), info);
    }

    #[test]
    fn hash_payload_validation() {
        assert_eq!(encode_hash("Qm123").unwrap(), b"Qm123".to_vec());
        assert!(encode_hash("").is_err());
        assert!(encode_hash("Qm 1").is_err());
        assert_eq!(decode_hash(b"Qm123\r").unwrap(), "Qm123");
        assert!(decode_hash(&[0xff, 0xfe]).is_err());
    }
}
