//! Prost wire format of binary message logs.
//!
//! A binary log is a sequence of length-delimited [`LogRecord`]s: a varint
//! byte length followed by the encoded record.

use std::io::{self, Read, Write};

use prost::Message;

/// One record of a binary message log.
#[derive(Clone, PartialEq, Message)]
pub struct LogRecord {
    /// The logged protocol message, if this record carries one.
    #[prost(message, optional, tag = "1")]
    pub message: Option<WireMessage>,
    /// Seconds since the domain session began, as recorded by the sender.
    #[prost(double, optional, tag = "2")]
    pub elapsed_ds_time: Option<f64>,
    /// Seconds since the domain session began, as recorded at write time.
    #[prost(double, optional, tag = "3")]
    pub write_time: Option<f64>,
    /// Free-text annotation written into the log.
    #[prost(string, optional, tag = "4")]
    pub custom_string: Option<String>,
}

/// Protocol message envelope as serialized in binary logs.
///
/// Every field is optional on the wire; presence of the required ones is
/// checked by the codec resolver before conversion.
#[derive(Clone, PartialEq, Message)]
pub struct WireMessage {
    #[prost(string, optional, tag = "1")]
    pub message_type: Option<String>,
    #[prost(int32, optional, tag = "2")]
    pub sequence_number: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub source_event_id: Option<i32>,
    #[prost(int64, optional, tag = "4")]
    pub timestamp: Option<i64>,
    #[prost(string, optional, tag = "5")]
    pub sender_module_name: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub sender_address: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub sender_module_type: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub destination_queue_name: Option<String>,
    #[prost(int32, optional, tag = "9")]
    pub reply_to_sequence_number: Option<i32>,
    #[prost(bool, optional, tag = "10")]
    pub needs_handling_response: Option<bool>,
    /// JSON-encoded payload.
    #[prost(bytes = "vec", optional, tag = "11")]
    pub payload: Option<Vec<u8>>,
    #[prost(message, optional, tag = "12")]
    pub domain_session: Option<WireDomainSession>,
}

/// Domain session identity attached to a message sent within a session.
#[derive(Clone, PartialEq, Message)]
pub struct WireDomainSession {
    #[prost(int32, tag = "1")]
    pub domain_session_id: i32,
    #[prost(int32, tag = "2")]
    pub user_id: i32,
    #[prost(string, optional, tag = "3")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub experiment_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub playback_id: Option<String>,
}

/// Maximum bytes in a varint-encoded `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Failure reading one length-delimited frame.
#[derive(Debug)]
pub(crate) enum FrameError {
    Io(io::Error),
    TooLarge(u64),
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Reads the next length-delimited frame.
///
/// Returns `Ok(None)` on a clean end of stream (no bytes before the length
/// prefix). A stream that ends inside a frame is an `UnexpectedEof` error.
pub(crate) fn read_frame<R: Read>(reader: &mut R, limit: u64) -> Result<Option<Vec<u8>>, FrameError> {
    let mut len: u64 = 0;
    let mut byte = [0u8; 1];
    for i in 0..MAX_VARINT_LEN {
        if reader.read(&mut byte)? == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated length prefix").into());
        }
        len |= u64::from(byte[0] & 0x7f) << (7 * i);
        if byte[0] & 0x80 == 0 {
            if len > limit {
                return Err(FrameError::TooLarge(len));
            }
            let mut buf = vec![0u8; usize::try_from(len).map_err(|_| FrameError::TooLarge(len))?];
            reader.read_exact(&mut buf)?;
            return Ok(Some(buf));
        }
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, "length prefix varint too long").into())
}

/// Appends `record` to `writer` as one length-delimited frame.
pub fn write_record<W: Write>(writer: &mut W, record: &LogRecord) -> io::Result<()> {
    writer.write_all(&record.encode_length_delimited_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn annotation(text: &str) -> LogRecord {
        LogRecord {
            custom_string: Some(text.to_string()),
            ..LogRecord::default()
        }
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut buf = Vec::new();
        write_record(&mut buf, &annotation("first")).unwrap();
        write_record(&mut buf, &annotation("second")).unwrap();

        let mut cursor = Cursor::new(buf);
        let first = read_frame(&mut cursor, 1024).unwrap().unwrap();
        let second = read_frame(&mut cursor, 1024).unwrap().unwrap();
        assert!(read_frame(&mut cursor, 1024).unwrap().is_none());

        assert_eq!(LogRecord::decode(first.as_slice()).unwrap(), annotation("first"));
        assert_eq!(LogRecord::decode(second.as_slice()).unwrap(), annotation("second"));
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut buf = Vec::new();
        write_record(&mut buf, &annotation("cut short")).unwrap();
        buf.truncate(buf.len() - 3);

        let err = read_frame(&mut Cursor::new(buf), 1024).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        // varint 300
        let buf = vec![0xac, 0x02];
        let err = read_frame(&mut Cursor::new(buf), 100).unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(300)));
    }
}
