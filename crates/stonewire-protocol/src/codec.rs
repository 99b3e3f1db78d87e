//! Newline framing: byte chunks in, typed records out.
//!
//! The wire format is one UTF-8 JSON record per line with `\n` as the
//! only delimiter. Chunks arrive from the socket in arbitrary sizes, so
//! [`FrameReader`] buffers the partial tail between chunks and yields
//! complete frames in arrival order. Decoded output depends only on the
//! byte sequence, never on where the socket happened to split it; the
//! chunk-boundary test below walks every possible split to pin that
//! property down.

use serde::Serialize;

use crate::{ClientCommand, ProtocolError, ServerEvent};

/// The frame delimiter.
const DELIMITER: u8 = b'\n';

/// Incremental reader for the inbound byte stream.
///
/// Feed raw chunks with [`extend`](Self::extend), then drain complete
/// frames with [`next_event`](Self::next_event). A frame that fails to
/// parse is reported as a [`ProtocolError`] for that frame only; the
/// remaining buffer is untouched and extraction continues.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw chunk to the internal buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, parsed as a [`ServerEvent`].
    ///
    /// Returns `None` when no complete frame is buffered. Empty frames
    /// (consecutive delimiters) are skipped. The `drain(..=end)` below
    /// removes the frame and its delimiter from the buffer in one pass
    /// while `take(end)` keeps the delimiter out of the parsed body.
    pub fn next_event(
        &mut self,
    ) -> Option<Result<ServerEvent, ProtocolError>> {
        loop {
            let end = self.buf.iter().position(|&b| b == DELIMITER)?;
            let frame: Vec<u8> = self.buf.drain(..=end).take(end).collect();
            if frame.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_slice(&frame).map_err(ProtocolError::Decode),
            );
        }
    }

    /// Number of buffered bytes not yet forming a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Serializes an outbound command to its wire form: a UTF-8 JSON record
/// with a trailing newline.
pub fn encode_command(
    command: &ClientCommand,
) -> Result<Vec<u8>, ProtocolError> {
    encode_record(command)
}

/// Serializes any record type to a newline-terminated JSON frame.
///
/// Used by [`encode_command`] and by test doubles that play the server
/// side of the protocol.
pub fn encode_record<T: Serialize>(
    record: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes =
        serde_json::to_vec(record).map_err(ProtocolError::Encode)?;
    bytes.push(DELIMITER);
    Ok(bytes)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;

    fn drain(reader: &mut FrameReader) -> Vec<Result<ServerEvent, ProtocolError>> {
        let mut out = Vec::new();
        while let Some(item) = reader.next_event() {
            out.push(item);
        }
        out
    }

    fn ok_events(
        items: Vec<Result<ServerEvent, ProtocolError>>,
    ) -> Vec<ServerEvent> {
        items
            .into_iter()
            .map(|r| r.expect("frame should parse"))
            .collect()
    }

    #[test]
    fn test_next_event_single_complete_frame() {
        let mut reader = FrameReader::new();
        reader.extend(b"{\"type\":\"enter\",\"user\":5}\n");

        let events = ok_events(drain(&mut reader));
        assert_eq!(events, vec![ServerEvent::Enter { user: UserId(5) }]);
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_partial_tail_stays_buffered() {
        let mut reader = FrameReader::new();
        reader.extend(b"{\"type\":\"enter\",\"user\":5}\n{\"type\":\"le");

        let events = ok_events(drain(&mut reader));
        assert_eq!(events.len(), 1);
        assert!(reader.pending() > 0, "partial frame must stay buffered");

        reader.extend(b"ave\",\"user\":5}\n");
        let events = ok_events(drain(&mut reader));
        assert_eq!(events, vec![ServerEvent::Leave { user: UserId(5) }]);
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        // Splitting the same byte sequence at every possible boundary
        // must yield the same ordered events as one big chunk.
        let wire = b"{\"type\":\"enter\",\"user\":1}\n\
                     {\"type\":\"chat\",\"user\":1,\"content\":\"hi\"}\n\
                     {\"type\":\"leave\",\"user\":1}\n";

        let mut whole = FrameReader::new();
        whole.extend(wire);
        let expected = ok_events(drain(&mut whole));
        assert_eq!(expected.len(), 3);

        for split in 0..wire.len() {
            let mut reader = FrameReader::new();
            reader.extend(&wire[..split]);
            let mut events = ok_events(drain(&mut reader));
            reader.extend(&wire[split..]);
            events.extend(ok_events(drain(&mut reader)));
            assert_eq!(events, expected, "split at {split} diverged");
        }
    }

    #[test]
    fn test_empty_frames_are_skipped() {
        let mut reader = FrameReader::new();
        reader.extend(b"\n\n{\"type\":\"enter\",\"user\":2}\n\n");

        let events = ok_events(drain(&mut reader));
        assert_eq!(events, vec![ServerEvent::Enter { user: UserId(2) }]);
    }

    #[test]
    fn test_malformed_frame_does_not_poison_buffer() {
        let mut reader = FrameReader::new();
        reader.extend(b"not json\n{\"type\":\"enter\",\"user\":3}\n");

        let mut items = drain(&mut reader);
        assert_eq!(items.len(), 2);
        assert!(items.remove(0).is_err(), "first frame is malformed");
        assert_eq!(
            items.remove(0).unwrap(),
            ServerEvent::Enter { user: UserId(3) }
        );
    }

    #[test]
    fn test_next_event_returns_none_without_delimiter() {
        let mut reader = FrameReader::new();
        reader.extend(b"{\"type\":\"enter\",\"user\":5}");
        assert!(reader.next_event().is_none());
        assert!(reader.pending() > 0);
    }

    #[test]
    fn test_encode_command_appends_newline() {
        let bytes = encode_command(&ClientCommand::Connect {
            invite: "tok".into(),
        })
        .unwrap();
        assert_eq!(*bytes.last().unwrap(), b'\n');
        assert!(
            !bytes[..bytes.len() - 1].contains(&b'\n'),
            "record body must not contain an unescaped newline"
        );

        let json: serde_json::Value =
            serde_json::from_slice(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(json["type"], "connect");
        assert_eq!(json["invite"], "tok");
    }

    #[test]
    fn test_encode_then_read_round_trip() {
        let mut reader = FrameReader::new();
        let frame = encode_record(&ServerEvent::Chat {
            user: UserId(4),
            content: "hello".into(),
        })
        .unwrap();
        reader.extend(&frame);

        let events = ok_events(drain(&mut reader));
        assert_eq!(
            events,
            vec![ServerEvent::Chat {
                user: UserId(4),
                content: "hello".into()
            }]
        );
    }
}
