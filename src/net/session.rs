use std::io::{Read, Write};
use std::time::Instant;

use crate::net::framing::{Flush, FrameDecoder, FrameWriter, FramingError};

/// The single client connection of a gateway and its in-flight message state
#[derive(Debug)]
pub struct Session<S> {
    stream: S,
    /// Peer hostname the connection was admitted under
    pub peer: String,
    pub created_at: Instant,
    /// Steps served since accept
    pub steps: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    decoder: FrameDecoder,
    writer: FrameWriter,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S, peer: String, max_message_size: usize, max_backlog: usize) -> Self {
        Self {
            stream,
            peer,
            created_at: Instant::now(),
            steps: 0,
            bytes_received: 0,
            bytes_sent: 0,
            messages_received: 0,
            messages_sent: 0,
            decoder: FrameDecoder::new(max_message_size),
            writer: FrameWriter::new(max_backlog),
        }
    }

    /// Advance the connection epoch by one step
    pub fn tick(&mut self) {
        self.steps += 1;
    }

    /// Next complete inbound message, `None` once nothing more is available
    pub fn poll_message(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        let message = self.decoder.poll(&mut self.stream)?;
        if let Some(payload) = &message {
            self.record_received(payload.len());
        }
        Ok(message)
    }

    /// Frame and send a payload
    ///
    /// The sent counters only move once a frame is fully written, so a
    /// stalled frame is counted on the step that finishes it.
    pub fn send(&mut self, payload: &[u8]) -> Result<Flush, FramingError> {
        let result = self.writer.send(&mut self.stream, payload);
        self.messages_sent = self.writer.frames_written();
        self.bytes_sent = self.writer.bytes_written();
        result
    }

    /// True while a message is partially received
    pub fn has_partial_message(&self) -> bool {
        self.decoder.has_partial()
    }

    /// Declared length of the message being received
    pub fn partial_message_len(&self) -> usize {
        self.decoder.pending_len()
    }

    /// Frames still waiting for the socket
    pub fn outbound_backlog(&self) -> usize {
        self.writer.backlog()
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Record bytes received
    fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.messages_received += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::framing::encode_frame;
    use crate::net::framing::tests::ScriptedStream;

    fn session(stream: ScriptedStream) -> Session<ScriptedStream> {
        Session::new(stream, "127.0.0.1".to_string(), 1024, 4)
    }

    #[test]
    fn test_session_new() {
        let session = session(ScriptedStream::default());
        assert_eq!(session.steps, 0);
        assert_eq!(session.peer, "127.0.0.1");
        assert!(!session.has_partial_message());
    }

    #[test]
    fn test_session_stats() {
        let mut wire = encode_frame(b"abc");
        wire.extend(encode_frame(b"de"));
        let mut session = session(ScriptedStream::chunks(vec![wire]));

        while session.poll_message().unwrap().is_some() {}
        session.send(b"0123456789").unwrap();
        session.tick();

        assert_eq!(session.messages_received, 2);
        assert_eq!(session.bytes_received, 5);
        assert_eq!(session.messages_sent, 1);
        assert_eq!(session.bytes_sent, 10);
        assert_eq!(session.steps, 1);
        assert_eq!(session.stream().written, encode_frame(b"0123456789"));
    }

    #[test]
    fn test_session_partial_message() {
        let frame = encode_frame(b"hello");
        let mut session = session(ScriptedStream::chunks(vec![frame[..6].to_vec()]));
        assert!(session.poll_message().unwrap().is_none());
        assert!(session.has_partial_message());
        assert_eq!(session.partial_message_len(), 5);
        assert_eq!(session.messages_received, 0);
    }

    #[test]
    fn test_session_counts_only_written_frames() {
        let stream = ScriptedStream {
            writes_before_block: Some(0),
            ..Default::default()
        };
        let mut session = Session::new(stream, "127.0.0.1".to_string(), 1024, 2);

        assert_eq!(session.send(b"first").unwrap(), Flush::Stalled);
        assert_eq!(session.send(b"second").unwrap(), Flush::Stalled);
        assert_eq!(session.messages_sent, 0);
        assert_eq!(session.bytes_sent, 0);
        assert_eq!(session.outbound_backlog(), 2);

        assert!(matches!(
            session.send(b"third"),
            Err(FramingError::BacklogFull(2))
        ));
        assert_eq!(session.messages_sent, 0);
        assert_eq!(session.bytes_sent, 0);
        assert!(session.stream().written.is_empty());

        session.stream.writes_before_block = None;
        assert_eq!(session.send(b"fourth").unwrap(), Flush::Complete);
        assert_eq!(session.messages_sent, 3);
        assert_eq!(session.bytes_sent, 17);

        let mut expected = encode_frame(b"first");
        expected.extend(encode_frame(b"second"));
        expected.extend(encode_frame(b"fourth"));
        assert_eq!(session.stream().written, expected);
    }
}
