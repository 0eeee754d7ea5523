//! Message framing for the length-prefixed protocol
//!
//! Format (both directions): [4 bytes big-endian length][payload]
//!
//! Streams are non-blocking. The decoder keeps partial headers and payloads
//! across calls so a message split over any number of reads, or steps, comes
//! out whole. The writer keeps unsent frames when the peer stops draining,
//! up to a bound past which the connection is treated as dead.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::robot::constants::net::{HEADER_SIZE, MAX_MESSAGE_SIZE, MAX_OUTBOUND_BACKLOG};

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("Peer stopped reading, {0} frames queued")]
    BacklogFull(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Prefix a payload with its big-endian length
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reassembly state for the message currently in flight
#[derive(Debug)]
enum Inbound {
    /// Reading the length header, payload storage not yet allocated
    Header { buf: [u8; HEADER_SIZE], filled: usize },
    /// Header complete, reading `buf.len()` payload bytes
    Payload { buf: Vec<u8>, filled: usize },
}

impl Inbound {
    fn idle() -> Self {
        Inbound::Header {
            buf: [0; HEADER_SIZE],
            filled: 0,
        }
    }
}

/// Incremental reader for length-prefixed frames
#[derive(Debug)]
pub struct FrameDecoder {
    state: Inbound,
    max_message_size: usize,
}

impl FrameDecoder {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            state: Inbound::idle(),
            max_message_size,
        }
    }

    /// True while part of a message has been read
    pub fn has_partial(&self) -> bool {
        match &self.state {
            Inbound::Header { filled, .. } => *filled > 0,
            Inbound::Payload { .. } => true,
        }
    }

    /// Declared length of the message in flight, 0 when none is pending
    pub fn pending_len(&self) -> usize {
        match &self.state {
            Inbound::Header { .. } => 0,
            Inbound::Payload { buf, .. } => buf.len(),
        }
    }

    /// Read until one message completes or the stream has nothing more
    ///
    /// Returns `Ok(None)` when the stream would block. Zero-length frames are
    /// consumed and skipped. End of stream is `ConnectionClosed`.
    pub fn poll<R: Read>(&mut self, reader: &mut R) -> Result<Option<Vec<u8>>, FramingError> {
        loop {
            match &mut self.state {
                Inbound::Header { buf, filled } => {
                    let Some(n) = read_some(reader, &mut buf[*filled..])? else {
                        return Ok(None);
                    };
                    *filled += n;
                    if *filled < HEADER_SIZE {
                        continue;
                    }
                    let len = u32::from_be_bytes(*buf) as usize;
                    if len > self.max_message_size {
                        self.state = Inbound::idle();
                        return Err(FramingError::MessageTooLarge(len, self.max_message_size));
                    }
                    if len == 0 {
                        self.state = Inbound::idle();
                        continue;
                    }
                    self.state = Inbound::Payload {
                        buf: vec![0; len],
                        filled: 0,
                    };
                }
                Inbound::Payload { buf, filled } => {
                    let Some(n) = read_some(reader, &mut buf[*filled..])? else {
                        return Ok(None);
                    };
                    *filled += n;
                    if *filled == buf.len() {
                        let done = std::mem::replace(&mut self.state, Inbound::idle());
                        if let Inbound::Payload { buf, .. } = done {
                            return Ok(Some(buf));
                        }
                    }
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

/// One read attempt: `Some(n > 0)` on progress, `None` when it would block
fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Option<usize>, FramingError> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Err(FramingError::ConnectionClosed),
            Ok(n) => return Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FramingError::Io(e)),
        }
    }
}

/// Outcome of a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Every queued byte reached the socket
    Complete,
    /// The socket is full, the rest goes out on a later step
    Stalled,
}

/// Frame sender with a bounded backlog of unsent frames
///
/// Frames are never dropped: once the backlog is full and the socket still
/// accepts nothing, `send` fails with `BacklogFull`.
#[derive(Debug)]
pub struct FrameWriter {
    /// Queued frames, the front one possibly half-written
    queue: VecDeque<Vec<u8>>,
    /// Bytes of the front frame already written
    offset: usize,
    max_backlog: usize,
    /// Frames fully handed to the socket
    frames_written: u64,
    /// Payload bytes of those frames, headers excluded
    bytes_written: u64,
}

impl FrameWriter {
    pub fn new(max_backlog: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            offset: 0,
            max_backlog: max_backlog.max(1),
            frames_written: 0,
            bytes_written: 0,
        }
    }

    /// Frames waiting to be written
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Queue a payload and write as much as the socket accepts
    pub fn send<W: Write>(&mut self, writer: &mut W, payload: &[u8]) -> Result<Flush, FramingError> {
        if self.queue.len() >= self.max_backlog {
            self.flush(writer)?;
            if self.queue.len() >= self.max_backlog {
                return Err(FramingError::BacklogFull(self.queue.len()));
            }
        }
        self.queue.push_back(encode_frame(payload));
        self.flush(writer)
    }

    /// Write queued frames until done, stalled, or failed
    pub fn flush<W: Write>(&mut self, writer: &mut W) -> Result<Flush, FramingError> {
        while let Some(front) = self.queue.front() {
            match writer.write(&front[self.offset..]) {
                Ok(0) => return Err(FramingError::ConnectionClosed),
                Ok(n) => {
                    self.offset += n;
                    let len = front.len();
                    if self.offset == len {
                        self.queue.pop_front();
                        self.offset = 0;
                        self.frames_written += 1;
                        self.bytes_written += (len - HEADER_SIZE) as u64;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Flush::Stalled),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FramingError::Io(e)),
            }
        }
        Ok(Flush::Complete)
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new(MAX_OUTBOUND_BACKLOG)
    }
}

/// Write a fixed token, blocking until it is fully sent
pub fn write_token<W: Write>(writer: &mut W, token: &[u8]) -> Result<(), FramingError> {
    writer.write_all(token)?;
    writer.flush()?;
    Ok(())
}
