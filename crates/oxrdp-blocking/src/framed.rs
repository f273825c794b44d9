use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use oxrdp_pdu::PduHint;

/// A blocking stream with frame accumulation.
///
/// Bytes are pulled from the stream into an internal buffer until a whole
/// frame is available; leftover bytes stay buffered for the next call, so
/// the stream can be fed frames back to back.
pub struct Framed<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> Framed<S> {
    pub fn new(stream: S) -> Self {
        Self::new_with_leftover(stream, BytesMut::new())
    }

    pub fn new_with_leftover(stream: S, leftover: BytesMut) -> Self {
        Self { stream, buf: leftover }
    }

    pub fn into_inner(self) -> (S, BytesMut) {
        (self.stream, self.buf)
    }

    pub fn get_inner(&self) -> (&S, &BytesMut) {
        (&self.stream, &self.buf)
    }

    pub fn get_inner_mut(&mut self) -> (&mut S, &mut BytesMut) {
        (&mut self.stream, &mut self.buf)
    }

    pub fn peek(&self) -> &[u8] {
        &self.buf
    }
}

impl<S> Framed<S>
where
    S: Read,
{
    /// Accumulates at least `length` bytes and splits off exactly `length`,
    /// keeping any surplus buffered.
    pub fn read_exact(&mut self, length: usize) -> io::Result<BytesMut> {
        loop {
            if self.buf.len() >= length {
                return Ok(self.buf.split_to(length));
            }

            self.buf.reserve(length - self.buf.len());

            let len = self.read()?;

            if len == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"));
            }
        }
    }

    /// Reads one standard RDP frame (slow path or fast path).
    pub fn read_pdu(&mut self) -> io::Result<(oxrdp_pdu::Action, BytesMut)> {
        loop {
            match oxrdp_pdu::find_frame_size(self.peek()) {
                Ok(Some(frame_info)) => {
                    let frame = self.read_exact(frame_info.length)?;

                    return Ok((frame_info.action, frame));
                }
                Ok(None) => {
                    let len = self.read()?;

                    if len == 0 {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"));
                    }
                }
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            };
        }
    }

    /// Reads a frame matched by the provided hint.
    pub fn read_by_hint(&mut self, hint: &dyn PduHint) -> io::Result<Bytes> {
        loop {
            match hint
                .find_size(self.peek())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            {
                Some(length) => {
                    return Ok(self.read_exact(length)?.freeze());
                }
                None => {
                    let len = self.read()?;

                    if len == 0 {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"));
                    }
                }
            };
        }
    }

    /// Pulls more bytes from the stream into the internal buffer.
    fn read(&mut self) -> io::Result<usize> {
        let mut read_bytes = [0u8; 1024];
        let len = self.stream.read(&mut read_bytes)?;
        self.buf.extend_from_slice(&read_bytes[..len]);

        Ok(len)
    }
}

impl<S> Framed<S>
where
    S: Write,
{
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)?;
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_are_split_on_boundaries() {
        // Two slow-path frames back to back.
        let bytes = vec![
            0x03, 0x00, 0x00, 0x05, 0xAA, // frame 1
            0x03, 0x00, 0x00, 0x06, 0xBB, 0xCC, // frame 2
        ];

        let mut framed = Framed::new(Cursor::new(bytes));

        let (action, frame) = framed.read_pdu().unwrap();
        assert_eq!(action, oxrdp_pdu::Action::X224);
        assert_eq!(frame.as_ref(), [0x03, 0x00, 0x00, 0x05, 0xAA]);

        let (_, frame) = framed.read_pdu().unwrap();
        assert_eq!(frame.as_ref(), [0x03, 0x00, 0x00, 0x06, 0xBB, 0xCC]);
    }

    #[test]
    fn eof_is_reported() {
        let mut framed = Framed::new(Cursor::new(vec![0x03, 0x00]));
        assert_eq!(framed.read_pdu().unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
