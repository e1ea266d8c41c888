use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::delimiter::{is_complete, Delimiter};
use crate::error::{FrameError, Result};

/// Default cap on bytes buffered while waiting for a delimiter: 64 KiB.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Cuts a serial byte stream into delimiter-terminated frames.
///
/// The buffer is checked after every byte, so a frame ends at the first
/// position where the accumulated bytes end with the delimiter. The emitted
/// frame includes the delimiter; the next frame starts from an empty buffer.
#[derive(Debug, Clone)]
pub struct DelimiterCodec {
    delimiter: Delimiter,
    max_frame: usize,
    scanned: usize,
}

impl DelimiterCodec {
    /// Create a codec with the default frame cap.
    pub fn new(delimiter: Delimiter) -> Self {
        Self::with_max_frame(delimiter, DEFAULT_MAX_FRAME)
    }

    /// Create a codec with an explicit frame cap.
    pub fn with_max_frame(delimiter: Delimiter, max_frame: usize) -> Self {
        Self {
            delimiter,
            max_frame,
            scanned: 0,
        }
    }

    /// The delimiter frames are terminated by.
    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }
}

impl Decoder for DelimiterCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let delimiter = self.delimiter.as_bytes();

        for end in (self.scanned + 1)..=src.len() {
            if is_complete(&src[..end], delimiter) {
                self.scanned = 0;
                let frame = src.split_to(end).freeze();
                trace!(len = frame.len(), "delimiter found");
                return Ok(Some(frame));
            }
        }

        self.scanned = src.len();
        if src.len() > self.max_frame {
            return Err(FrameError::FrameTooLarge {
                size: src.len(),
                max: self.max_frame,
            });
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::UnexpectedEof),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;

    fn codec(delimiter: &[u8]) -> DelimiterCodec {
        DelimiterCodec::new(Delimiter::new(delimiter.to_vec()).unwrap())
    }

    #[test]
    fn emits_frame_including_delimiter() {
        let mut codec = codec(b"\r\n");
        let mut buf = BytesMut::from(&b"AB\r\n"[..]);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"AB\r\n");
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn waits_for_the_rest_of_a_split_delimiter() {
        let mut codec = codec(b"\r\n");
        let mut buf = BytesMut::from(&b"AB\r"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"AB\r\n");
    }

    #[test]
    fn splits_several_frames_from_one_read() {
        let mut codec = codec(b";");
        let mut buf = BytesMut::from(&b"one;two;thr"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"one;");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"two;");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.as_ref(), b"thr");
    }

    #[test]
    fn frame_ends_at_first_match() {
        let mut codec = codec(b"aa");
        let mut buf = BytesMut::from(&b"baaa"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"baa");
        assert_eq!(buf.as_ref(), b"a");
    }

    #[test]
    fn lone_delimiter_is_a_frame() {
        let mut codec = codec(b"\r");
        let mut buf = BytesMut::from(&b"\r\r"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"\r");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), b"\r");
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = DelimiterCodec::with_max_frame(Delimiter::new(&b"\r"[..]).unwrap(), 4);
        let mut buf = BytesMut::from(&b"ABCDE"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 5, max: 4 }));
    }

    #[test]
    fn eof_with_partial_frame_is_an_error() {
        let mut codec = codec(b"\r");
        let mut buf = BytesMut::from(&b"AB"[..]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(FrameError::UnexpectedEof)
        ));

        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[tokio::test]
    async fn framed_read_over_stream() {
        let wire: &[u8] = b"PWR=1\rVOL=20\r";
        let mut frames = FramedRead::new(wire, codec(b"\r"));

        assert_eq!(frames.next().await.unwrap().unwrap().as_ref(), b"PWR=1\r");
        assert_eq!(frames.next().await.unwrap().unwrap().as_ref(), b"VOL=20\r");
        assert!(frames.next().await.is_none());
    }
}
