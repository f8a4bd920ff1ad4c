//! Cuts a raw MJPEG byte stream into individual JPEG images.

use bytes::Bytes;
use memchr::memmem;
use tracing::warn;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on buffered bytes without a complete frame.
pub const MAX_PENDING: usize = 8 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct JpegSplitter {
    buf: Vec<u8>,
    /// Where the end-of-image search for the pending frame resumes.
    eoi_from: usize,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return every frame it completed, oldest first.
    /// Bytes ahead of a start-of-image marker are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut cursor = 0;
        loop {
            let Some(start) = memmem::find(&self.buf[cursor..], &SOI).map(|i| cursor + i) else {
                // a trailing 0xFF may be the first half of the next SOI
                let keep_from = match self.buf.last() {
                    Some(0xFF) => self.buf.len() - 1,
                    _ => self.buf.len(),
                };
                cursor = keep_from.max(cursor);
                self.eoi_from = 0;
                break;
            };
            let from = (start + 2).max(self.eoi_from);
            match memmem::find(&self.buf[from..], &EOI) {
                Some(i) => {
                    let end = from + i + 2;
                    frames.push(Bytes::copy_from_slice(&self.buf[start..end]));
                    cursor = end;
                    self.eoi_from = 0;
                }
                None => {
                    cursor = start;
                    // keep the last byte in range: it may be the 0xFF of an EOI
                    self.eoi_from = (self.buf.len() - 1).max(start + 2);
                    break;
                }
            }
        }
        self.buf.drain(..cursor);
        self.eoi_from = self.eoi_from.saturating_sub(cursor);

        if self.buf.len() > MAX_PENDING {
            warn!("camera: {} bytes without an end-of-image marker; resyncing", self.buf.len());
            self.buf.clear();
            self.eoi_from = 0;
        }
        frames
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(body);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn single_frame_with_leading_garbage() {
        let mut s = JpegSplitter::new();
        let mut input = b"noise".to_vec();
        input.extend(jpeg(b"abc"));
        let frames = s.push(&input);
        assert_eq!(frames, vec![Bytes::from(jpeg(b"abc"))]);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn frame_split_across_reads() {
        let mut s = JpegSplitter::new();
        let f = jpeg(b"0123456789");
        assert!(s.push(&f[..4]).is_empty());
        assert!(s.push(&f[4..9]).is_empty());
        assert_eq!(s.push(&f[9..]), vec![Bytes::from(f.clone())]);
    }

    #[test]
    fn marker_split_between_reads() {
        let mut s = JpegSplitter::new();
        let f = jpeg(b"xy");
        // chunk ends on the 0xFF of SOI
        assert!(s.push(&[b'z', 0xFF]).is_empty());
        assert_eq!(s.pending(), 1);
        assert_eq!(s.push(&f[1..]), vec![Bytes::from(f)]);
    }

    #[test]
    fn several_frames_in_one_read() {
        let mut s = JpegSplitter::new();
        let mut input = jpeg(b"one");
        input.extend(jpeg(b"two"));
        input.extend(&jpeg(b"three")[..4]);
        let frames = s.push(&input);
        assert_eq!(frames, vec![Bytes::from(jpeg(b"one")), Bytes::from(jpeg(b"two"))]);
        assert_eq!(s.pending(), 4);
    }

    #[test]
    fn eoi_is_searched_after_soi() {
        // FF D8 D9: the D8 must not pair with a following D9 as an EOI
        let mut s = JpegSplitter::new();
        assert!(s.push(&[0xFF, 0xD8, 0xD9]).is_empty());
        assert_eq!(s.push(&[0xFF, 0xD9]), vec![Bytes::from_static(&[0xFF, 0xD8, 0xD9, 0xFF, 0xD9])]);
    }

    #[test]
    fn eoi_split_between_reads_after_long_body() {
        let mut s = JpegSplitter::new();
        let mut head = SOI.to_vec();
        head.extend(std::iter::repeat(0x11).take(5000));
        head.push(0xFF);
        assert!(s.push(&head).is_empty());
        assert!(s.push(&[0x22; 100]).is_empty());
        // a lone FF at the end of one read and D9 at the start of the next
        assert!(s.push(&[0xFF]).is_empty());
        let frames = s.push(&[0xD9, 0xFF, 0xD8]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 2 + 5000 + 1 + 100 + 2);
        assert!(frames[0].ends_with(&EOI));
        assert_eq!(s.pending(), 2);
    }

    #[test]
    fn runaway_buffer_is_dropped() {
        let mut s = JpegSplitter::new();
        s.push(&SOI);
        s.push(&vec![0u8; MAX_PENDING]);
        assert_eq!(s.pending(), 0);
    }
}
