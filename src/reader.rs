//! Byte-level access to an SNR2 image.
//!
//! The reader is a seekable cursor over an in-memory image (usually a
//! memory-mapped file). Reads past the end of the image never fail:
//! fixed-size reads are zero-filled and string reads stop early. Dumps
//! pulled out of game archives are often truncated, so this is how the
//! loader copes with them.

/// Largest fixed-size record the format defines (the 60-byte header).
pub const MAX_RECORD_SIZE: usize = 64;

/// A fixed-layout record decoded from little-endian bytes.
pub trait Record: Sized {
    /// Size of the record in the file, in bytes.
    const SIZE: usize;

    /// Decodes the record from exactly `SIZE` bytes.
    fn decode(fields: &mut Fields<'_>) -> Self;
}

/// Sequential little-endian field decoder over a record buffer.
///
/// The buffer is always `Record::SIZE` bytes long, so field accessors
/// index directly.
pub struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    pub fn u16(&mut self) -> u16 {
        let b = &self.buf[self.pos..self.pos + 2];
        self.pos += 2;
        u16::from_le_bytes([b[0], b[1]])
    }

    pub fn u32(&mut self) -> u32 {
        let b = &self.buf[self.pos..self.pos + 4];
        self.pos += 4;
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
}

/// Seekable cursor over an image.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total size of the image in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Moves to an absolute offset. Seeking past the end is allowed.
    pub fn seek(&mut self, offset: u64) {
        self.pos = offset;
    }

    /// Fills `out` from the current position and advances past it.
    ///
    /// Bytes beyond the end of the image are left as zero. Returns how
    /// many bytes actually came from the image.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        out.fill(0);
        let available = self.remaining();
        let fit = available.len().min(out.len());
        out[..fit].copy_from_slice(&available[..fit]);
        self.pos = self.pos.saturating_add(out.len() as u64);
        fit
    }

    /// Reads one fixed-size record, zero-filling whatever lies past EOF.
    pub fn read_record<T: Record>(&mut self) -> T {
        debug_assert!(T::SIZE <= MAX_RECORD_SIZE);
        let start = self.pos;
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let got = self.read_into(&mut buf[..T::SIZE]);
        if got < T::SIZE {
            tracing::trace!(
                "short read at 0x{:x}: {} of {} bytes, zero-filled",
                start,
                got,
                T::SIZE
            );
        }
        T::decode(&mut Fields::new(&buf[..T::SIZE]))
    }

    /// Reads a null-terminated string at an absolute offset.
    ///
    /// Scans at most `max_len` bytes; a string with no terminator inside
    /// that window is cut at the cap. Leaves the cursor just past the
    /// bytes consumed (including the terminator, if found).
    pub fn read_cstr_at(&mut self, offset: u64, max_len: usize) -> String {
        self.seek(offset);
        let window = self.remaining();
        let window = &window[..window.len().min(max_len)];
        let (text, consumed) = match window.iter().position(|&b| b == 0) {
            Some(end) => (&window[..end], end + 1),
            None => {
                if window.len() == max_len {
                    tracing::trace!(
                        "unterminated string at 0x{:x}, cut at {} bytes",
                        offset,
                        max_len
                    );
                }
                (window, window.len())
            }
        };
        self.pos = self.pos.saturating_add(consumed as u64);
        String::from_utf8_lossy(text).into_owned()
    }

    fn remaining(&self) -> &'a [u8] {
        match usize::try_from(self.pos) {
            Ok(pos) if pos < self.data.len() => &self.data[pos..],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        a: u32,
        b: u16,
        c: u8,
    }

    impl Record for Pair {
        const SIZE: usize = 7;

        fn decode(f: &mut Fields<'_>) -> Self {
            Self {
                a: f.u32(),
                b: f.u16(),
                c: f.u8(),
            }
        }
    }

    #[test]
    fn record_is_little_endian() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xcd, 0xab, 0x7f];
        let mut r = BinaryReader::new(&data);
        let p: Pair = r.read_record();
        assert_eq!(p.a, 0x1234_5678);
        assert_eq!(p.b, 0xabcd);
        assert_eq!(p.c, 0x7f);
        assert_eq!(r.position(), 7);
    }

    #[test]
    fn short_record_is_zero_filled() {
        let data = [0x01, 0x00, 0x00, 0x00, 0xff];
        let mut r = BinaryReader::new(&data);
        let p: Pair = r.read_record();
        assert_eq!(p.a, 1);
        assert_eq!(p.b, 0x00ff);
        assert_eq!(p.c, 0);
    }

    #[test]
    fn record_past_end_is_all_zero() {
        let data = [0xffu8; 4];
        let mut r = BinaryReader::new(&data);
        r.seek(100);
        let p: Pair = r.read_record();
        assert_eq!((p.a, p.b, p.c), (0, 0, 0));
        assert_eq!(r.position(), 107);
    }

    #[test]
    fn cstr_stops_at_null() {
        let data = b"xxfoo\0bar\0";
        let mut r = BinaryReader::new(data);
        assert_eq!(r.read_cstr_at(2, 256), "foo");
        assert_eq!(r.position(), 6);
        assert_eq!(r.read_cstr_at(6, 256), "bar");
    }

    #[test]
    fn cstr_is_capped() {
        let data = b"abcdefgh";
        let mut r = BinaryReader::new(data);
        assert_eq!(r.read_cstr_at(0, 4), "abcd");
        assert_eq!(r.read_cstr_at(4, 256), "efgh");
    }

    #[test]
    fn cstr_past_end_is_empty() {
        let mut r = BinaryReader::new(b"abc");
        assert_eq!(r.read_cstr_at(10, 256), "");
        assert_eq!(r.size(), 3);
    }
}
