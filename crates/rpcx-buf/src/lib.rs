//! Segmented scatter/gather buffer shared by every wire codec in this workspace.
//!
//! A [`SegmentedBuffer`] is an ordered list of [`Chunk`]s, each either owned (`Vec<u8>`) or a
//! cheaply-cloned shared slice (`bytes::Bytes`). It supports the append/acquire/peek/fetch/seek/cut
//! operations the codecs need to build frames for vectored I/O without copying data that's already
//! owned elsewhere.

use std::io;

use bytes::{Buf, Bytes};
use thiserror::Error;

/// Default smallest chunk the buffer will allocate on `acquire`.
pub const PIECE_MIN_SIZE: usize = 2 * 1024;
/// Default largest chunk the buffer will allocate on `acquire`.
pub const PIECE_MAX_SIZE: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("requested cut offset {offset} exceeds buffer size {size}")]
    CutOutOfRange { offset: usize, size: usize },
    #[error("requested seek would move the cursor out of range")]
    SeekOutOfRange,
    #[error("buffer allocation failed")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, BufferError>;

/// One contiguous piece of a [`SegmentedBuffer`].
///
/// Collapses the four ownership tags of the original C/C++ buffer (COPY, GIFT_NEW, GIFT_MALLOC,
/// NOCOPY) into two Rust-idiomatic categories: the deallocator distinction between the first three
/// is a C-only concern, and `Bytes` makes "caller guarantees the lifetime" unnecessary.
#[derive(Debug, Clone)]
pub enum Chunk {
    Owned(Vec<u8>),
    Shared(Bytes),
}

impl Chunk {
    pub fn len(&self) -> usize {
        match self {
            Chunk::Owned(v) => v.len(),
            Chunk::Shared(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Chunk::Owned(v) => v.as_slice(),
            Chunk::Shared(b) => b.as_ref(),
        }
    }

    /// Returns an owned copy of this chunk's bytes, regardless of how it's currently stored.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    fn split_off(&mut self, at: usize) -> Chunk {
        match self {
            Chunk::Owned(v) => Chunk::Owned(v.split_off(at)),
            Chunk::Shared(b) => Chunk::Shared(b.split_off(at)),
        }
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(v: Vec<u8>) -> Self {
        Chunk::Owned(v)
    }
}

impl From<Bytes> for Chunk {
    fn from(b: Bytes) -> Self {
        Chunk::Shared(b)
    }
}

impl From<&[u8]> for Chunk {
    fn from(s: &[u8]) -> Self {
        Chunk::Owned(s.to_vec())
    }
}

/// A scatter/gather byte container: an ordered list of [`Chunk`]s plus a read cursor.
#[derive(Debug, Clone, Default)]
pub struct SegmentedBuffer {
    chunks: Vec<Chunk>,
    size: usize,
    /// index of the chunk the read cursor currently points into
    cursor_chunk: usize,
    /// byte offset within `chunks[cursor_chunk]`
    cursor_offset: usize,
    piece_min: usize,
    piece_max: usize,
}

impl SegmentedBuffer {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            size: 0,
            cursor_chunk: 0,
            cursor_offset: 0,
            piece_min: PIECE_MIN_SIZE,
            piece_max: PIECE_MAX_SIZE,
        }
    }

    pub fn with_piece_bounds(piece_min: usize, piece_max: usize) -> Self {
        Self {
            piece_min,
            piece_max,
            ..Self::new()
        }
    }

    /// Total number of bytes across all chunks.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Appends a chunk (owned or shared) to the tail. O(1).
    pub fn append(&mut self, chunk: impl Into<Chunk>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.size += chunk.len();
        self.chunks.push(chunk);
    }

    /// Convenience: copies `buf` into a freshly-owned chunk and appends it.
    pub fn write(&mut self, buf: &[u8]) {
        if !buf.is_empty() {
            self.append(buf.to_vec());
        }
    }

    /// Reserves up to `hint` bytes in a new owned chunk clamped to `[piece_min, piece_max]`, and
    /// returns a mutable view into it. The reservation is counted towards `size()` immediately;
    /// call [`SegmentedBuffer::backup`] to retract any unused suffix.
    pub fn acquire(&mut self, hint: usize) -> &mut [u8] {
        let len = hint.clamp(self.piece_min, self.piece_max.max(self.piece_min));
        self.size += len;
        self.chunks.push(Chunk::Owned(vec![0u8; len]));
        match self.chunks.last_mut().unwrap() {
            Chunk::Owned(v) => v.as_mut_slice(),
            Chunk::Shared(_) => unreachable!("just pushed an Owned chunk"),
        }
    }

    /// Retracts up to `n` unused bytes from the tail chunk (clamped to that chunk's length).
    /// Returns the number of bytes actually retracted.
    pub fn backup(&mut self, n: usize) -> usize {
        let Some(last) = self.chunks.last_mut() else {
            return 0;
        };
        let take = n.min(last.len());
        if take == 0 {
            return 0;
        }
        match last {
            Chunk::Owned(v) => {
                v.truncate(v.len() - take);
            }
            Chunk::Shared(b) => {
                let keep = b.len() - take;
                *b = b.slice(0..keep);
            }
        }
        if last.is_empty() {
            self.chunks.pop();
        }
        self.size -= take;
        take
    }

    /// Returns the bytes of the chunk under the read cursor, without advancing it.
    pub fn peek(&self) -> Option<&[u8]> {
        let chunk = self.chunks.get(self.cursor_chunk)?;
        Some(&chunk.as_slice()[self.cursor_offset..])
    }

    /// Returns the chunk under the read cursor (from the cursor's offset to its end) and advances
    /// the cursor to the next chunk.
    pub fn fetch(&mut self) -> Option<Chunk> {
        let chunk = self.chunks.get(self.cursor_chunk)?;
        let slice = &chunk.as_slice()[self.cursor_offset..];
        let out = Chunk::Owned(slice.to_vec());
        self.cursor_chunk += 1;
        self.cursor_offset = 0;
        Some(out)
    }

    /// Advances the read cursor by exactly `len` bytes (across chunk boundaries) and returns them
    /// as a single contiguous `Bytes`. Returns `None` if fewer than `len` bytes remain.
    pub fn fetch_exact(&mut self, len: usize) -> Option<Bytes> {
        if self.remaining() < len {
            return None;
        }
        let mut out = Vec::with_capacity(len);
        let mut remaining = len;
        while remaining > 0 {
            let chunk = &self.chunks[self.cursor_chunk];
            let avail = chunk.len() - self.cursor_offset;
            let take = avail.min(remaining);
            out.extend_from_slice(&chunk.as_slice()[self.cursor_offset..self.cursor_offset + take]);
            self.cursor_offset += take;
            remaining -= take;
            if self.cursor_offset == chunk.len() {
                self.cursor_chunk += 1;
                self.cursor_offset = 0;
            }
        }
        Some(Bytes::from(out))
    }

    fn remaining(&self) -> usize {
        if self.cursor_chunk >= self.chunks.len() {
            return 0;
        }
        let mut total = self.chunks[self.cursor_chunk].len() - self.cursor_offset;
        for c in &self.chunks[self.cursor_chunk + 1..] {
            total += c.len();
        }
        total
    }

    /// Moves the read cursor forward (positive `offset`) or backward (negative), clamped to the
    /// buffer's bounds. Returns the number of bytes actually moved.
    pub fn seek(&mut self, offset: isize) -> isize {
        if offset >= 0 {
            let mut remaining = offset as usize;
            let mut moved = 0isize;
            while remaining > 0 && self.cursor_chunk < self.chunks.len() {
                let avail = self.chunks[self.cursor_chunk].len() - self.cursor_offset;
                let step = avail.min(remaining);
                self.cursor_offset += step;
                remaining -= step;
                moved += step as isize;
                if self.cursor_offset == self.chunks[self.cursor_chunk].len() {
                    self.cursor_chunk += 1;
                    self.cursor_offset = 0;
                }
            }
            moved
        } else {
            let mut remaining = (-offset) as usize;
            let mut moved = 0isize;
            while remaining > 0 {
                if self.cursor_offset > 0 {
                    let step = self.cursor_offset.min(remaining);
                    self.cursor_offset -= step;
                    remaining -= step;
                    moved -= step as isize;
                } else if self.cursor_chunk > 0 {
                    self.cursor_chunk -= 1;
                    self.cursor_offset = self.chunks[self.cursor_chunk].len();
                } else {
                    break;
                }
            }
            moved
        }
    }

    /// Resets the read cursor to the head of the buffer.
    pub fn rewind(&mut self) {
        self.cursor_chunk = 0;
        self.cursor_offset = 0;
    }

    /// Splits the buffer at absolute byte `offset`: `self` keeps `[0, offset)`, the returned buffer
    /// receives `[offset, size)`. Chunks move by ownership, not copy. Both buffers end rewound.
    pub fn cut(&mut self, offset: usize) -> Result<SegmentedBuffer> {
        if offset > self.size {
            return Err(BufferError::CutOutOfRange {
                offset,
                size: self.size,
            });
        }
        let mut tail = SegmentedBuffer::with_piece_bounds(self.piece_min, self.piece_max);
        if offset == self.size {
            self.rewind();
            return Ok(tail);
        }

        let mut consumed = 0usize;
        let mut split_at_chunk = None;
        for (i, c) in self.chunks.iter().enumerate() {
            if consumed + c.len() > offset {
                split_at_chunk = Some((i, offset - consumed));
                break;
            }
            consumed += c.len();
        }
        let (idx, within) = split_at_chunk.expect("offset < size implies a split point exists");

        let mut tail_chunks: Vec<Chunk> = self.chunks.split_off(idx + 1);
        if within < self.chunks[idx].len() {
            let rest = self.chunks[idx].split_off(within);
            tail_chunks.insert(0, rest);
        }

        for c in tail_chunks {
            tail.size += c.len();
            tail.chunks.push(c);
        }
        self.size = offset;
        self.rewind();
        Ok(tail)
    }

    /// Produces at most `max` chunks suitable for vectored I/O; merges adjacent chunks if there are
    /// more than `max`, or concatenates everything into one allocation if `max == 1`.
    pub fn encode(&self, max: usize) -> Vec<Chunk> {
        if max == 0 || self.chunks.is_empty() {
            return Vec::new();
        }
        if max == 1 || self.chunks.len() <= max {
            if max == 1 && self.chunks.len() > 1 {
                return vec![Chunk::Owned(self.merged_vec())];
            }
            return self.chunks.clone();
        }

        let mut out: Vec<Chunk> = Vec::with_capacity(max);
        let per_merge = self.chunks.len().div_ceil(max);
        for group in self.chunks.chunks(per_merge) {
            if group.len() == 1 {
                out.push(group[0].clone());
            } else {
                let mut merged = Vec::with_capacity(group.iter().map(Chunk::len).sum());
                for c in group {
                    merged.extend_from_slice(c.as_slice());
                }
                out.push(Chunk::Owned(merged));
            }
        }
        out
    }

    fn merged_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        for c in &self.chunks {
            out.extend_from_slice(c.as_slice());
        }
        out
    }

    /// Coalesces the whole buffer into a single chunk and returns its bytes. Idempotent if the
    /// buffer is already one chunk.
    pub fn merge_all(&mut self) -> &[u8] {
        if self.chunks.len() > 1 {
            let merged = self.merged_vec();
            self.chunks = vec![Chunk::Owned(merged)];
        }
        self.chunks.first().map(Chunk::as_slice).unwrap_or(&[])
    }

    /// A `std::io::Read` view over the unread tail of the buffer, without consuming the cursor
    /// until bytes are actually read.
    pub fn reader(&mut self) -> SegmentedBufferReader<'_> {
        SegmentedBufferReader { buf: self }
    }

    /// Total bytes not yet consumed by the read cursor.
    pub fn unread_len(&self) -> usize {
        self.remaining()
    }
}

/// Adapter implementing `std::io::Read` over a [`SegmentedBuffer`]'s unread tail, so protocol
/// libraries (e.g. `thrift`) that expect `Read`/`Write` can drive the buffer directly.
pub struct SegmentedBufferReader<'a> {
    buf: &'a mut SegmentedBuffer,
}

impl io::Read for SegmentedBufferReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let want = out.len().min(self.buf.remaining());
        if want == 0 {
            return Ok(0);
        }
        let bytes = self.buf.fetch_exact(want).expect("want <= remaining");
        let mut b = bytes;
        let n = b.len();
        b.copy_to_slice(&mut out[..n]);
        Ok(n)
    }
}

/// Adapter implementing `std::io::Write` that appends every write as an owned chunk, so protocol
/// libraries can serialize directly into a [`SegmentedBuffer`].
pub struct SegmentedBufferWriter<'a> {
    buf: &'a mut SegmentedBuffer,
}

impl<'a> SegmentedBufferWriter<'a> {
    pub fn new(buf: &'a mut SegmentedBuffer) -> Self {
        Self { buf }
    }
}

impl io::Write for SegmentedBufferWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
