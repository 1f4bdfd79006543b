use std::{io, cmp, mem};
use rayon::join;
use rand::RngCore;
use rand::rngs::StdRng;
use sha1::{Digest, Sha1};
use crate::result::PartialResult;
use crate::result::PartialResult::*;

const DEFAULT_BUF_SIZE : usize = 10*512;

/// Read from `r` until `buf` is full or the reader hits end of file.
fn fill<R: ?Sized + io::Read>(r: &mut R, buf: &mut [u8]) -> PartialResult<usize, io::Error> {
    let mut filled = 0;

    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Partial(filled, e),
        }
    }

    Complete(filled)
}

/// Issue one write of `buf` to `w`.
fn drain<W: ?Sized + io::Write>(w: &mut W, buf: &[u8]) -> PartialResult<usize, io::Error> {
    if buf.len() == 0 {
        return Complete(0);
    }

    match w.write(buf) {
        Ok(0) => Failure(io::Error::new(io::ErrorKind::WriteZero, "failed to write whole buffer")),
        Ok(n) => Complete(n),
        Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Complete(0),
        Err(e) => Failure(e),
    }
}

/// Stream data from the reader `r` to the writer `w`.
///
/// Unlike `io::Copy`, `stream` is allowed to partially succeed. The function
/// always returns the number of bytes which were successfully written, even if
/// the reader or writer yield an error.
///
/// Copying stops at end of input or, if `limit` is given, once that many bytes
/// have been written. The writer is not flushed.
///
/// `stream` attempts to copy data using two buffers of the given `buffer_len`,
/// if specified. This is only a performance optimization, not a guarantee: if
/// your writer requires writes to occur in units of a fixed size (e.g. it's a
/// record oriented medium like a tape drive), then you should use
/// [`BlockingWriter`] to force writes of a given record size.
///
/// This function utilizes parallel I/O to do simultaneous reads and writes,
/// hence the two buffers.
///
/// [`BlockingWriter`]: crate::blocking::BlockingWriter
pub fn stream<R: ?Sized, W: ?Sized>(r: &mut R, w: &mut W, buffer_len: Option<usize>, limit: Option<u64>) -> PartialResult<u64, io::Error> where R: Send + io::Read, W: Send + io::Write {
    let buf_len = cmp::max(buffer_len.unwrap_or(DEFAULT_BUF_SIZE), 1);
    let mut written : u64 = 0;
    let mut queued : u64 = 0;
    let mut read_buf = vec![0; buf_len];
    let mut write_buf = vec![0; buf_len];
    let mut read_len = 0;
    let mut write_pos = 0;
    let mut write_len = 0;
    let mut at_eof = false;
    let mut read_error = None;

    loop {
        //Only read into an empty buffer, and never past the limit.
        let read_target = if at_eof || read_len > 0 {
            0
        } else {
            match limit {
                Some(limit) => cmp::min(buf_len as u64, limit.saturating_sub(queued)) as usize,
                None => buf_len,
            }
        };

        let pending = &write_buf[write_pos..write_len];
        let read_slice = &mut read_buf[..read_target];

        let (read_result, write_result) = join(|| fill(&mut *r, read_slice), || drain(&mut *w, pending));

        match write_result {
            Complete(w_count) => {
                written += w_count as u64;
                write_pos += w_count;
            },
            Partial(w_count, e) => return Partial(written + w_count as u64, e),
            Failure(e) => return Partial(written, e)
        };

        //Read errors are held back until everything read before them has been
        //written out.
        match read_result {
            Complete(r_count) => {
                if r_count < read_target {
                    at_eof = true;
                }

                read_len += r_count;
                queued += r_count as u64;
            },
            Partial(r_count, e) => {
                at_eof = true;
                read_error = Some(e);
                read_len += r_count;
                queued += r_count as u64;
            },
            Failure(e) => {
                at_eof = true;
                read_error = Some(e);
            }
        };

        if write_pos == write_len {
            mem::swap(&mut read_buf, &mut write_buf);
            write_pos = 0;
            write_len = read_len;
            read_len = 0;
        }

        let limit_reached = match limit {
            Some(limit) => queued >= limit,
            None => false,
        };

        if write_len == 0 && (at_eof || limit_reached) {
            break;
        }
    }

    match read_error {
        Some(e) => Partial(written, e),
        None => Complete(written),
    }
}

/// Write adapter which computes the SHA-1 digest of everything its inner
/// writer accepts.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha1,
}

impl<W: io::Write> DigestWriter<W> {
    pub fn new(inner: W) -> DigestWriter<W> {
        DigestWriter {
            inner: inner,
            hasher: Sha1::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Hex digest of the data written so far.
    pub fn hex_digest(&self) -> String {
        format!("{:x}", self.hasher.clone().finalize())
    }
}

impl<W: io::Write> io::Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.inner.write(buf)?;
        self.hasher.update(&buf[..count]);

        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Random data is generated this many bytes at a time, so the byte stream
/// doesn't depend on how callers slice their reads.
const RANDOM_BLOCK_SIZE : usize = 4096;

/// An endless source of random bytes, for exercising drives with data that
/// won't compress.
///
/// Two readers seeded alike yield the same bytes however their reads are
/// sized.
pub struct RandomReader<G = StdRng> {
    rng: G,
    block: Vec<u8>,
    block_pos: usize,
}

impl<G: RngCore> RandomReader<G> {
    pub fn from_rng(rng: G) -> RandomReader<G> {
        RandomReader {
            rng: rng,
            block: vec![0; RANDOM_BLOCK_SIZE],
            block_pos: RANDOM_BLOCK_SIZE,
        }
    }
}

impl<G: RngCore> io::Read for RandomReader<G> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;

        while filled < buf.len() {
            if self.block_pos == self.block.len() {
                self.rng.fill_bytes(&mut self.block);
                self.block_pos = 0;
            }

            let count = cmp::min(buf.len() - filled, self.block.len() - self.block_pos);

            buf[filled..filled + count].copy_from_slice(&self.block[self.block_pos..self.block_pos + count]);
            filled += count;
            self.block_pos += count;
        }

        Ok(filled)
    }
}
