use std::io;
use std::io::Write;

/// Write implementation that collects data into a buffer and hands it to it's
/// interior writer in large transfers, each a whole number of records.
///
/// Fixed block tape drives reject any transfer that isn't a multiple of their
/// block size, so the record size should be the drive's block size.
pub struct BlockingWriter<W> {
    record_size: usize,
    inner: W,
    block: Vec<u8>,
    block_size: usize,
}

impl<W: Write> BlockingWriter<W> {
    /// Create a writer that buffers `buffer_size` bytes at a time and pads
    /// its final transfer to a multiple of `record_size`.
    ///
    /// `buffer_size` must be a nonzero multiple of `record_size`.
    pub fn new(inner: W, record_size: usize, buffer_size: usize) -> io::Result<BlockingWriter<W>> {
        if record_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Record size must be greater than zero"));
        }

        if buffer_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Buffer size must be greater than zero"));
        }

        if buffer_size % record_size != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("Buffer size {} is not a multiple of record size {}", buffer_size, record_size)));
        }

        Ok(BlockingWriter {
            record_size: record_size,
            inner: inner,
            block: Vec::with_capacity(buffer_size),
            block_size: buffer_size,
        })
    }

    pub fn as_inner_writer(&self) -> &W {
        &self.inner
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Attempts to fill the interior block with as much data as possible.
    ///
    /// # Returns
    ///
    /// The number of bytes taken from `buf`.
    fn fill_block(&mut self, buf: &[u8]) -> usize {
        let block_space = self.block_size - self.block.len();
        let taken = block_space.min(buf.len());

        self.block.extend_from_slice(&buf[..taken]);

        taken
    }

    /// Forward the interior block onto the inner writer, if it is full or
    /// `force` is set, then empty it.
    fn empty_block(&mut self, force: bool) -> io::Result<()> {
        if self.block.len() >= self.block_size || (force && self.block.len() > 0) {
            self.inner.write_all(&self.block)?;
            self.block.clear();
        }

        Ok(())
    }
}

impl<W: Write> Write for BlockingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        //Precondition: Ensure the write buffer isn't full.
        self.empty_block(false)?;

        if buf.len() == 0 {
            return Ok(0);
        }

        //Optimization: If the block buffer is empty, and the incoming data is
        //at least a whole block, hand the inner writer slices of the caller's
        //buffer without copying.
        if self.block.len() == 0 && buf.len() >= self.block_size {
            let mut shortcircuit_writes = 0;

            while buf.len() - shortcircuit_writes >= self.block_size {
                self.inner.write_all(&buf[shortcircuit_writes..shortcircuit_writes + self.block_size])?;
                shortcircuit_writes += self.block_size;
            }

            return Ok(shortcircuit_writes);
        }

        Ok(self.fill_block(buf))
    }

    /// Flush the output stream, ensuring that all intermediately buffered
    /// contents reach their destination.
    ///
    /// The buffered tail is padded with zeroes up to the next record boundary
    /// first, since the inner writer only ever receives whole records.
    fn flush(&mut self) -> io::Result<()> {
        let tail = self.block.len() % self.record_size;
        if tail != 0 {
            let padded = self.block.len() + self.record_size - tail;
            self.block.resize(padded, 0);
        }

        self.empty_block(true)?;
        self.inner.flush()?;

        Ok(())
    }
}
