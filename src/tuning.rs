//! Performance tuning related configuration

#[derive(Copy, Clone, Debug)]
pub struct Configuration {
    /// How much data `BlockingWriter` collects before handing it to the tape.
    pub buffer_size: usize,

    /// Record size used when the drive is in variable block mode.
    pub record_size: usize,

    /// Volume written and read back by the self-test.
    pub test_size: u64,

    /// Size of each of the two buffers `stream` copies through.
    pub copy_buffer: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            buffer_size: 1024*1024, //1MB
            record_size: 20*512, //Compatibility with tars that read 10k records
            test_size: 5*1024*1024,
            copy_buffer: 64*1024,
        }
    }
}

impl Configuration {
    /// The buffer size rounded up to a whole number of `record_size` records.
    pub fn buffer_size_for(&self, record_size: usize) -> usize {
        if record_size == 0 {
            return self.buffer_size;
        }

        let records = (self.buffer_size + record_size - 1) / record_size;

        records.max(1) * record_size
    }
}
