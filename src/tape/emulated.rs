//! In-memory tape device.
//!
//! Behaves like a non-rewinding Linux tape node: the medium and the current
//! position survive `close` and `open`, reads return one block at a time, a
//! filemark reads as a zero-length block, and a write that does not fit on
//! the remaining medium transfers nothing.

use std::ffi;
use log::debug;
use crate::tape::{check_region, DeviceError, TapeDevice, TapeFlags, VARIABLE_BLOCK_SIZE};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Record {
    Block(Vec<u8>),
    Filemark,
}

/// Bytes of block data held by `records`.
fn bytes_in(records: &[Record]) -> u64 {
    records.iter().map(|record| match record {
        Record::Block(data) => data.len() as u64,
        Record::Filemark => 0,
    }).sum()
}

pub struct EmulatedTapeDevice {
    records: Vec<Record>,
    capacity: u64,
    position: usize,
    block_size: u32,
    path: Option<ffi::OsString>,
    flags: TapeFlags,
}

impl EmulatedTapeDevice {
    /// Construct a closed device holding a blank medium of unlimited size.
    pub fn new() -> EmulatedTapeDevice {
        EmulatedTapeDevice::with_capacity(u64::max_value())
    }

    /// Construct a closed device holding a blank medium of `capacity` bytes.
    pub fn with_capacity(capacity: u64) -> EmulatedTapeDevice {
        EmulatedTapeDevice {
            records: Vec::new(),
            capacity: capacity,
            position: 0,
            block_size: VARIABLE_BLOCK_SIZE,
            path: None,
            flags: TapeFlags::default(),
        }
    }

    /// Number of records (blocks and filemarks) recorded on the medium.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Bytes of block data recorded on the medium.
    pub fn used(&self) -> u64 {
        bytes_in(&self.records)
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.path.is_none() {
            return Err(DeviceError::NotOpen);
        }

        Ok(())
    }

    fn check_alignment(&self, length: usize) -> Result<(), DeviceError> {
        if self.block_size != VARIABLE_BLOCK_SIZE && length % self.block_size as usize != 0 {
            return Err(DeviceError::InvalidArgument(format!("transfer of {} bytes is not a multiple of the {} byte block size", length, self.block_size)));
        }

        Ok(())
    }
}

impl Default for EmulatedTapeDevice {
    fn default() -> EmulatedTapeDevice {
        EmulatedTapeDevice::new()
    }
}

impl TapeDevice for EmulatedTapeDevice {
    fn open(&mut self, path: &ffi::OsStr) -> Result<(), DeviceError> {
        if self.path.is_some() {
            return Err(DeviceError::AlreadyOpen);
        }

        debug!("opened emulated tape device {:?}", path);
        self.path = Some(path.to_os_string());

        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.path = None;

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.path.is_some()
    }

    fn read(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        let region = check_region(buf.len(), offset, length)?;
        self.ensure_open()?;

        if length == 0 {
            return Ok(0);
        }

        self.check_alignment(length)?;

        let target = &mut buf[region];
        let mut filled = 0;

        while filled < target.len() {
            match self.records.get(self.position) {
                Some(Record::Block(data)) => {
                    let count = if self.block_size == VARIABLE_BLOCK_SIZE {
                        //Variable mode hands out one block per read; whatever
                        //doesn't fit is lost.
                        target.len()
                    } else {
                        self.block_size as usize
                    };
                    let count = count.min(data.len()).min(target.len() - filled);

                    target[filled..filled + count].copy_from_slice(&data[..count]);
                    filled += count;
                    self.position += 1;

                    if self.block_size == VARIABLE_BLOCK_SIZE {
                        break;
                    }
                },
                Some(Record::Filemark) => {
                    if filled == 0 {
                        self.position += 1;
                        debug!("emulated tape read a filemark");
                        self.flags.end_of_data = true;
                    }

                    break;
                },
                None => {
                    if filled == 0 {
                        debug!("emulated tape read past end of data");
                        self.flags.end_of_data = true;
                    }

                    break;
                }
            }
        }

        Ok(filled)
    }

    fn write(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        let region = check_region(buf.len(), offset, length)?;
        self.ensure_open()?;

        if length == 0 {
            return Ok(0);
        }

        self.check_alignment(length)?;

        //Writing anywhere but the end of data discards everything after it,
        //but only once the write is known to fit.
        if bytes_in(&self.records[..self.position]).saturating_add(length as u64) > self.capacity {
            debug!("emulated tape is out of space");
            self.flags.end_of_medium = true;
            return Ok(0);
        }

        self.records.truncate(self.position);

        let source = &buf[region];

        if self.block_size == VARIABLE_BLOCK_SIZE {
            self.records.push(Record::Block(source.to_vec()));
        } else {
            for block in source.chunks(self.block_size as usize) {
                self.records.push(Record::Block(block.to_vec()));
            }
        }

        self.position = self.records.len();

        Ok(length)
    }

    fn rewind(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.position = 0;

        Ok(())
    }

    fn space_to_end_of_data(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.position = self.records.len();

        Ok(())
    }

    fn block_size(&mut self) -> Result<u32, DeviceError> {
        self.ensure_open()?;

        Ok(self.block_size)
    }

    fn set_block_size(&mut self, size: u32) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.block_size = size;

        Ok(())
    }

    fn write_filemarks(&mut self, count: u32) -> Result<(), DeviceError> {
        self.ensure_open()?;

        self.records.truncate(self.position);
        for _ in 0..count {
            self.records.push(Record::Filemark);
        }
        self.position = self.records.len();

        Ok(())
    }

    fn flags(&self) -> TapeFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut TapeFlags {
        &mut self.flags
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use crate::tape::{DeviceError, TapeDevice};
    use crate::tape::emulated::EmulatedTapeDevice;

    fn opened(capacity: u64) -> EmulatedTapeDevice {
        let mut device = EmulatedTapeDevice::with_capacity(capacity);

        device.open("/dev/nst0".as_ref()).unwrap();
        device
    }

    #[test]
    fn write_close_reopen_rewind_read() {
        let mut device = opened(1024 * 1024);
        let data = vec![0; 1024];

        assert_eq!(device.write(&data, 0, 1024).unwrap(), 1024);
        device.close().unwrap();

        device.open("/dev/nst0".as_ref()).unwrap();
        device.rewind().unwrap();

        let mut readback = vec![0xFF; 1024];
        assert_eq!(device.read(&mut readback, 0, 1024).unwrap(), 1024);
        assert_eq!(readback, data);
        assert!(!device.end_of_data());
        assert!(!device.end_of_medium());
    }

    #[test]
    fn block_boundaries_survive_round_trip() {
        let mut rng = rand::thread_rng();
        let mut device = opened(1024 * 1024);
        let mut blocks = Vec::new();

        for _ in 0..4 {
            let block : Vec<u8> = (0..512).map(|_| rng.gen()).collect();

            assert_eq!(device.write(&block, 0, 512).unwrap(), 512);
            blocks.push(block);
        }

        device.rewind().unwrap();

        let mut buf = vec![0; 2048];
        for block in blocks.iter() {
            assert_eq!(device.read(&mut buf, 0, 2048).unwrap(), 512);
            assert_eq!(&buf[..512], block.as_slice());
        }

        assert_eq!(device.read(&mut buf, 0, 2048).unwrap(), 0);
        assert!(device.end_of_data());
    }

    #[test]
    fn block_size_round_trip() {
        let mut device = opened(1024 * 1024);

        assert_eq!(device.block_size().unwrap(), 0);
        device.set_block_size(4096).unwrap();
        assert_eq!(device.block_size().unwrap(), 4096);
        device.set_block_size(0).unwrap();
        assert_eq!(device.block_size().unwrap(), 0);
    }

    #[test]
    fn fixed_mode_requires_whole_blocks() {
        let mut device = opened(1024 * 1024);
        let data = vec![3; 6000];

        device.set_block_size(1024).unwrap();

        match device.write(&data, 0, 1000) {
            Err(DeviceError::InvalidArgument(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }

        assert_eq!(device.write(&data, 0, 4096).unwrap(), 4096);
        assert_eq!(device.record_count(), 4);

        device.rewind().unwrap();

        let mut buf = vec![0; 6144];
        assert_eq!(device.read(&mut buf, 0, 6144).unwrap(), 4096);
        assert!(!device.end_of_data());
    }

    #[test]
    fn end_of_medium_is_not_an_error() {
        let mut device = opened(2048);
        let data = vec![9; 1024];

        assert_eq!(device.write(&data, 0, 1024).unwrap(), 1024);
        assert_eq!(device.write(&data, 0, 1024).unwrap(), 1024);
        assert!(!device.end_of_medium());

        assert_eq!(device.write(&data, 0, 1024).unwrap(), 0);
        assert!(device.end_of_medium());
        assert_eq!(device.used(), 2048);
    }

    #[test]
    fn filemark_ends_data_once() {
        let mut device = opened(1024 * 1024);

        device.write(&[1; 64], 0, 64).unwrap();
        device.write_filemark().unwrap();
        device.write(&[2; 64], 0, 64).unwrap();
        device.rewind().unwrap();

        let mut buf = vec![0; 128];
        assert_eq!(device.read(&mut buf, 0, 128).unwrap(), 64);
        assert_eq!(device.read(&mut buf, 0, 128).unwrap(), 0);
        assert!(device.end_of_data());

        //The filemark has been skipped; reading resumes with the next file.
        device.clear_end_of_data();
        assert_eq!(device.read(&mut buf, 0, 128).unwrap(), 64);
        assert_eq!(&buf[..64], &[2; 64][..]);
    }

    #[test]
    fn filemarks_are_written_in_one_call() {
        let mut device = opened(1024 * 1024);

        device.write(&[1; 64], 0, 64).unwrap();
        device.write_filemarks(3).unwrap();
        device.write(&[2; 64], 0, 64).unwrap();
        assert_eq!(device.record_count(), 5);
        device.rewind().unwrap();

        let mut buf = vec![0; 128];
        assert_eq!(device.read(&mut buf, 0, 128).unwrap(), 64);

        for _ in 0..3 {
            assert_eq!(device.read(&mut buf, 0, 128).unwrap(), 0);
            assert!(device.end_of_data());
            device.clear_end_of_data();
        }

        assert_eq!(device.read(&mut buf, 0, 128).unwrap(), 64);
        assert_eq!(&buf[..64], &[2; 64][..]);
    }

    #[test]
    fn end_of_data_stays_latched() {
        let mut device = opened(1024 * 1024);

        device.write(&[5; 32], 0, 32).unwrap();
        device.write_filemark().unwrap();
        device.rewind().unwrap();

        let mut buf = vec![0; 32];
        device.read(&mut buf, 0, 32).unwrap();

        for _ in 0..3 {
            assert_eq!(device.read(&mut buf, 0, 32).unwrap(), 0);
            assert!(device.end_of_data());
        }
    }

    #[test]
    fn space_to_end_appends() {
        let mut device = opened(1024 * 1024);

        device.write(&[1; 16], 0, 16).unwrap();
        device.rewind().unwrap();
        device.space_to_end_of_data().unwrap();
        device.write(&[2; 16], 0, 16).unwrap();

        assert_eq!(device.record_count(), 2);
    }

    #[test]
    fn overwrite_truncates_following_records() {
        let mut device = opened(1024 * 1024);

        device.write(&[1; 16], 0, 16).unwrap();
        device.write(&[2; 16], 0, 16).unwrap();
        device.rewind().unwrap();
        device.write(&[3; 8], 0, 8).unwrap();

        assert_eq!(device.record_count(), 1);
        assert_eq!(device.used(), 8);
    }

    #[test]
    fn short_buffer_truncates_variable_block() {
        let mut device = opened(1024 * 1024);

        device.write(&[1; 100], 0, 100).unwrap();
        device.write(&[2; 100], 0, 100).unwrap();
        device.rewind().unwrap();

        let mut buf = vec![0; 10];
        assert_eq!(device.read(&mut buf, 0, 10).unwrap(), 10);
        assert_eq!(device.read(&mut buf, 0, 10).unwrap(), 10);
        assert_eq!(buf, vec![2; 10]);
    }

    #[test]
    fn closed_device_refuses_io() {
        let mut device = EmulatedTapeDevice::new();
        let mut buf = vec![0; 16];

        assert!(match device.read(&mut buf, 0, 16) { Err(DeviceError::NotOpen) => true, _ => false });
        assert!(match device.write(&buf, 0, 16) { Err(DeviceError::NotOpen) => true, _ => false });
        assert!(match device.close() { Err(DeviceError::NotOpen) => true, _ => false });
    }

    #[test]
    fn refused_write_keeps_following_records() {
        let mut device = opened(2048);

        device.write(&[1; 1024], 0, 1024).unwrap();
        device.write(&[2; 1024], 0, 1024).unwrap();
        device.rewind().unwrap();

        assert_eq!(device.write(&[3; 3000], 0, 3000).unwrap(), 0);
        assert!(device.end_of_medium());
        assert_eq!(device.record_count(), 2);
        assert_eq!(device.used(), 2048);

        let mut buf = vec![0; 1024];
        assert_eq!(device.read(&mut buf, 0, 1024).unwrap(), 1024);
        assert_eq!(buf, vec![1; 1024]);
    }

    #[test]
    fn overwrite_reuses_space_after_position() {
        let mut device = opened(2048);

        device.write(&[1; 1024], 0, 1024).unwrap();
        device.write(&[2; 1024], 0, 1024).unwrap();
        device.rewind().unwrap();

        assert_eq!(device.write(&[3; 2048], 0, 2048).unwrap(), 2048);
        assert!(!device.end_of_medium());
        assert_eq!(device.record_count(), 1);
    }
}
