//! Stream-level access to a tape device.
//!
//! [`TapeDrive`] owns one open [`TapeDevice`] and lends out `io::Read` and
//! `io::Write` adapters for it, so a tape can be fed to anything that speaks
//! `std::io` (`io::copy`, [`BlockingWriter`], [`stream`]).
//!
//! [`BlockingWriter`]: crate::blocking::BlockingWriter
//! [`stream`]: crate::stream::stream

use std::{ffi, fmt, io};
use pad::PadStr;
use crate::tape::{DeviceError, TapeDevice, TapeFlags, VARIABLE_BLOCK_SIZE};

pub struct TapeDrive<D: TapeDevice> {
    device: D,

    /// The caller acknowledged the end-of-medium warning and wants to keep
    /// writing regardless.
    ignore_end_of_medium: bool,
}

impl<D: TapeDevice> TapeDrive<D> {
    /// Wrap an already open device.
    pub fn new(device: D) -> Result<TapeDrive<D>, DeviceError> {
        if !device.is_open() {
            return Err(DeviceError::NotOpen);
        }

        Ok(TapeDrive {
            device: device,
            ignore_end_of_medium: false,
        })
    }

    /// Open `device` on `path` and wrap it.
    pub fn open<P: AsRef<ffi::OsStr>>(mut device: D, path: P) -> Result<TapeDrive<D>, DeviceError> {
        device.open(path.as_ref())?;

        TapeDrive::new(device)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    /// Read from the tape as a byte stream. End of data reads as end of file.
    pub fn reader(&mut self) -> TapeReader<D> {
        TapeReader { drive: self }
    }

    /// Write to the tape as a byte stream.
    pub fn writer(&mut self) -> TapeWriter<D> {
        TapeWriter { drive: self }
    }

    pub fn block_size(&mut self) -> Result<u32, DeviceError> {
        self.device.block_size()
    }

    pub fn set_block_size(&mut self, size: u32) -> Result<(), DeviceError> {
        self.device.set_block_size(size)
    }

    pub fn rewind(&mut self) -> Result<(), DeviceError> {
        self.device.rewind()
    }

    pub fn space_to_end_of_data(&mut self) -> Result<(), DeviceError> {
        self.device.space_to_end_of_data()
    }

    pub fn write_filemark(&mut self) -> Result<(), DeviceError> {
        self.device.write_filemark()
    }

    pub fn write_filemarks(&mut self, count: u32) -> Result<(), DeviceError> {
        self.device.write_filemarks(count)
    }

    pub fn end_of_data(&self) -> bool {
        self.device.end_of_data()
    }

    pub fn end_of_medium(&self) -> bool {
        self.device.end_of_medium()
    }

    pub fn status(&mut self) -> Result<Status, DeviceError> {
        Ok(Status {
            block_size: self.device.block_size()?,
            flags: self.device.flags(),
        })
    }

    /// Resume reading after a filemark.
    ///
    /// The filemark is assumed to have been skipped by the read that hit it,
    /// so the next read starts on the following file.
    pub fn clear_end_of_data(&mut self) -> Result<(), DeviceError> {
        if !self.device.end_of_data() {
            return Err(DeviceError::NotAtEndOfData);
        }

        self.device.clear_end_of_data();

        Ok(())
    }

    /// Acknowledge the end-of-medium warning so further writes are attempted.
    pub fn clear_end_of_medium(&mut self) -> Result<(), DeviceError> {
        if !self.device.end_of_medium() {
            return Err(DeviceError::NotAtEndOfMedium);
        }

        self.ignore_end_of_medium = true;

        Ok(())
    }

    pub fn close(mut self) -> Result<D, DeviceError> {
        self.device.close()?;

        Ok(self.device)
    }
}

/// A snapshot of a drive's block size and latched conditions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub block_size: u32,
    pub flags: TapeFlags,
}

const STATUS_LABEL_WIDTH : usize = 16;

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.block_size == VARIABLE_BLOCK_SIZE {
            writeln!(f, "{}variable", "Block size:".pad_to_width(STATUS_LABEL_WIDTH))?;
        } else {
            writeln!(f, "{}{}", "Block size:".pad_to_width(STATUS_LABEL_WIDTH), self.block_size)?;
        }

        writeln!(f, "{}{}", "End of data:".pad_to_width(STATUS_LABEL_WIDTH), yes_no(self.flags.end_of_data))?;
        write!(f, "{}{}", "End of medium:".pad_to_width(STATUS_LABEL_WIDTH), yes_no(self.flags.end_of_medium))
    }
}

pub struct TapeReader<'a, D: TapeDevice> {
    drive: &'a mut TapeDrive<D>,
}

impl<'a, D: TapeDevice> io::Read for TapeReader<'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.drive.device.end_of_data() {
            return Ok(0);
        }

        let length = buf.len();

        Ok(self.drive.device.read(buf, 0, length)?)
    }
}

pub struct TapeWriter<'a, D: TapeDevice> {
    drive: &'a mut TapeDrive<D>,
}

impl<'a, D: TapeDevice> io::Write for TapeWriter<'a, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.drive.device.end_of_medium() && !self.drive.ignore_end_of_medium {
            return Err(DeviceError::LogicalEndOfMedium.into());
        }

        let length = buf.len();

        Ok(self.drive.device.write(buf, 0, length)?)
    }

    /// Tape drives flush their own buffers when a filemark is written; there
    /// is nothing to do here.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
