//! Abstraction layer for platform-specific magnetic tape behaviors.
//!
//! Each supported platform family gets one backend implementing
//! [`TapeDevice`]. The backend for the platform being built is exported as
//! [`NativeTapeDevice`]; there is no runtime dispatch between backends.

use std::ffi;
use std::ops::Range;

pub mod error;
pub mod emulated;

#[cfg(target_os = "linux")]
pub mod mtio;

#[cfg(target_os = "linux")]
pub mod unix;

#[cfg(windows)]
pub mod windows;

pub use self::error::{DeviceError, NativeError};

#[cfg(target_os = "linux")]
pub use self::unix::UnixTapeDevice as NativeTapeDevice;

#[cfg(windows)]
pub use self::windows::WindowsTapeDevice as NativeTapeDevice;

/// Block size value requesting variable-length blocks.
pub const VARIABLE_BLOCK_SIZE: u32 = 0;

/// The latched end conditions of a tape device.
///
/// Both flags are advisory. Once set they stay set until the caller clears
/// them; no device operation ever clears them on its own.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TapeFlags {
    /// A read hit a filemark or blank tape and returned no data.
    pub end_of_data: bool,

    /// A write could not proceed because the medium is full.
    pub end_of_medium: bool,
}

pub trait TapeDevice {
    /// Bind this device to the tape drive at `path`.
    ///
    /// Fails with `AlreadyOpen` if the device is still bound to a drive.
    fn open(&mut self, path: &ffi::OsStr) -> Result<(), DeviceError>;

    /// Release the drive.
    ///
    /// The device is closed afterwards even if releasing the native handle
    /// reported an error.
    fn close(&mut self) -> Result<(), DeviceError>;

    fn is_open(&self) -> bool;

    /// Read up to `length` bytes into `buf[offset..offset + length]`.
    ///
    /// Tape reads are block oriented: a short count is normal at a block or
    /// filemark boundary. A return of 0 with a nonzero `length` means a
    /// filemark or blank tape was reached and `end_of_data` is now latched.
    fn read(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<usize, DeviceError>;

    /// Write `length` bytes from `buf[offset..offset + length]`.
    ///
    /// If the medium runs out of space, `end_of_medium` is latched and the
    /// number of bytes which did make it to tape (possibly 0) is returned.
    fn write(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<usize, DeviceError>;

    /// Reposition to the beginning of the tape.
    fn rewind(&mut self) -> Result<(), DeviceError>;

    /// Advance to just past the last recorded data, ready for appending.
    fn space_to_end_of_data(&mut self) -> Result<(), DeviceError>;

    /// Query the drive's current fixed block size. 0 means variable blocks.
    ///
    /// The value is never cached; every call asks the drive.
    fn block_size(&mut self) -> Result<u32, DeviceError>;

    /// Change the fixed block size used for subsequent transfers.
    fn set_block_size(&mut self, size: u32) -> Result<(), DeviceError>;

    /// Write `count` filemarks at the current position.
    fn write_filemarks(&mut self, count: u32) -> Result<(), DeviceError>;

    /// Write a single filemark at the current position.
    fn write_filemark(&mut self) -> Result<(), DeviceError> {
        self.write_filemarks(1)
    }

    fn flags(&self) -> TapeFlags;

    fn flags_mut(&mut self) -> &mut TapeFlags;

    fn end_of_data(&self) -> bool {
        self.flags().end_of_data
    }

    fn end_of_medium(&self) -> bool {
        self.flags().end_of_medium
    }

    fn clear_end_of_data(&mut self) {
        self.flags_mut().end_of_data = false;
    }

    fn clear_end_of_medium(&mut self) {
        self.flags_mut().end_of_medium = false;
    }
}

impl<T: TapeDevice + ?Sized> TapeDevice for Box<T> {
    fn open(&mut self, path: &ffi::OsStr) -> Result<(), DeviceError> {
        (**self).open(path)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        (**self).read(buf, offset, length)
    }

    fn write(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        (**self).write(buf, offset, length)
    }

    fn rewind(&mut self) -> Result<(), DeviceError> {
        (**self).rewind()
    }

    fn space_to_end_of_data(&mut self) -> Result<(), DeviceError> {
        (**self).space_to_end_of_data()
    }

    fn block_size(&mut self) -> Result<u32, DeviceError> {
        (**self).block_size()
    }

    fn set_block_size(&mut self, size: u32) -> Result<(), DeviceError> {
        (**self).set_block_size(size)
    }

    fn write_filemarks(&mut self, count: u32) -> Result<(), DeviceError> {
        (**self).write_filemarks(count)
    }

    fn flags(&self) -> TapeFlags {
        (**self).flags()
    }

    fn flags_mut(&mut self) -> &mut TapeFlags {
        (**self).flags_mut()
    }
}

/// Validate a caller-supplied buffer region.
///
/// Backends call this before touching the native layer, so an oversized
/// region never reaches the OS.
pub fn check_region(capacity: usize, offset: usize, length: usize) -> Result<Range<usize>, DeviceError> {
    match offset.checked_add(length) {
        Some(end) if end <= capacity => Ok(offset..end),
        _ => Err(DeviceError::OutOfBounds {
            offset: offset,
            length: length,
            capacity: capacity,
        }),
    }
}

/// Open the tape drive at `path` with this platform's backend.
#[cfg(any(target_os = "linux", windows))]
pub fn open_tape<P: AsRef<ffi::OsStr>>(path: P) -> Result<NativeTapeDevice, DeviceError> {
    let mut device = NativeTapeDevice::new();

    device.open(path.as_ref())?;

    Ok(device)
}
