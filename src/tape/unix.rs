//! Unix tape device impls
//!
//! Drives the Linux SCSI tape driver (`/dev/st*`, `/dev/nst*`) through plain
//! descriptor I/O plus the `MTIOCTOP` and `MTIOCGET` ioctls.

use std::{ffi, fs};
use std::os::unix::io::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use libc::c_int;
use nix::errno::Errno;
use log::debug;
use crate::tape::{check_region, DeviceError, NativeError, TapeDevice, TapeFlags};
use crate::tape::mtio;

pub struct UnixTapeDevice {
    tape_device: Option<OwnedFd>,
    flags: TapeFlags,
}

/// Translate a failed system call into the shared error taxonomy.
fn native_error(operation: &'static str, errno: Errno) -> DeviceError {
    DeviceError::Native(NativeError::new(operation, errno as i32, errno.desc()))
}

impl UnixTapeDevice {
    /// Construct a closed tape device.
    pub fn new() -> UnixTapeDevice {
        UnixTapeDevice {
            tape_device: None,
            flags: TapeFlags::default(),
        }
    }

    /// Open a tape device by it's device node path.
    pub fn open_device(unix_device_path: &ffi::OsStr) -> Result<UnixTapeDevice, DeviceError> {
        let mut device = UnixTapeDevice::new();

        device.open(unix_device_path)?;

        Ok(device)
    }

    /// Construct a tape device directly from a file descriptor.
    ///
    /// This is an unsafe function. `unix_fd` must be an open descriptor for a
    /// tape device that nothing else will close; the device takes ownership
    /// of it.
    pub unsafe fn from_file_descriptor(unix_fd: RawFd) -> UnixTapeDevice {
        use std::os::unix::io::FromRawFd;

        UnixTapeDevice {
            tape_device: Some(OwnedFd::from_raw_fd(unix_fd)),
            flags: TapeFlags::default(),
        }
    }

    fn raw_fd(&self) -> Result<RawFd, DeviceError> {
        match self.tape_device {
            Some(ref fd) => Ok(fd.as_raw_fd()),
            None => Err(DeviceError::NotOpen),
        }
    }

    /// Issue a single `MTIOCTOP` command.
    fn tape_op(&mut self, operation: &'static str, op: mtio::MTCmd, count: c_int) -> Result<(), DeviceError> {
        let fd = self.raw_fd()?;
        let request = mtio::mtop {
            mt_op: op,
            mt_count: count,
        };

        unsafe { mtio::mtioctop(fd, &request) }.map_err(|errno| native_error(operation, errno))?;

        Ok(())
    }
}

impl Default for UnixTapeDevice {
    fn default() -> UnixTapeDevice {
        UnixTapeDevice::new()
    }
}

impl TapeDevice for UnixTapeDevice {
    fn open(&mut self, path: &ffi::OsStr) -> Result<(), DeviceError> {
        if self.tape_device.is_some() {
            return Err(DeviceError::AlreadyOpen);
        }

        let file = fs::OpenOptions::new().read(true).write(true).open(path)
            .map_err(|e| DeviceError::Native(NativeError::from_io("open", &e)))?;

        debug!("opened tape device {:?}", path);
        self.tape_device = Some(OwnedFd::from(file));

        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let fd = self.tape_device.take().ok_or(DeviceError::NotOpen)?;
        let raw = fd.into_raw_fd();

        debug!("closing tape device descriptor {}", raw);

        //Closing a tape descriptor is where the driver writes any pending
        //filemark, so unlike `OwnedFd`'s drop we have to see the result.
        if unsafe { libc::close(raw) } == -1 {
            return Err(native_error("close", Errno::last()));
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.tape_device.is_some()
    }

    fn read(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        let region = check_region(buf.len(), offset, length)?;
        let fd = self.raw_fd()?;
        let target = &mut buf[region];

        let count = unsafe { libc::read(fd, target.as_mut_ptr() as *mut libc::c_void, target.len()) };
        if count < 0 {
            return Err(native_error("read", Errno::last()));
        }

        if count == 0 && length > 0 {
            debug!("tape read hit end of data");
            self.flags.end_of_data = true;
        }

        Ok(count as usize)
    }

    fn write(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        let region = check_region(buf.len(), offset, length)?;
        let fd = self.raw_fd()?;
        let source = &buf[region];

        let count = unsafe { libc::write(fd, source.as_ptr() as *const libc::c_void, source.len()) };
        if count < 0 {
            return Err(native_error("write", Errno::last()));
        }

        if count == 0 && length > 0 {
            debug!("tape write hit end of medium");
            self.flags.end_of_medium = true;
        }

        Ok(count as usize)
    }

    fn rewind(&mut self) -> Result<(), DeviceError> {
        self.tape_op("rewind", mtio::MTCmd::MTREW, 1)
    }

    fn space_to_end_of_data(&mut self) -> Result<(), DeviceError> {
        self.tape_op("space to end of data", mtio::MTCmd::MTEOM, 1)
    }

    fn block_size(&mut self) -> Result<u32, DeviceError> {
        let fd = self.raw_fd()?;
        let mut status = mtio::mtget::default();

        unsafe { mtio::mtiocget(fd, &mut status) }.map_err(|errno| native_error("get block size", errno))?;

        Ok(mtio::block_size_from_dsreg(status.mt_dsreg))
    }

    fn set_block_size(&mut self, size: u32) -> Result<(), DeviceError> {
        if size as libc::c_long > mtio::MT_ST_BLKSIZE_MASK {
            return Err(DeviceError::InvalidArgument(format!("block size {} exceeds the driver maximum of {}", size, mtio::MT_ST_BLKSIZE_MASK)));
        }

        self.tape_op("set block size", mtio::MTCmd::MTSETBLK, size as c_int)
    }

    fn write_filemarks(&mut self, count: u32) -> Result<(), DeviceError> {
        if count > c_int::max_value() as u32 {
            return Err(DeviceError::InvalidArgument(format!("cannot write {} filemarks at once", count)));
        }

        self.tape_op("write filemark", mtio::MTCmd::MTWEOF, count as c_int)
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
    use std::io::Write;
    use tempfile::NamedTempFile;
    use crate::tape::{DeviceError, TapeDevice};
    use crate::tape::unix::UnixTapeDevice;

    //Regular files stand in for a tape node: plain reads and writes behave
    //like a tape, and every tape ioctl is refused with ENOTTY.

    #[test]
    fn open_missing_device_fails() {
        let mut device = UnixTapeDevice::new();
        let err = device.open("/dev/this-tape-does-not-exist".as_ref()).unwrap_err();

        match err {
            DeviceError::Native(ref native) => {
                assert_eq!(native.code(), libc::ENOENT);
                assert_eq!(native.operation(), "open");
            },
            other => panic!("unexpected error {:?}", other),
        }

        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(!device.is_open());
    }

    #[test]
    fn open_close_reopen() {
        let scratch = NamedTempFile::new().unwrap();
        let mut device = UnixTapeDevice::new();

        device.open(scratch.path().as_os_str()).unwrap();
        assert!(device.is_open());
        device.close().unwrap();
        assert!(!device.is_open());

        device.open(scratch.path().as_os_str()).unwrap();
        device.close().unwrap();
    }

    #[test]
    fn open_twice_is_rejected() {
        let scratch = NamedTempFile::new().unwrap();
        let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();

        match device.open(scratch.path().as_os_str()) {
            Err(DeviceError::AlreadyOpen) => {},
            other => panic!("unexpected result {:?}", other),
        }

        assert!(device.is_open());
    }

    #[test]
    fn close_when_closed_is_reported() {
        let mut device = UnixTapeDevice::new();

        match device.close() {
            Err(DeviceError::NotOpen) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn dropping_open_device_releases_it() {
        let scratch = NamedTempFile::new().unwrap();
        let data = vec![7; 512];

        {
            let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();
            assert_eq!(device.write(&data, 0, 512).unwrap(), 512);
        }

        let mut device = UnixTapeDevice::new();
        device.open(scratch.path().as_os_str()).unwrap();

        let mut buf = vec![0; 512];
        assert_eq!(device.read(&mut buf, 0, 512).unwrap(), 512);
        assert_eq!(buf, data);
        device.close().unwrap();
    }

    #[test]
    fn write_close_reopen_read() {
        let scratch = NamedTempFile::new().unwrap();
        let data = vec![0; 1024];
        let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();

        assert_eq!(device.write(&data, 0, 1024).unwrap(), 1024);
        device.close().unwrap();

        device.open(scratch.path().as_os_str()).unwrap();

        let mut readback = vec![0xFF; 1024];
        assert_eq!(device.read(&mut readback, 0, 1024).unwrap(), 1024);
        assert_eq!(readback, data);
        assert!(!device.end_of_data());
        assert!(!device.end_of_medium());
    }

    #[test]
    fn read_honors_offset() {
        let mut scratch = NamedTempFile::new().unwrap();
        scratch.write_all(&[1, 2, 3, 4]).unwrap();

        let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();
        let mut buf = vec![0; 8];

        assert_eq!(device.read(&mut buf, 2, 4).unwrap(), 4);
        assert_eq!(buf, vec![0, 0, 1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn end_of_data_is_latched() {
        let mut scratch = NamedTempFile::new().unwrap();
        scratch.write_all(&[7; 100]).unwrap();

        let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();
        let mut buf = vec![0; 512];

        assert_eq!(device.read(&mut buf, 0, 512).unwrap(), 100);
        assert!(!device.end_of_data());

        for _ in 0..3 {
            assert_eq!(device.read(&mut buf, 0, 512).unwrap(), 0);
            assert!(device.end_of_data());
        }

        device.clear_end_of_data();
        assert!(!device.end_of_data());
    }

    #[test]
    fn oversized_region_rejected_before_native_call() {
        //A closed device would fail with NotOpen if the native layer was
        //consulted first.
        let mut device = UnixTapeDevice::new();
        let mut buf = vec![0; 16];

        match device.read(&mut buf, 8, 16) {
            Err(DeviceError::OutOfBounds { .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }

        match device.write(&buf, 17, 0) {
            Err(DeviceError::OutOfBounds { .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn control_operations_on_closed_device() {
        let mut device = UnixTapeDevice::new();

        assert!(match device.rewind() { Err(DeviceError::NotOpen) => true, _ => false });
        assert!(match device.space_to_end_of_data() { Err(DeviceError::NotOpen) => true, _ => false });
        assert!(match device.block_size() { Err(DeviceError::NotOpen) => true, _ => false });
        assert!(match device.write_filemark() { Err(DeviceError::NotOpen) => true, _ => false });
    }

    #[test]
    fn tape_ioctls_fail_on_non_tape() {
        let scratch = NamedTempFile::new().unwrap();
        let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();

        for result in vec![device.rewind(), device.space_to_end_of_data(), device.set_block_size(4096), device.write_filemark(), device.write_filemarks(3)] {
            match result {
                Err(DeviceError::Native(native)) => assert_eq!(native.code(), libc::ENOTTY),
                other => panic!("unexpected result {:?}", other),
            }
        }

        match device.block_size() {
            Err(DeviceError::Native(native)) => {
                assert_eq!(native.code(), libc::ENOTTY);
                assert_eq!(native.operation(), "get block size");
            },
            other => panic!("unexpected result {:?}", other),
        }

        assert!(device.is_open());
    }

    #[test]
    fn block_size_above_driver_limit_rejected() {
        let scratch = NamedTempFile::new().unwrap();
        let mut device = UnixTapeDevice::open_device(scratch.path().as_os_str()).unwrap();

        match device.set_block_size(0x100_0000) {
            Err(DeviceError::InvalidArgument(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }
}
