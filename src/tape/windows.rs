//! Windows tape device impls
//!
//! Drives NT tape devices (`\\.\TAPE0`...) through the buffered file API plus
//! the Win32 tape API.

use std::{cmp, ffi, mem, ptr, slice};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use log::{debug, trace, warn};
use winapi::um::{errhandlingapi, fileapi, handleapi, winbase};
use winapi::shared::minwindef::{DWORD, FALSE, HLOCAL, LPCVOID, LPVOID};
use winapi::shared::winerror::{NO_ERROR, ERROR_END_OF_MEDIA, ERROR_EOM_OVERFLOW, ERROR_FILEMARK_DETECTED, ERROR_SETMARK_DETECTED, ERROR_NO_DATA_DETECTED};
use winapi::um::winnt::{WCHAR, HANDLE, LPWSTR, GENERIC_READ, GENERIC_WRITE, TAPE_REWIND, TAPE_SPACE_END_OF_DATA, TAPE_FILEMARKS, TAPE_GET_MEDIA_PARAMETERS, TAPE_SET_MEDIA_PARAMETERS, MAKELANGID, LANG_NEUTRAL, SUBLANG_DEFAULT};
use winapi::um::fileapi::OPEN_EXISTING;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use crate::tape::{check_region, DeviceError, NativeError, TapeDevice, TapeFlags};

/// `dwOperation` for `GetTapeParameters`/`SetTapeParameters` selecting the
/// media (as opposed to drive) parameter block.
const GET_TAPE_MEDIA_INFORMATION: DWORD = 0;
const SET_TAPE_MEDIA_INFORMATION: DWORD = 0;

/// What a failed `ReadFile`/`WriteFile` means for the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Disposition {
    EndOfData,
    EndOfMedium,
    Failure,
}

/// Classify a `ReadFile` failure.
fn classify_read_error(code: DWORD) -> Disposition {
    match code {
        ERROR_FILEMARK_DETECTED | ERROR_SETMARK_DETECTED | ERROR_END_OF_MEDIA | ERROR_NO_DATA_DETECTED => Disposition::EndOfData,
        _ => Disposition::Failure,
    }
}

/// Classify a `WriteFile` failure.
fn classify_write_error(code: DWORD) -> Disposition {
    match code {
        ERROR_END_OF_MEDIA | ERROR_EOM_OVERFLOW => Disposition::EndOfMedium,
        _ => Disposition::Failure,
    }
}

/// Ask the system for the text of a Win32 error code.
fn describe_error(code: DWORD) -> String {
    let mut msgbuf : LPWSTR = ptr::null_mut();
    let len = unsafe {
        winbase::FormatMessageW(
            winbase::FORMAT_MESSAGE_ALLOCATE_BUFFER | winbase::FORMAT_MESSAGE_FROM_SYSTEM | winbase::FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code,
            MAKELANGID(LANG_NEUTRAL, SUBLANG_DEFAULT) as DWORD,
            &mut msgbuf as *mut LPWSTR as LPWSTR,
            0,
            ptr::null_mut())
    };

    if len == 0 || msgbuf.is_null() {
        return format!("Unspecified NT tape device error {}", code);
    }

    let wide = unsafe { slice::from_raw_parts(msgbuf, len as usize) };
    let message = ffi::OsString::from_wide(wide).to_string_lossy().trim_end().to_string();

    unsafe { winbase::LocalFree(msgbuf as HLOCAL) };

    message
}

/// Translate a Win32 error code into the shared error taxonomy.
fn native_error(operation: &'static str, code: DWORD) -> DeviceError {
    DeviceError::Native(NativeError::new(operation, code as i32, describe_error(code)))
}

pub struct WindowsTapeDevice {
    tape_device: Option<HANDLE>,
    flags: TapeFlags,
}

/// Windows handles may be used from any thread; winapi just doesn't say so.
unsafe impl Send for WindowsTapeDevice {
}

impl WindowsTapeDevice {
    /// Construct a closed tape device.
    pub fn new() -> WindowsTapeDevice {
        WindowsTapeDevice {
            tape_device: None,
            flags: TapeFlags::default(),
        }
    }

    /// Open a tape device by it's number.
    pub fn open_tape_number(nt_tape_id: u32) -> Result<WindowsTapeDevice, DeviceError> {
        let filepath = format!("\\\\.\\TAPE{}", nt_tape_id);

        WindowsTapeDevice::open_device(&ffi::OsString::from(filepath))
    }

    /// Open a tape device by it's NT device path.
    pub fn open_device(nt_device_path: &ffi::OsStr) -> Result<WindowsTapeDevice, DeviceError> {
        let mut device = WindowsTapeDevice::new();

        device.open(nt_device_path)?;

        Ok(device)
    }

    /// Construct a tape device directly from an NT handle.
    ///
    /// This is an unsafe function. The nt_device handle must be a valid NT
    /// kernel handle that points to an open tape device, and the device takes
    /// ownership of it.
    pub unsafe fn from_device_handle(nt_device: HANDLE) -> WindowsTapeDevice {
        WindowsTapeDevice {
            tape_device: Some(nt_device),
            flags: TapeFlags::default(),
        }
    }

    fn handle(&self) -> Result<HANDLE, DeviceError> {
        self.tape_device.ok_or(DeviceError::NotOpen)
    }

    /// Move the tape with `SetTapePosition`.
    fn set_position(&mut self, operation: &'static str, method: DWORD) -> Result<(), DeviceError> {
        let handle = self.handle()?;

        let error = unsafe { winbase::SetTapePosition(handle, method, 0, 0, 0, FALSE) };
        if error != NO_ERROR {
            return Err(native_error(operation, error));
        }

        Ok(())
    }
}

impl Default for WindowsTapeDevice {
    fn default() -> WindowsTapeDevice {
        WindowsTapeDevice::new()
    }
}

impl Drop for WindowsTapeDevice {
    fn drop(&mut self) {
        if let Some(handle) = self.tape_device.take() {
            unsafe { handleapi::CloseHandle(handle) };
        }
    }
}

impl TapeDevice for WindowsTapeDevice {
    fn open(&mut self, path: &ffi::OsStr) -> Result<(), DeviceError> {
        if self.tape_device.is_some() {
            return Err(DeviceError::AlreadyOpen);
        }

        let mut nt_device_path_ffi : Vec<WCHAR> = path.encode_wide().collect();
        nt_device_path_ffi.push(0 as WCHAR);

        let nt_device = unsafe { fileapi::CreateFileW(nt_device_path_ffi.as_ptr(), GENERIC_READ | GENERIC_WRITE, 0, ptr::null_mut(), OPEN_EXISTING, 0, ptr::null_mut()) };

        if nt_device == INVALID_HANDLE_VALUE {
            return Err(native_error("open", unsafe { errhandlingapi::GetLastError() }));
        }

        //Check the tape status to clear informational errors such as
        //ERROR_MEDIA_CHANGED, which would otherwise fail the first real
        //operation.
        let status = unsafe { winbase::GetTapeStatus(nt_device) };
        trace!("discarded tape status {} after open", status);

        debug!("opened tape device {:?}", path);
        self.tape_device = Some(nt_device);

        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let handle = self.tape_device.take().ok_or(DeviceError::NotOpen)?;

        if unsafe { handleapi::CloseHandle(handle) } == 0 {
            let code = unsafe { errhandlingapi::GetLastError() };
            warn!("ignoring failure to close tape device: {}", describe_error(code));
        } else {
            debug!("closed tape device");
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.tape_device.is_some()
    }

    fn read(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        let region = check_region(buf.len(), offset, length)?;
        let handle = self.handle()?;
        let target = &mut buf[region];
        let mut read_count : DWORD = 0;

        let request = cmp::min(target.len(), DWORD::max_value() as usize) as DWORD;
        let success = unsafe { fileapi::ReadFile(handle, target.as_mut_ptr() as LPVOID, request, &mut read_count, ptr::null_mut()) };

        if success == 0 {
            let code = unsafe { errhandlingapi::GetLastError() };

            match classify_read_error(code) {
                Disposition::EndOfData => {
                    debug!("tape read hit end of data ({})", code);
                    self.flags.end_of_data = true;
                },
                _ => return Err(native_error("read", code)),
            }
        }

        Ok(read_count as usize)
    }

    fn write(&mut self, buf: &[u8], offset: usize, length: usize) -> Result<usize, DeviceError> {
        let region = check_region(buf.len(), offset, length)?;
        let handle = self.handle()?;
        let source = &buf[region];
        let mut write_count : DWORD = 0;

        let request = cmp::min(source.len(), DWORD::max_value() as usize) as DWORD;
        let success = unsafe { fileapi::WriteFile(handle, source.as_ptr() as LPCVOID, request, &mut write_count, ptr::null_mut()) };

        if success == 0 {
            let code = unsafe { errhandlingapi::GetLastError() };

            match classify_write_error(code) {
                Disposition::EndOfMedium => {
                    debug!("tape write hit end of medium ({})", code);
                    self.flags.end_of_medium = true;
                },
                _ => return Err(native_error("write", code)),
            }
        }

        Ok(write_count as usize)
    }

    fn rewind(&mut self) -> Result<(), DeviceError> {
        self.set_position("rewind", TAPE_REWIND)
    }

    fn space_to_end_of_data(&mut self) -> Result<(), DeviceError> {
        self.set_position("space to end of data", TAPE_SPACE_END_OF_DATA)
    }

    fn block_size(&mut self) -> Result<u32, DeviceError> {
        let handle = self.handle()?;
        let mut media_param : TAPE_GET_MEDIA_PARAMETERS = unsafe { mem::zeroed() };
        let mut size = mem::size_of::<TAPE_GET_MEDIA_PARAMETERS>() as DWORD;

        let error = unsafe { winbase::GetTapeParameters(handle, GET_TAPE_MEDIA_INFORMATION, &mut size, &mut media_param as *mut _ as LPVOID) };
        if error != NO_ERROR {
            return Err(native_error("get block size", error));
        }

        Ok(media_param.BlockSize)
    }

    fn set_block_size(&mut self, size: u32) -> Result<(), DeviceError> {
        let handle = self.handle()?;
        let mut media_param = TAPE_SET_MEDIA_PARAMETERS { BlockSize: size };

        let error = unsafe { winbase::SetTapeParameters(handle, SET_TAPE_MEDIA_INFORMATION, &mut media_param as *mut _ as LPVOID) };
        if error != NO_ERROR {
            return Err(native_error("set block size", error));
        }

        Ok(())
    }

    fn write_filemarks(&mut self, count: u32) -> Result<(), DeviceError> {
        let handle = self.handle()?;

        let error = unsafe { winbase::WriteTapemark(handle, TAPE_FILEMARKS, count, FALSE) };
        if error != NO_ERROR {
            return Err(native_error("write filemark", error));
        }

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
    use winapi::shared::winerror::{ERROR_END_OF_MEDIA, ERROR_EOM_OVERFLOW, ERROR_FILEMARK_DETECTED, ERROR_NO_DATA_DETECTED, ERROR_SETMARK_DETECTED, ERROR_CRC, ERROR_FILE_NOT_FOUND};
    use crate::tape::{DeviceError, TapeDevice};
    use crate::tape::windows::{classify_read_error, classify_write_error, describe_error, Disposition, WindowsTapeDevice};

    #[test]
    fn read_end_conditions() {
        assert_eq!(classify_read_error(ERROR_FILEMARK_DETECTED), Disposition::EndOfData);
        assert_eq!(classify_read_error(ERROR_SETMARK_DETECTED), Disposition::EndOfData);
        assert_eq!(classify_read_error(ERROR_END_OF_MEDIA), Disposition::EndOfData);
        assert_eq!(classify_read_error(ERROR_NO_DATA_DETECTED), Disposition::EndOfData);
        assert_eq!(classify_read_error(ERROR_CRC), Disposition::Failure);
    }

    #[test]
    fn write_end_conditions() {
        assert_eq!(classify_write_error(ERROR_END_OF_MEDIA), Disposition::EndOfMedium);
        assert_eq!(classify_write_error(ERROR_EOM_OVERFLOW), Disposition::EndOfMedium);
        assert_eq!(classify_write_error(ERROR_FILEMARK_DETECTED), Disposition::Failure);
    }

    #[test]
    fn error_text_is_human_readable() {
        let message = describe_error(ERROR_FILE_NOT_FOUND);

        assert!(!message.is_empty());
        assert!(!message.ends_with('\n'));
    }

    #[test]
    fn open_missing_device_fails() {
        let mut device = WindowsTapeDevice::new();

        match device.open("\\\\.\\TAPE4096".as_ref()) {
            Err(DeviceError::Native(native)) => assert_eq!(native.operation(), "open"),
            other => panic!("unexpected result {:?}", other),
        }

        assert!(!device.is_open());
    }
}
