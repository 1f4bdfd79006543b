//! Error taxonomy shared by every tape backend.

use std::{fmt, io};

/// A failure reported by the operating system's tape interface.
///
/// `code` is the raw platform value (`errno` on POSIX, a Win32 error code on
/// Windows) and is only there for diagnostics. The message is already human
/// readable and `kind` classifies the failure without needing the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    operation: &'static str,
    code: i32,
    message: String,
}

impl NativeError {
    pub fn new<M: Into<String>>(operation: &'static str, code: i32, message: M) -> NativeError {
        NativeError {
            operation: operation,
            code: code,
            message: message.into(),
        }
    }

    /// Build a native error out of a failed `std` I/O call.
    pub fn from_io(operation: &'static str, err: &io::Error) -> NativeError {
        NativeError {
            operation: operation,
            code: err.raw_os_error().unwrap_or(0),
            message: strip_os_suffix(err.to_string()),
        }
    }

    /// The device operation that failed (`open`, `read`, `rewind`...).
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify the failure in platform-independent terms.
    pub fn kind(&self) -> io::ErrorKind {
        io::Error::from_raw_os_error(self.code).kind()
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tape {} failed: {}", self.operation, self.message)
    }
}

/// `io::Error` appends " (os error N)" to OS errors; the code is carried
/// separately so the message stays free of it.
fn strip_os_suffix(message: String) -> String {
    match message.rfind(" (os error ") {
        Some(pos) if message.ends_with(')') => message[..pos].to_string(),
        _ => message,
    }
}

/// Everything a tape device operation can fail with.
///
/// The two expected end conditions of sequential tape access (end of data on
/// read, end of medium on write) are *not* errors; they are reported through
/// the device's latched flags instead.
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("{0}")]
    Native(NativeError),

    #[error("tape device is not open")]
    NotOpen,

    #[error("tape device is already open")]
    AlreadyOpen,

    #[error("region of {length} bytes at offset {offset} does not fit in a buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("logical end-of-media")]
    LogicalEndOfMedium,

    #[error("not at end of file")]
    NotAtEndOfData,

    #[error("not at logical end of media")]
    NotAtEndOfMedium,
}

impl DeviceError {
    /// The raw platform code behind this error, if it came from the OS.
    pub fn code(&self) -> Option<i32> {
        match self {
            DeviceError::Native(native) => Some(native.code()),
            _ => None,
        }
    }

    /// Platform-independent classification of the failure.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            DeviceError::Native(native) => native.kind(),
            DeviceError::NotOpen => io::ErrorKind::NotConnected,
            DeviceError::AlreadyOpen => io::ErrorKind::AlreadyExists,
            DeviceError::OutOfBounds { .. } => io::ErrorKind::InvalidInput,
            DeviceError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            DeviceError::LogicalEndOfMedium => io::ErrorKind::WriteZero,
            DeviceError::NotAtEndOfData => io::ErrorKind::Other,
            DeviceError::NotAtEndOfMedium => io::ErrorKind::Other,
        }
    }
}

impl From<NativeError> for DeviceError {
    fn from(native: NativeError) -> DeviceError {
        DeviceError::Native(native)
    }
}

impl From<DeviceError> for io::Error {
    fn from(err: DeviceError) -> io::Error {
        io::Error::new(err.kind(), err)
    }
}
