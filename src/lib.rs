extern crate rayon;
extern crate pad;
extern crate num;
extern crate rand;
extern crate thiserror;
extern crate log;
extern crate sha1;

#[cfg(unix)]
extern crate libc;

#[cfg(unix)]
extern crate nix;

#[cfg(windows)]
extern crate winapi;

/// Platform-specific tape device backends behind one contract.
pub mod tape;

/// Stream access to an open tape device.
pub mod drive;

/// Fixed-record buffering for tape writes.
pub mod blocking;

/// Overlapped stream copies.
pub mod stream;

pub mod result;
pub mod tuning;

/// User-input units and conversions therein.
pub mod units;
