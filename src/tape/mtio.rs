//! Linux magnetic tape driver ioctl definitions
//!
//! Mirrors `<sys/mtio.h>`; also see st(4).

use libc::{c_int, c_long};

/// Tape operation codes for `MTIOCTOP`.
#[repr(i16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MTCmd {
    /// Write `mt_count` filemarks.
    MTWEOF = 5,
    /// Rewind.
    MTREW = 6,
    /// Go to the end of recorded media, positioned after the last filemark.
    MTEOM = 12,
    /// Set the block length; 0 selects variable blocks.
    MTSETBLK = 20,
}

#[repr(C)]
#[allow(non_camel_case_types)]
pub struct mtop {
    pub mt_op: MTCmd,
    pub mt_count: c_int,
}

//#define MTIOCTOP _IOW('m', 1, struct mtop)
nix::ioctl_write_ptr!(mtioctop, b'm', 1, mtop);

#[repr(C)]
#[derive(Default, Debug)]
#[allow(non_camel_case_types)]
pub struct mtget {
    pub mt_type: c_long,
    pub mt_resid: c_long,
    /// Device dependent status register; holds the block size and density.
    pub mt_dsreg: c_long,
    pub mt_gstat: c_long,
    pub mt_erreg: c_long,
    pub mt_fileno: i32,
    pub mt_blkno: i32,
}

//#define MTIOCGET _IOR('m', 2, struct mtget)
nix::ioctl_read!(mtiocget, b'm', 2, mtget);

pub const MT_ST_BLKSIZE_MASK: c_long = 0x0ff_ffff;

/// Extract the block size subfield out of a status register value.
pub fn block_size_from_dsreg(dsreg: c_long) -> u32 {
    (dsreg & MT_ST_BLKSIZE_MASK) as u32
}
