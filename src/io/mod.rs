//! Byte-level I/O fabric
//!
//! This module provides the abstract byte endpoints (sources and targets),
//! the sliced random-access reader, the append-only writer, bit-level
//! cursors, and the CRC kernels the container code is built on.

pub mod bitstream;
pub mod crc;
pub mod reader;
pub mod source;
pub mod writer;

pub use bitstream::{BitReader, BitWriter};
pub use reader::{FileSlice, Reader, StringEncoding};
pub use source::{Source, Target};
pub use writer::Writer;
