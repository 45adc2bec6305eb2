//! On-disk file format shared by the writer and reader.
//!
//! ```text
//! [DATA]   repeated: crc32(u32 LE) | key_len(u32 LE) | key | val_len(u32 LE) | value
//! [FOOTER] count(u64 LE) | magic(u32 LE) "WRM1"
//! ```
//!
//! Simplified from the donor's v3 SSTable layout: no bloom section (the
//! reader loads the whole file at open time, so a negative-lookup filter
//! buys nothing) and no per-record sequence number (ordering and dedup are
//! the caller's concern — row_id for the primary store, or the index's
//! ascending-scan write order for secondary stores).

pub const MAGIC: u32 = 0x5752_4D31; // "WRM1" read as a big-endian u32
pub const FOOTER_BYTES: u64 = 8 + 4;
