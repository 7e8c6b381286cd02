
//! Decompress and compress the data sections of packfiles.
//! Supports the RFC-1950 zlib streams of v6 and v10 archives
//! and the lz4 frames of v17 archives.

use std::io::{ErrorKind, Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use crate::error::{Error, IoError, Result};


/// Inflate one zlib stream from the reader into an owned buffer.
/// Consumes the reader incrementally until the decoder signals the end of the
/// stream. Trailing input beyond the zlib stream is not an error.
pub fn decompress_zlib(read: &mut impl Read) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();

    let mut decoder = ZlibDecoder::new(read);
    decoder.read_to_end(&mut decompressed)
        .map_err(|error| map_decode_error(error, "zlib stream"))?;

    Ok(decompressed)
}

/// Deflate the bytes into a fresh zlib stream.
pub fn compress_zlib(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(bytes.len() / 2),
        flate2::Compression::default()
    );

    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decode one lz4 frame from the reader into an owned buffer.
/// The frame declares its own block size (64 KiB up to 4 MiB), which the
/// decoder uses to size its window. Stops at the frame's end marker.
pub fn decompress_lz4(read: &mut impl Read) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();

    let mut decoder = FrameDecoder::new(read);
    decoder.read_to_end(&mut decompressed)
        .map_err(|error| map_decode_error(error, "lz4 frame"))?;

    Ok(decompressed)
}

/// Encode the bytes into a fresh lz4 frame.
pub fn compress_lz4(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = FrameEncoder::new(Vec::with_capacity(bytes.len() / 2));
    encoder.write_all(bytes)?;

    encoder.finish()
        .map_err(|_| Error::invalid("lz4 frame"))
}

/// Corrupt compressed contents surface as parsing errors,
/// failures of the underlying reader as io errors.
fn map_decode_error(error: IoError, what: &'static str) -> Error {
    match error.kind() {
        ErrorKind::InvalidInput
        | ErrorKind::InvalidData
        | ErrorKind::UnexpectedEof
        | ErrorKind::Other => Error::invalid(what),
        ErrorKind::OutOfMemory => Error::Allocation,
        _ => Error::Io(error),
    }
}
