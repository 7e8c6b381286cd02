
//! Read and write the binary asset containers of the Volition PC titles:
//! `vpp` packfiles (versions 6, 10 and 17) and `peg` texture bundles
//! (versions 13 and 19), with DDS and TGA as interchange containers.
//!
//! The library never logs and never aborts; all failures bubble to the
//! caller as [`error::Error`] values.
//!
//! Archive payloads are materialised lazily: parsing reads only the header
//! and directory, and each payload is decoded on first access. For
//! condensed archives, the first access decompresses the whole data
//! section and fills the cache of every entry in one pass.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use saints::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let mut stream = BufReader::new(File::open("misc.vpp_pc").unwrap());
//! let mut archive = Packfile::read(&mut stream)?;
//!
//! let index = archive.entry_index("weapons.xtbl").unwrap();
//! let contents = archive.entry_data(&mut stream, index)?;
//! println!("{} bytes", contents.len());
//! # Ok(())
//! # }
//! ```

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
)]

#![forbid(unsafe_code)]


pub mod io; // public to allow for custom byte parsing

pub mod error;
pub mod compression;
pub mod color;
pub mod format;
pub mod codec;
pub mod dds;
pub mod tga;
pub mod packfile;
pub mod peg;


/// Re-exports of the types commonly required for reading
/// and writing packfiles and texture bundles.
pub mod prelude {

    // main exports
    pub use crate::packfile::{Packfile, PackfileEntry, PackfileFlags, PackfileEntryFlags};
    pub use crate::peg::{PegFile, PegEntry};
    pub use crate::dds::DdsFile;
    pub use crate::tga::{TgaFile, TgaImageType};

    // secondary data types
    pub use crate::color::{HdrColor, LdrColor};
    pub use crate::format::{EntryFlags, TextureFormat};
    pub use crate::io::Text;
    pub use crate::error::{Error, Result};
}
