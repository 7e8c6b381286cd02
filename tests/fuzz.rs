//! Fuzzy testing.
//! Tries to discover panics with random bytes.
//! Every parser must reject corrupt input with an error, never a panic.

extern crate saints;

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use saints::dds::DdsFile;
use saints::io::{Data, Text};
use saints::packfile::{Packfile, PackfileEntry, PackfileFlags};
use saints::peg::PegFile;
use saints::tga::TgaFile;


fn parse_all(bytes: &[u8]) {
    let _ = Packfile::read(&mut Cursor::new(bytes));
    let _ = PegFile::read_header(&mut Cursor::new(bytes));
    let _ = DdsFile::read(&mut &bytes[..]);
    let _ = TgaFile::read(&mut &bytes[..]);
}

/// Just don't panic.
#[test]
fn random_bytes() {
    let mut random = StdRng::seed_from_u64(2022);

    for size in [0_usize, 1, 7, 24, 40, 120, 2048, 4096] {
        for _ in 0..64 {
            let mut bytes = vec![0_u8; size];
            random.fill_bytes(&mut bytes);
            parse_all(&bytes);
        }
    }
}

/// Valid magic bytes with random remainders must error, not panic.
#[test]
fn random_bytes_with_valid_magic() {
    let mut random = StdRng::seed_from_u64(42);

    for _ in 0..64 {
        let mut bytes = vec![0_u8; 512];
        random.fill_bytes(&mut bytes);

        let mut packfile_bytes = Vec::new();
        0x51890ACE_u32.write(&mut packfile_bytes).unwrap();
        10_u32.write(&mut packfile_bytes).unwrap();
        packfile_bytes.extend_from_slice(&bytes);
        let _ = Packfile::read(&mut Cursor::new(packfile_bytes));

        let mut peg_bytes = Vec::new();
        u32::from_le_bytes(*b"GEKV").write(&mut peg_bytes).unwrap();
        13_i16.write(&mut peg_bytes).unwrap();
        peg_bytes.extend_from_slice(&bytes);
        let _ = PegFile::read_header(&mut Cursor::new(peg_bytes));
    }
}

/// Truncations of a valid archive must error, not panic.
#[test]
fn truncated_archives() {
    let mut packfile = Packfile::new(10);
    packfile.flags = PackfileFlags::COMPRESSED | PackfileFlags::CONDENSED;

    for (name, data) in [("one.bin", vec![1_u8; 100]), ("two.bin", vec![2_u8; 50])] {
        let mut entry = PackfileEntry::new(Text::from(name));
        entry.set_data(data);
        packfile.entries.push(entry);
    }

    let mut written = Cursor::new(Vec::new());
    packfile.write(&mut written).unwrap();
    let bytes = written.into_inner();

    for length in 0..bytes.len() {
        let mut read = Cursor::new(bytes[..length].to_vec());

        if let Ok(mut parsed) = Packfile::read(&mut read) {
            for index in 0..parsed.entry_count() {
                let _ = parsed.load_entry_data(&mut read, index);
            }
        }
    }
}
