//! Record sequence numbers

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing sequence numbers to concurrent requests
#[derive(Debug)]
pub struct SequenceAllocator {
    last: AtomicU64,
}

impl SequenceAllocator {
    /// Create an allocator whose first number is `start + 1`
    pub fn new(start: u64) -> Self {
        SequenceAllocator {
            last: AtomicU64::new(start),
        }
    }

    /// Create an allocator that continues after the records already in `dir`
    pub fn for_dir(dir: &Path) -> io::Result<Self> {
        Ok(Self::new(seed(dir)?))
    }

    /// Allocate the next number
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The number most recently handed out
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Starting point for a save directory
///
/// The largest number found as the leading digits of a file name, never
/// less than 1. Subdirectories are ignored and a missing directory counts
/// as empty.
pub fn seed(dir: &Path) -> io::Result<u64> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(e),
    };

    let mut max = 1;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let digits = &name[..name.bytes().take_while(u8::is_ascii_digit).count()];
        if let Ok(n) = digits.parse::<u64>() {
            max = max.max(n);
        }
    }
    Ok(max)
}
