//! 16-bit additive checksum used by R30x frames.
//!
//! The checksum is the sum of the packet type byte, both length bytes and
//! every payload byte, truncated to 16 bits. The start code and the address
//! are not covered.

/// Running checksum, fed byte by byte as a frame is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u16);

impl Checksum {
    /// Start a new checksum at zero.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Add a single byte.
    pub fn push(&mut self, byte: u8) {
        self.0 = self
            .0
            .wrapping_add(u16::from(byte));
    }

    /// Add every byte of `bytes`.
    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    /// Current value.
    pub const fn value(self) -> u16 {
        self.0
    }
}

/// Checksum of a contiguous byte slice.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut sum = Checksum::new();
    sum.update(bytes);
    sum.value()
}
