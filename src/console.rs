//! Console Capability Interface
//!
//! Descriptor 0 and descriptor 1 never reach the filesystem: reads on 0
//! come from the input device a byte at a time, writes on 1 go straight
//! to the console. The device drivers themselves live in the kernel
//! proper behind this trait.

/// Capability interface to the console and input device.
pub trait Console: Send {
    /// Read one byte from the input device, blocking until available.
    fn read_byte(&mut self) -> u8;

    /// Write a buffer to the console.
    fn write_bytes(&mut self, buf: &[u8]);
}
