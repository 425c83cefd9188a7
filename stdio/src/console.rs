//! Console sink behind the standard output streams.

use alloc::vec::Vec;

/// Character sink for stdout and stderr.
pub trait Console {
    /// Emit one byte.
    fn put_char(&mut self, c: u8);
}

/// Captures console output in memory.
impl Console for Vec<u8> {
    fn put_char(&mut self, c: u8) {
        self.push(c);
    }
}

/// Adapts a closure, e.g. a UART transmit routine.
pub struct ConsoleFn<F>(pub F);

impl<F: FnMut(u8)> Console for ConsoleFn<F> {
    fn put_char(&mut self, c: u8) {
        (self.0)(c)
    }
}

impl<F> core::fmt::Debug for ConsoleFn<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ConsoleFn")
    }
}

/// Drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn put_char(&mut self, _c: u8) {}
}
