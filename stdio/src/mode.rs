//! Open-mode parsing.
//!
//! A mode string such as `"r+b"` is folded left to right through a small
//! state machine; the terminal state decides the access flags passed to
//! the filesystem's open call.
//!
//! | State     | 'r'  | 'w'   | 'a'    | '+'            | 'b'   |
//! |-----------|------|-------|--------|----------------|-------|
//! | None      | Read | Write | Append | fail           | fail  |
//! | Read      | fail | fail  | fail   | ReadUpdate     | no-op |
//! | Write     | fail | fail  | fail   | WriteUpdate    | no-op |
//! | Append    | fail | fail  | fail   | AppendUpdate   | no-op |
//! | *Update   | fail | fail  | fail   | fail           | no-op |

use bitflags::bitflags;

use crate::error::{StdioError, StdioResult};

// ============================================================================
// Access Flags
// ============================================================================

bitflags! {
    /// Access capabilities requested from the filesystem
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Reads allowed
        const READ = 1 << 0;
        /// Writes allowed
        const WRITE = 1 << 1;
        /// Create if missing
        const CREATE = 1 << 2;
        /// Truncate on open
        const TRUNCATE = 1 << 3;
        /// Every write goes to the end
        const APPEND = 1 << 4;
    }
}

impl AccessFlags {
    /// Read only
    pub const O_RDONLY: u32 = 0o0;
    /// Write only
    pub const O_WRONLY: u32 = 0o1;
    /// Read/write
    pub const O_RDWR: u32 = 0o2;
    /// Create if not exists
    pub const O_CREAT: u32 = 0o100;
    /// Truncate to zero
    pub const O_TRUNC: u32 = 0o1000;
    /// Append mode
    pub const O_APPEND: u32 = 0o2000;

    /// Encode as POSIX `O_*` bits
    pub fn to_posix(self) -> u32 {
        let mut bits = match (self.contains(Self::READ), self.contains(Self::WRITE)) {
            (true, true) => Self::O_RDWR,
            (false, true) => Self::O_WRONLY,
            _ => Self::O_RDONLY,
        };
        if self.contains(Self::CREATE) {
            bits |= Self::O_CREAT;
        }
        if self.contains(Self::TRUNCATE) {
            bits |= Self::O_TRUNC;
        }
        if self.contains(Self::APPEND) {
            bits |= Self::O_APPEND;
        }
        bits
    }

    /// Decode POSIX `O_*` bits
    pub fn from_posix(bits: u32) -> Self {
        let mut flags = match bits & 0o3 {
            Self::O_WRONLY => Self::WRITE,
            Self::O_RDWR => Self::READ | Self::WRITE,
            _ => Self::READ,
        };
        if bits & Self::O_CREAT != 0 {
            flags |= Self::CREATE;
        }
        if bits & Self::O_TRUNC != 0 {
            flags |= Self::TRUNCATE;
        }
        if bits & Self::O_APPEND != 0 {
            flags |= Self::APPEND;
        }
        flags
    }

    /// Can read
    #[inline]
    pub fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    /// Can write
    #[inline]
    pub fn can_write(self) -> bool {
        self.contains(Self::WRITE)
    }
}

// ============================================================================
// Mode State Machine
// ============================================================================

/// State of the mode parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ModeState {
    /// Nothing consumed yet
    None = 0,
    /// `r`
    Read = 1,
    /// `w`
    Write = 2,
    /// `a`
    Append = 3,
    /// `r+`
    ReadUpdate = 4,
    /// `w+`
    WriteUpdate = 5,
    /// `a+`
    AppendUpdate = 6,
}

impl ModeState {
    /// Consume one mode character.
    pub fn step(self, c: char) -> StdioResult<Self> {
        use ModeState::*;

        match (self, c) {
            (None, 'r') => Ok(Read),
            (None, 'w') => Ok(Write),
            (None, 'a') => Ok(Append),
            (Read, '+') => Ok(ReadUpdate),
            (Write, '+') => Ok(WriteUpdate),
            (Append, '+') => Ok(AppendUpdate),
            // Binary marker is accepted once a base mode is known
            (None, 'b') => Err(StdioError::InvalidMode),
            (state, 'b') => Ok(state),
            _ => Err(StdioError::InvalidMode),
        }
    }

    /// Access flags of a terminal state.
    pub fn access(self) -> StdioResult<AccessFlags> {
        let rw = AccessFlags::READ | AccessFlags::WRITE;
        match self {
            Self::None => Err(StdioError::InvalidMode),
            Self::Read => Ok(AccessFlags::READ),
            Self::Write => Ok(AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE),
            Self::Append => Ok(AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::APPEND),
            Self::ReadUpdate => Ok(rw),
            Self::WriteUpdate => Ok(rw | AccessFlags::CREATE | AccessFlags::TRUNCATE),
            Self::AppendUpdate => Ok(rw | AccessFlags::CREATE | AccessFlags::APPEND),
        }
    }
}

/// Parse a mode string into access flags.
pub fn parse_mode(mode: &str) -> StdioResult<AccessFlags> {
    if mode.is_empty() {
        return Err(StdioError::InvalidMode);
    }
    mode.chars()
        .try_fold(ModeState::None, ModeState::step)?
        .access()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_modes() {
        assert_eq!(parse_mode("r"), Ok(AccessFlags::READ));
        assert_eq!(
            parse_mode("w"),
            Ok(AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        );
        assert_eq!(
            parse_mode("a"),
            Ok(AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::APPEND)
        );
        assert_eq!(parse_mode("r+"), Ok(AccessFlags::READ | AccessFlags::WRITE));
        assert_eq!(
            parse_mode("w+"),
            Ok(AccessFlags::READ | AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::TRUNCATE)
        );
        assert_eq!(
            parse_mode("a+"),
            Ok(AccessFlags::READ | AccessFlags::WRITE | AccessFlags::CREATE | AccessFlags::APPEND)
        );
    }

    #[test]
    fn test_binary_marker_is_ignored() {
        for (plain, binary) in [
            ("r", "rb"),
            ("w", "wb"),
            ("a", "ab"),
            ("r+", "r+b"),
            ("r+", "rb+"),
            ("w+", "wb+"),
            ("a+", "a+b"),
            ("a+", "ab+"),
        ] {
            assert_eq!(parse_mode(plain), parse_mode(binary), "{}", binary);
        }
        assert_eq!(parse_mode("rbb"), Ok(AccessFlags::READ));
    }

    #[test]
    fn test_invalid_modes() {
        for mode in ["", "x", "rw", "wr", "r++", "+", "b", "br", "r+w", "a+r", "R", "rt"] {
            assert_eq!(parse_mode(mode), Err(StdioError::InvalidMode), "{:?}", mode);
        }
    }

    #[test]
    fn test_posix_encoding() {
        assert_eq!(AccessFlags::READ.to_posix(), AccessFlags::O_RDONLY);
        assert_eq!(parse_mode("w").unwrap().to_posix(), 0o1 | 0o100 | 0o1000);
        assert_eq!(parse_mode("a+").unwrap().to_posix(), 0o2 | 0o100 | 0o2000);

        for mode in ["r", "w", "a", "r+", "w+", "a+"] {
            let flags = parse_mode(mode).unwrap();
            assert_eq!(AccessFlags::from_posix(flags.to_posix()), flags);
        }
    }
}
