//! Stack frames shared by both sides of the boundary

use std::fmt;

/// A single stack trace element
///
/// Traces are ordered innermost frame first, the same convention used when
/// building a trace for a single context. A frame captured in another
/// operating-system process may arrive *unresolved*: no function name, only
/// the raw instruction address. Such frames are re-resolved by a
/// [`FrameSymbolizer`](crate::FrameSymbolizer) before they are shown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StackFrame {
    /// Declaring type or module
    pub declaring: String,
    /// Function name (empty when unresolved)
    pub function: String,
    /// Source file, if known
    pub file: Option<String>,
    /// Source line, if known
    pub line: Option<u32>,
    /// Raw instruction address, if known
    pub address: Option<u64>,
}

impl StackFrame {
    /// Create a resolved frame without source information
    pub fn new(declaring: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            declaring: declaring.into(),
            function: function.into(),
            ..Default::default()
        }
    }

    /// Create an unresolved frame from a raw address
    pub fn unresolved(address: u64) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }

    /// Attach a source location
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Check whether the frame still needs symbolization
    pub fn is_unresolved(&self) -> bool {
        self.function.is_empty() && self.address.is_some()
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unresolved() {
            return write!(f, "at <{:#x}>", self.address.unwrap_or_default());
        }
        if self.declaring.is_empty() {
            write!(f, "at {}", self.function)?;
        } else {
            write!(f, "at {}.{}", self.declaring, self.function)?;
        }
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "({}:{})", file, line),
            (Some(file), None) => write!(f, "({})", file),
            _ => write!(f, "(Unknown Source)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_display() {
        let frame = StackFrame::new("app.Service", "run").with_location("service.rs", 12);
        assert_eq!(frame.to_string(), "at app.Service.run(service.rs:12)");

        let bare = StackFrame::new("", "main");
        assert_eq!(bare.to_string(), "at main(Unknown Source)");
    }

    #[test]
    fn test_unresolved_frame() {
        let frame = StackFrame::unresolved(0x4000);
        assert!(frame.is_unresolved());
        assert_eq!(frame.to_string(), "at <0x4000>");
        assert!(!StackFrame::new("a", "b").is_unresolved());
    }
}
