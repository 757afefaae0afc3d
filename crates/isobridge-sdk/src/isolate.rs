//! Isolate descriptors
//!
//! An isolate is the foreign execution context on the other side of the
//! boundary. Its flavor decides how foreign stack frames can be combined with
//! local ones.

use std::fmt;
use std::sync::Arc;

use crate::frame::StackFrame;

/// Where the foreign context lives relative to the local one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolateKind {
    /// Native-image isolate in the same OS process
    Native,
    /// Hosting VM reached from an isolate, same OS process
    Host,
    /// Isolate running in a separate OS process
    Process,
}

impl IsolateKind {
    /// Whether both contexts share one address space
    pub fn is_same_process(self) -> bool {
        match self {
            IsolateKind::Native | IsolateKind::Host => true,
            IsolateKind::Process => false,
        }
    }

    /// Get the kind name as a string
    pub fn name(self) -> &'static str {
        match self {
            IsolateKind::Native => "native",
            IsolateKind::Host => "host",
            IsolateKind::Process => "process",
        }
    }
}

impl fmt::Display for IsolateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Re-resolves frames against another process's symbol information
pub trait FrameSymbolizer: Send + Sync {
    /// Resolve a frame; frames that cannot be resolved are returned as-is
    fn symbolize(&self, frame: &StackFrame) -> StackFrame;
}

/// Descriptor of the foreign isolate a value is exchanged with
#[derive(Clone)]
pub struct Isolate {
    id: u64,
    kind: IsolateKind,
    symbolizer: Option<Arc<dyn FrameSymbolizer>>,
}

impl Isolate {
    /// Create an isolate descriptor without symbol information
    pub fn new(id: u64, kind: IsolateKind) -> Self {
        Self {
            id,
            kind,
            symbolizer: None,
        }
    }

    /// Create a separate-process isolate descriptor backed by a symbolizer
    pub fn process(id: u64, symbolizer: Arc<dyn FrameSymbolizer>) -> Self {
        Self {
            id,
            kind: IsolateKind::Process,
            symbolizer: Some(symbolizer),
        }
    }

    /// Isolate id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Isolate flavor
    pub fn kind(&self) -> IsolateKind {
        self.kind
    }

    /// Symbol information of the foreign process, if any
    pub fn symbolizer(&self) -> Option<&dyn FrameSymbolizer> {
        self.symbolizer.as_deref()
    }
}

impl fmt::Debug for Isolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isolate")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("symbolizer", &self.symbolizer.is_some())
            .finish()
    }
}
