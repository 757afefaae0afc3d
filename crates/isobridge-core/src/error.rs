//! Errors raised in the local context by a failed boundary crossing

use std::fmt;

use isobridge_sdk::{StackFrame, Throwable};

use crate::foreign::ForeignError;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failure surfaced to the caller of a boundary call
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Marshalled failure received from the foreign side, not yet unmarshalled
    #[error("{0}")]
    Foreign(ForeignError),

    /// Stack exhausted while transitioning into the foreign context
    #[error("{0}")]
    TransitionStackOverflow(&'static TransitionStackOverflow),

    /// Foreign failure that is not a carrier, wrapped as-is
    #[error("{0}")]
    Wrapped(ForeignExceptionWrapper),

    /// The carried failure could not be reconstructed
    #[error("Failed to marshall foreign throwable: {reason}")]
    MarshallingFailed {
        /// Why reconstruction failed
        reason: String,
    },

    /// The bootstrap entry points type is missing in the foreign context
    #[error("Entry points class not found: {class}")]
    EntryPointsClassNotFound {
        /// Type that was looked up
        class: String,
    },

    /// A bootstrap function is missing in the foreign context
    #[error("No such entry point: {name}{signature}")]
    EntryPointNotFound {
        /// Function name
        name: String,
        /// Function signature
        signature: String,
    },
}

impl BridgeError {
    /// Frames captured for this failure, innermost first
    ///
    /// Always empty for [`BridgeError::TransitionStackOverflow`].
    pub fn stack_trace(&self) -> &[StackFrame] {
        match self {
            BridgeError::Foreign(carrier) => carrier.stack_trace(),
            BridgeError::TransitionStackOverflow(error) => error.stack_trace(),
            BridgeError::Wrapped(wrapper) => wrapper.stack_trace(),
            _ => &[],
        }
    }

    /// Type name reported for this failure
    pub fn class_name(&self) -> &str {
        match self {
            BridgeError::Foreign(_) => crate::foreign::FOREIGN_ERROR_CLASS,
            BridgeError::TransitionStackOverflow(_) => TransitionStackOverflow::CLASS_NAME,
            BridgeError::Wrapped(wrapper) => wrapper.class_name(),
            BridgeError::MarshallingFailed { .. } => "isobridge.MarshallingFailed",
            BridgeError::EntryPointsClassNotFound { .. } | BridgeError::EntryPointNotFound { .. } => {
                "isobridge.EntryPointNotFound"
            }
        }
    }

    /// Check if this is the frame-less transition stack overflow
    pub fn is_transition_stack_overflow(&self) -> bool {
        matches!(self, BridgeError::TransitionStackOverflow(_))
    }
}

/// Stack overflow raised while crossing into the foreign context
///
/// There is exactly one instance, [`TRANSITION_STACK_OVERFLOW`]. It never
/// captures frames: the stack is already exhausted when it is raised. An
/// application-level overflow inside the foreign context always arrives with
/// frames, which is how the two are told apart.
#[derive(Debug)]
pub struct TransitionStackOverflow {
    message: &'static str,
}

impl TransitionStackOverflow {
    /// Type name reported for the transition overflow
    pub const CLASS_NAME: &'static str = "isobridge.TransitionStackOverflow";

    /// Error message
    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Always empty
    pub fn stack_trace(&self) -> &'static [StackFrame] {
        &[]
    }
}

impl fmt::Display for TransitionStackOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

/// The pre-allocated transition stack overflow
pub static TRANSITION_STACK_OVERFLOW: TransitionStackOverflow = TransitionStackOverflow {
    message: "Stack overflow in transition from native to foreign code.",
};

/// Foreign failure of an arbitrary type, wrapped by the call gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignExceptionWrapper {
    class_name: String,
    message: Option<String>,
    stack: Vec<StackFrame>,
}

impl ForeignExceptionWrapper {
    /// Create a wrapper
    pub fn new(class_name: impl Into<String>, message: Option<String>, stack: Vec<StackFrame>) -> Self {
        Self {
            class_name: class_name.into(),
            message,
            stack,
        }
    }

    /// Type name of the foreign failure
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Message of the foreign failure
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl Throwable for ForeignExceptionWrapper {
    fn stack_trace(&self) -> &[StackFrame] {
        &self.stack
    }

    fn set_stack_trace(&mut self, frames: Vec<StackFrame>) {
        self.stack = frames;
    }
}

impl fmt::Display for ForeignExceptionWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_overflow_is_frameless() {
        let error = BridgeError::TransitionStackOverflow(&TRANSITION_STACK_OVERFLOW);
        assert!(error.is_transition_stack_overflow());
        assert!(error.stack_trace().is_empty());
        assert_eq!(error.class_name(), "isobridge.TransitionStackOverflow");
        assert_eq!(
            error.to_string(),
            "Stack overflow in transition from native to foreign code."
        );
    }

    #[test]
    fn test_wrapper_display_and_frames() {
        let wrapper = ForeignExceptionWrapper::new(
            "app.IoError",
            Some("disk full".to_string()),
            vec![StackFrame::new("app.Fs", "write")],
        );
        assert_eq!(wrapper.to_string(), "app.IoError: disk full");

        let error = BridgeError::Wrapped(wrapper);
        assert_eq!(error.class_name(), "app.IoError");
        assert_eq!(error.stack_trace().len(), 1);

        let bare = ForeignExceptionWrapper::new("app.Abort", None, Vec::new());
        assert_eq!(bare.to_string(), "app.Abort");
    }

    #[test]
    fn test_marshalling_failed_message() {
        let error = BridgeError::MarshallingFailed {
            reason: "no marshalled data".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to marshall foreign throwable: no marshalled data"
        );
        assert!(error.stack_trace().is_empty());
    }

    #[test]
    fn test_entry_point_not_found_message() {
        let error = BridgeError::EntryPointNotFound {
            name: "toByteArray".to_string(),
            signature: "(isobridge.ForeignError)bytes".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No such entry point: toByteArray(isobridge.ForeignError)bytes"
        );
    }
}
