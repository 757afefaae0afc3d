//! Default throwable representation
//!
//! Marshals an error as its type name, its message and its stack trace.
//! Embedders with richer error types provide their own marshaller.

use std::fmt;

use isobridge_sdk::{
    BinaryInput, BinaryMarshaller, BinaryOutput, Isolate, MarshalResult, StackFrame,
    StackTraceMarshaller, Throwable,
};

use crate::error::BridgeError;

/// An error reconstructed from another context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    class_name: String,
    message: Option<String>,
    stack: Vec<StackFrame>,
}

impl RemoteError {
    /// Create an error
    pub fn new(class_name: impl Into<String>, message: Option<String>, stack: Vec<StackFrame>) -> Self {
        Self {
            class_name: class_name.into(),
            message,
            stack,
        }
    }

    /// Type name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

impl std::error::Error for RemoteError {}

impl Throwable for RemoteError {
    fn stack_trace(&self) -> &[StackFrame] {
        &self.stack
    }

    fn set_stack_trace(&mut self, frames: Vec<StackFrame>) {
        self.stack = frames;
    }
}

impl From<BridgeError> for RemoteError {
    fn from(error: BridgeError) -> Self {
        Self {
            class_name: error.class_name().to_string(),
            message: Some(error.to_string()),
            stack: error.stack_trace().to_vec(),
        }
    }
}

/// Marshaller for [`RemoteError`]
///
/// Layout: type name, optional message, stack trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultThrowableMarshaller;

impl BinaryMarshaller<RemoteError> for DefaultThrowableMarshaller {
    fn write(&self, out: &mut BinaryOutput, value: &RemoteError) -> MarshalResult<()> {
        out.write_utf(&value.class_name);
        out.write_opt_utf(value.message.as_deref());
        StackTraceMarshaller.write(out, &value.stack)
    }

    fn read(&self, isolate: &Isolate, input: &mut BinaryInput<'_>) -> MarshalResult<RemoteError> {
        let class_name = input.read_utf()?;
        let message = input.read_opt_utf()?;
        let stack = StackTraceMarshaller.read(isolate, input)?;
        Ok(RemoteError {
            class_name,
            message,
            stack,
        })
    }

    fn infer_size(&self, value: &RemoteError) -> usize {
        4 + value.class_name.len()
            + 1
            + value.message.as_ref().map_or(0, |m| 4 + m.len())
            + StackTraceMarshaller.infer_size(&value.stack)
    }
}
