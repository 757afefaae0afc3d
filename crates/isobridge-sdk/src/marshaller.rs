//! Marshaller contract
//!
//! A marshaller knows the byte layout of exactly one value type. The bridge
//! treats the produced bytes as opaque; it only needs a sizing hint to
//! pre-allocate the output buffer and the ability to read the value back on
//! the other side.

use crate::binary::{BinaryInput, BinaryOutput};
use crate::error::{MarshalError, MarshalResult};
use crate::frame::StackFrame;
use crate::isolate::Isolate;

/// Initial buffer size used when a marshaller gives no better estimate
pub const DEFAULT_SIZE_HINT: usize = 32;

/// Serializes values of type `T` to bytes and back
pub trait BinaryMarshaller<T>: Send + Sync {
    /// Write `value` to `out`
    fn write(&self, out: &mut BinaryOutput, value: &T) -> MarshalResult<()>;

    /// Read a value from `input`
    ///
    /// `isolate` is the context the bytes came from; marshallers that rebuild
    /// stack traces need it to pick the merge strategy.
    fn read(&self, isolate: &Isolate, input: &mut BinaryInput<'_>) -> MarshalResult<T>;

    /// Estimate the marshalled size of `value` in bytes
    fn infer_size(&self, _value: &T) -> usize {
        DEFAULT_SIZE_HINT
    }
}

/// An error value that carries a stack trace
pub trait Throwable {
    /// The trace, innermost frame first
    fn stack_trace(&self) -> &[StackFrame];

    /// Replace the trace
    fn set_stack_trace(&mut self, frames: Vec<StackFrame>);
}

/// Marshaller for a complete stack trace
#[derive(Debug, Clone, Copy, Default)]
pub struct StackTraceMarshaller;

impl StackTraceMarshaller {
    fn write_frame(out: &mut BinaryOutput, frame: &StackFrame) {
        out.write_utf(&frame.declaring);
        out.write_utf(&frame.function);
        out.write_opt_utf(frame.file.as_deref());
        match frame.line {
            Some(line) => {
                out.write_bool(true);
                out.write_u32(line);
            }
            None => out.write_bool(false),
        }
        match frame.address {
            Some(address) => {
                out.write_bool(true);
                out.write_u64(address);
            }
            None => out.write_bool(false),
        }
    }

    fn read_frame(input: &mut BinaryInput<'_>) -> MarshalResult<StackFrame> {
        let declaring = input.read_utf()?;
        let function = input.read_utf()?;
        let file = input.read_opt_utf()?;
        let line = if input.read_bool()? {
            Some(input.read_u32()?)
        } else {
            None
        };
        let address = if input.read_bool()? {
            Some(input.read_u64()?)
        } else {
            None
        };
        Ok(StackFrame {
            declaring,
            function,
            file,
            line,
            address,
        })
    }
}

impl BinaryMarshaller<Vec<StackFrame>> for StackTraceMarshaller {
    fn write(&self, out: &mut BinaryOutput, value: &Vec<StackFrame>) -> MarshalResult<()> {
        let count = u32::try_from(value.len())
            .map_err(|_| MarshalError::Custom("stack trace too deep".to_string()))?;
        out.write_u32(count);
        for frame in value {
            if out.is_failed() {
                break;
            }
            Self::write_frame(out, frame);
        }
        out.status()
    }

    fn read(&self, _isolate: &Isolate, input: &mut BinaryInput<'_>) -> MarshalResult<Vec<StackFrame>> {
        let count = input.read_u32()? as usize;
        // Each frame takes at least 11 bytes; do not trust the count blindly
        let mut frames = Vec::with_capacity(count.min(input.remaining() / 11));
        for _ in 0..count {
            frames.push(Self::read_frame(input)?);
        }
        Ok(frames)
    }

    fn infer_size(&self, value: &Vec<StackFrame>) -> usize {
        4 + value
            .iter()
            .map(|f| {
                11 + f.declaring.len()
                    + f.function.len()
                    + f.file.as_ref().map_or(0, |s| 4 + s.len())
                    + f.line.map_or(0, |_| 4)
                    + f.address.map_or(0, |_| 8)
            })
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolate::IsolateKind;

    fn sample_trace() -> Vec<StackFrame> {
        vec![
            StackFrame::new("app.Parser", "parse").with_location("parser.rs", 40),
            StackFrame::new("app.Main", "main"),
            StackFrame::unresolved(0xdead_beef),
        ]
    }

    #[test]
    fn test_stack_trace_marshaller() {
        let trace = sample_trace();
        let marshaller = StackTraceMarshaller;

        let mut out = BinaryOutput::with_capacity(marshaller.infer_size(&trace));
        marshaller.write(&mut out, &trace).unwrap();
        assert_eq!(out.position(), marshaller.infer_size(&trace));

        let bytes = out.into_vec();
        let isolate = Isolate::new(1, IsolateKind::Native);
        let read = marshaller
            .read(&isolate, &mut BinaryInput::new(&bytes))
            .unwrap();
        assert_eq!(read, trace);
    }

    #[test]
    fn test_stack_trace_truncated() {
        let mut out = BinaryOutput::default();
        out.write_u32(3);
        out.write_utf("only-one-field");
        let bytes = out.into_vec();

        let isolate = Isolate::new(1, IsolateKind::Host);
        let result = StackTraceMarshaller.read(&isolate, &mut BinaryInput::new(&bytes));
        assert!(matches!(result, Err(MarshalError::Truncated { .. })));
    }

    #[test]
    fn test_stack_trace_over_limit() {
        let trace = sample_trace();
        let mut out = BinaryOutput::with_limit(16, 24);
        let result = StackTraceMarshaller.write(&mut out, &trace);
        assert_eq!(result, Err(MarshalError::LimitExceeded { limit: 24 }));
        assert!(out.position() <= 24);
    }

    #[test]
    fn test_default_size_hint() {
        struct Unit;
        impl BinaryMarshaller<()> for Unit {
            fn write(&self, _out: &mut BinaryOutput, _value: &()) -> MarshalResult<()> {
                Ok(())
            }
            fn read(&self, _isolate: &Isolate, _input: &mut BinaryInput<'_>) -> MarshalResult<()> {
                Ok(())
            }
        }
        assert_eq!(Unit.infer_size(&()), DEFAULT_SIZE_HINT);
    }
}
