//! ForeignError - the carrier that moves one failure across the boundary
//!
//! A failure is marshalled to bytes on the side where it happened, the bytes
//! travel as a `ForeignError`, and the receiving side unmarshals and raises
//! the original error. A carrier is immutable once built and cheap to clone:
//! clones share one instance, so the pending registry and the propagating
//! error observe the same carrier.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use isobridge_sdk::{
    BinaryInput, BinaryMarshaller, BinaryOutput, Isolate, NativeEnv, ObjectHandle, StackFrame,
    Throwable,
};
use once_cell::sync::Lazy;
use tracing::{trace, warn};

use super::{callstack, endpoints, merge, pending};
use crate::config;
use crate::error::{BridgeError, BridgeResult};

/// Type name of the carrier, identical in both contexts
///
/// The two contexts load their own, independent definitions of the carrier
/// type, so a received failure is recognized by this name and never by type
/// identity.
pub const FOREIGN_ERROR_CLASS: &str = "isobridge.ForeignError";

/// Which way a carrier crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Only the shared marshalling-failed sentinel
    Undefined = 0,
    /// Failure of the local context, sent to the foreign one
    LocalToForeign = 1,
    /// Failure of the foreign context, received locally
    ForeignToLocal = 2,
}

impl Direction {
    /// Decode a direction tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Direction::Undefined),
            1 => Some(Direction::LocalToForeign),
            2 => Some(Direction::ForeignToLocal),
            _ => None,
        }
    }
}

struct Inner {
    raw_data: Option<Box<[u8]>>,
    direction: Direction,
    captures_local_stack: bool,
    local_stack: Vec<StackFrame>,
}

/// Marshalled failure in transit
#[derive(Clone)]
pub struct ForeignError {
    inner: Arc<Inner>,
}

/// Pre-allocated carrier for a failure whose marshalling failed
static MARSHALLING_FAILED: Lazy<ForeignError> =
    Lazy::new(|| ForeignError::new(None, Direction::Undefined, false, Vec::new()));

/// Allocate the sentinel ahead of any failure path
pub(crate) fn preallocate() {
    Lazy::force(&MARSHALLING_FAILED);
}

impl ForeignError {
    fn new(
        raw_data: Option<Box<[u8]>>,
        direction: Direction,
        captures_local_stack: bool,
        local_stack: Vec<StackFrame>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                raw_data,
                direction,
                captures_local_stack,
                local_stack,
            }),
        }
    }

    /// Marshal a local error for transfer to the foreign context
    ///
    /// Never fails. The output buffer never grows past the configured payload
    /// limit. If the marshaller returns an error, panics, or hits the limit,
    /// the shared sentinel
    /// [`ForeignError::marshalling_failed`] is returned instead: propagating
    /// the secondary failure would hide the original one and could tear down
    /// the process from inside an entry point.
    pub fn for_error<T>(error: &T, marshaller: &dyn BinaryMarshaller<T>) -> ForeignError {
        Self::for_error_with_limit(error, marshaller, config::current().max_payload_bytes)
    }

    pub(crate) fn for_error_with_limit<T>(
        error: &T,
        marshaller: &dyn BinaryMarshaller<T>,
        limit: usize,
    ) -> ForeignError {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut out = BinaryOutput::with_limit(marshaller.infer_size(error), limit);
            marshaller.write(&mut out, error).map_err(|e| e.to_string())?;
            // Marshallers may ignore a failed write and still return Ok
            out.status().map_err(|e| e.to_string())?;
            Ok::<Vec<u8>, String>(out.into_vec())
        }));

        match outcome {
            Ok(Ok(bytes)) => {
                trace!(len = bytes.len(), "exported foreign error");
                Self::new(
                    Some(bytes.into_boxed_slice()),
                    Direction::LocalToForeign,
                    false,
                    Vec::new(),
                )
            }
            Ok(Err(reason)) => {
                warn!(%reason, "failed to marshal error, sending sentinel");
                Self::marshalling_failed()
            }
            Err(_) => {
                warn!("error marshaller panicked, sending sentinel");
                Self::marshalling_failed()
            }
        }
    }

    /// Wrap bytes received from the foreign context
    ///
    /// The carrier snapshots the local shadow call stack (the point of
    /// reception) and becomes this thread's pending carrier, replacing any
    /// previous one. The caller raises it as [`BridgeError::Foreign`].
    /// `raw_data` is `None` when the foreign side sent its own sentinel.
    pub fn create(raw_data: Option<Vec<u8>>, direction: Direction) -> ForeignError {
        debug_assert!(
            direction != Direction::Undefined,
            "received carriers always have a direction"
        );
        let carrier = Self::new(
            raw_data.map(Vec::into_boxed_slice),
            direction,
            true,
            callstack::capture(),
        );
        trace!(?direction, len = carrier.raw_data().map_or(0, <[u8]>::len), "received foreign error");
        pending::set(carrier.clone());
        carrier
    }

    /// The shared sentinel for a double failure
    pub fn marshalling_failed() -> ForeignError {
        MARSHALLING_FAILED.clone()
    }

    /// Check if this is the shared sentinel
    pub fn is_marshalling_failed(&self) -> bool {
        Self::ptr_eq(self, &MARSHALLING_FAILED)
    }

    /// Instance identity
    pub fn ptr_eq(a: &ForeignError, b: &ForeignError) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Marshalled bytes, absent if marshalling failed on the sending side
    pub fn raw_data(&self) -> Option<&[u8]> {
        self.inner.raw_data.as_deref()
    }

    /// Crossing direction
    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Whether the carrier recorded the local frames at its creation
    pub fn captures_local_stack(&self) -> bool {
        self.inner.captures_local_stack
    }

    /// Local frames recorded at creation, innermost first
    pub fn stack_trace(&self) -> &[StackFrame] {
        &self.inner.local_stack
    }

    /// Unmarshal the carried failure
    ///
    /// This always yields an error to raise; it never yields a value.
    /// Callers write `return Err(carrier.throw_original_error(..))`. The
    /// reconstructed error gets a stack trace merged from its foreign frames
    /// and this thread's pending carrier. Missing bytes or an unreadable
    /// payload yield [`BridgeError::MarshallingFailed`] converted into `T`.
    ///
    /// The pending registry is cleared on every exit, including unwinding
    /// out of a panicking marshaller.
    pub fn throw_original_error<T>(&self, isolate: &Isolate, marshaller: &dyn BinaryMarshaller<T>) -> T
    where
        T: Throwable + From<BridgeError>,
    {
        let _guard = pending::PendingGuard::new();

        let Some(raw_data) = self.raw_data() else {
            return T::from(BridgeError::MarshallingFailed {
                reason: "no marshalled data".to_string(),
            });
        };

        match marshaller.read(isolate, &mut BinaryInput::new(raw_data)) {
            Ok(mut error) => {
                let merged = merge::merge_stack_trace(isolate, error.stack_trace());
                error.set_stack_trace(merged);
                error
            }
            Err(e) => T::from(BridgeError::MarshallingFailed {
                reason: e.to_string(),
            }),
        }
    }

    /// Raise this carrier as the pending failure of the foreign context
    ///
    /// Used on the exporting side when returning to the foreign caller: the
    /// bytes are copied into a foreign byte array and handed to the
    /// foreign `createForeignError` end point. The temporary array is
    /// released once the end point returns.
    pub fn throw_in_foreign(&self, env: &dyn NativeEnv) -> BridgeResult<()> {
        let array = match self.raw_data() {
            Some(raw_data) => env.new_byte_array(raw_data),
            None => ObjectHandle::NULL,
        };
        let throwable = endpoints::call_create_foreign_error(env, array);
        env.delete_local_ref(array);
        env.throw(throwable?);
        Ok(())
    }
}

impl fmt::Debug for ForeignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignError")
            .field("direction", &self.inner.direction)
            .field("len", &self.raw_data().map(<[u8]>::len))
            .field("captures_local_stack", &self.inner.captures_local_stack)
            .field("frames", &self.inner.local_stack.len())
            .finish()
    }
}

impl fmt::Display for ForeignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw_data() {
            Some(raw_data) => write!(f, "{} ({} bytes)", FOREIGN_ERROR_CLASS, raw_data.len()),
            None => write!(f, "{} (marshalling failed)", FOREIGN_ERROR_CLASS),
        }
    }
}
