//! isobridge SDK - collaborator contracts for the error bridge
//!
//! This crate holds the types the bridge core consumes without owning:
//! - Opaque handles and JValue-style arguments (`handle`)
//! - The native call interface of the foreign context (`env`)
//! - Byte buffers and the marshaller contract (`binary`, `marshaller`)
//! - Stack frames and isolate descriptors (`frame`, `isolate`)
//!
//! Marshaller implementations and native environments depend on this crate
//! alone; the protocol itself lives in `isobridge-core`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod binary;
pub mod env;
pub mod error;
pub mod frame;
pub mod handle;
pub mod isolate;
pub mod marshaller;

pub use binary::{BinaryInput, BinaryOutput};
pub use env::NativeEnv;
pub use error::{MarshalError, MarshalResult};
pub use frame::StackFrame;
pub use handle::{ClassHandle, MethodHandle, NativeArg, ObjectHandle};
pub use isolate::{FrameSymbolizer, Isolate, IsolateKind};
pub use marshaller::{BinaryMarshaller, StackTraceMarshaller, Throwable, DEFAULT_SIZE_HINT};
