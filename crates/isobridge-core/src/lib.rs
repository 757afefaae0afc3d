//! isobridge core - error propagation across an execution-context boundary
//!
//! Two execution contexts that share only a narrow native call interface
//! cannot pass live error objects to each other. This crate moves a failure
//! across as marshalled bytes and rebuilds it on the other side with a stack
//! trace that spans both contexts.
//!
//! # Example
//!
//! ```ignore
//! use isobridge_core::{open_method_scope, ForeignError, DefaultThrowableMarshaller};
//!
//! // Foreign-to-local entry point
//! fn entry(env: &dyn NativeEnv) {
//!     let _scope = match open_method_scope("app.Service.handle", env) {
//!         Ok(scope) => scope,
//!         Err(_) => return,
//!     };
//!     if let Err(error) = handle() {
//!         // Report the failure to the foreign caller
//!         let carrier = ForeignError::for_error(&error, &DefaultThrowableMarshaller);
//!         let _ = carrier.throw_in_foreign(env);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod calls;
pub mod config;
pub mod error;
pub mod foreign;
pub mod loopback;

pub use calls::{ExceptionHandler, ExceptionHandlerContext, NativeCalls, WrappingExceptionHandler};
pub use config::{BridgeOptions, ConfigError};
pub use error::{
    BridgeError, BridgeResult, ForeignExceptionWrapper, TransitionStackOverflow, TRANSITION_STACK_OVERFLOW,
};
pub use foreign::callstack::FrameGuard;
pub use foreign::{
    foreign_calls, merge_stack_trace, open_method_scope, DefaultThrowableMarshaller, Direction, FailureKind,
    ForeignError, ForeignExceptionHandler, MethodScope, RemoteError, FOREIGN_ERROR_CLASS,
};
