//! Call gateway
//!
//! Invokes resolved foreign functions through a [`NativeEnv`] and turns a
//! failure left pending by the callee into a local [`BridgeError`]. What that
//! error looks like is decided by the installed [`ExceptionHandler`].

use std::sync::Arc;

use isobridge_sdk::{NativeArg, NativeEnv, ObjectHandle, StackFrame};
use once_cell::sync::Lazy;
use tracing::trace;

use crate::error::{BridgeError, BridgeResult, ForeignExceptionWrapper};
use crate::foreign::callstack::{self, FrameGuard};
use crate::foreign::merge::splice;
use crate::foreign::resolver::EntryPoint;
use crate::foreign::Direction;

/// Converts a pending foreign failure into a local error
pub trait ExceptionHandler: Send + Sync {
    /// Build the error to raise for the failure described by `ctx`
    fn handle_exception(&self, ctx: &ExceptionHandlerContext<'_>) -> BridgeError;
}

/// The failed call, as seen by an [`ExceptionHandler`]
///
/// The foreign failure is already cleared from the environment when the
/// handler runs, and its reference is released once the handler returns.
pub struct ExceptionHandlerContext<'a> {
    env: &'a dyn NativeEnv,
    throwable: ObjectHandle,
    class_name: String,
    entry: &'a EntryPoint,
}

impl<'a> ExceptionHandlerContext<'a> {
    /// Environment of the failed call
    pub fn env(&self) -> &'a dyn NativeEnv {
        self.env
    }

    /// The foreign throwable
    pub fn throwable(&self) -> ObjectHandle {
        self.throwable
    }

    /// Type name of the foreign throwable
    pub fn throwable_class_name(&self) -> &str {
        &self.class_name
    }

    /// The function that failed
    pub fn entry(&self) -> &'a EntryPoint {
        self.entry
    }

    /// Default handling: wrap the foreign throwable as it is
    ///
    /// The wrapper's trace is the current local frames followed by the
    /// throwable's own frames.
    pub fn wrap(&self) -> BridgeError {
        let foreign = self.env.throwable_stack_trace(self.throwable);
        let stack = splice(&callstack::capture(), &foreign, Direction::ForeignToLocal);
        BridgeError::Wrapped(ForeignExceptionWrapper::new(
            self.class_name.clone(),
            self.env.throwable_message(self.throwable),
            stack,
        ))
    }
}

/// Handler that always wraps
#[derive(Debug, Clone, Copy, Default)]
pub struct WrappingExceptionHandler;

impl ExceptionHandler for WrappingExceptionHandler {
    fn handle_exception(&self, ctx: &ExceptionHandlerContext<'_>) -> BridgeError {
        ctx.wrap()
    }
}

static DEFAULT_CALLS: Lazy<NativeCalls> = Lazy::new(NativeCalls::new);

/// Dispatcher for static foreign calls
#[derive(Clone)]
pub struct NativeCalls {
    handler: Arc<dyn ExceptionHandler>,
}

impl NativeCalls {
    /// Gateway with the wrapping handler
    pub fn new() -> Self {
        Self::with_exception_handler(Arc::new(WrappingExceptionHandler))
    }

    /// Gateway with a custom handler
    pub fn with_exception_handler(handler: Arc<dyn ExceptionHandler>) -> Self {
        Self { handler }
    }

    /// The process-wide wrapping gateway
    pub fn default_calls() -> &'static NativeCalls {
        &DEFAULT_CALLS
    }

    /// Call a static function returning an object
    ///
    /// The call site is on the shadow call stack for the duration of the
    /// call, so errors built by the handler include it.
    pub fn call_static_object(
        &self,
        env: &dyn NativeEnv,
        entry: &EntryPoint,
        args: &[NativeArg],
    ) -> BridgeResult<ObjectHandle> {
        let _frame = FrameGuard::enter(StackFrame::new(entry.declaring(), entry.name()));
        let result = env.call_static_object_method(entry.class(), entry.method(), args);

        let Some(throwable) = env.exception_occurred() else {
            return Ok(result);
        };
        env.exception_clear();

        let class_name = env.class_name(env.get_object_class(throwable));
        trace!(function = entry.name(), class = %class_name, "foreign call failed");
        let ctx = ExceptionHandlerContext {
            env,
            throwable,
            class_name,
            entry,
        };
        let err = self.handler.handle_exception(&ctx);
        env.delete_local_ref(throwable);
        Err(err)
    }
}

impl Default for NativeCalls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::resolver::EntryPointResolver;
    use crate::loopback::LoopbackVm;

    #[test]
    fn test_successful_call() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let class = vm.define_class("app.Greeter");
        let greeting = env.new_byte_array(b"hello");
        vm.register_static(class, "greet", "()bytes", move |_, _| greeting);

        let entry = EntryPointResolver::in_class("app.Greeter", "greet", "()bytes")
            .resolve(&env)
            .unwrap();
        let result = NativeCalls::new().call_static_object(&env, &entry, &[]).unwrap();
        assert_eq!(env.byte_array_contents(result), b"hello");
    }

    #[test]
    fn test_failure_is_wrapped_with_frames() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let class = vm.define_class("app.Parser");
        let error_class = vm.define_class("app.ParseError");
        vm.register_static(class, "parse", "()object", move |env, _| {
            env.throw_new(
                error_class,
                Some("bad input"),
                vec![StackFrame::new("app.Parser", "parse")],
            );
            ObjectHandle::NULL
        });

        let entry = EntryPointResolver::in_class("app.Parser", "parse", "()object")
            .resolve(&env)
            .unwrap();
        let err = NativeCalls::default_calls()
            .call_static_object(&env, &entry, &[])
            .unwrap_err();

        match &err {
            BridgeError::Wrapped(wrapper) => {
                assert_eq!(wrapper.class_name(), "app.ParseError");
                assert_eq!(wrapper.message(), Some("bad input"));
            }
            other => panic!("expected Wrapped, got {:?}", other),
        }
        let stack = err.stack_trace();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].function, "parse");
        assert_eq!(stack[0].declaring, "app.Parser");
        assert!(env.exception_occurred().is_none());
    }

    struct Fixed;

    impl ExceptionHandler for Fixed {
        fn handle_exception(&self, ctx: &ExceptionHandlerContext<'_>) -> BridgeError {
            BridgeError::MarshallingFailed {
                reason: ctx.throwable_class_name().to_string(),
            }
        }
    }

    #[test]
    fn test_custom_handler() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let class = vm.define_class("app.Job");
        let error_class = vm.define_class("app.Cancelled");
        vm.register_static(class, "run", "()object", move |env, _| {
            env.throw_new(error_class, None, Vec::new());
            ObjectHandle::NULL
        });

        let entry = EntryPointResolver::in_class("app.Job", "run", "()object")
            .resolve(&env)
            .unwrap();
        let calls = NativeCalls::with_exception_handler(Arc::new(Fixed));
        let err = calls.call_static_object(&env, &entry, &[]).unwrap_err();
        assert_eq!(err.to_string(), "Failed to marshall foreign throwable: app.Cancelled");
    }
}
