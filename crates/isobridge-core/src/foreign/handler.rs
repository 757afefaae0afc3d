//! Exception handler for calls that may raise a foreign carrier
//!
//! Three kinds of failure come back from a foreign call:
//! - stack exhaustion while entering the foreign context, recognized by
//!   type identity with the marker type resolved at startup;
//! - a foreign carrier, recognized by type name since each context has its
//!   own definition of the carrier type;
//! - anything else, wrapped as-is.

use isobridge_sdk::{ClassHandle, NativeEnv};
use tracing::trace;

use super::carrier::{Direction, ForeignError, FOREIGN_ERROR_CLASS};
use super::endpoints;
use crate::calls::{ExceptionHandler, ExceptionHandlerContext};
use crate::error::{BridgeError, TRANSITION_STACK_OVERFLOW};

/// Classification of a failed foreign call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The transition into the foreign context ran out of stack
    StackExhaustion,
    /// The foreign side raised a carrier
    CarrierPassthrough,
    /// Any other foreign failure
    Generic,
}

/// Handler installed on the foreign-error call gateway
#[derive(Debug, Clone, Copy)]
pub struct ForeignExceptionHandler {
    stack_overflow_type: Option<ClassHandle>,
}

impl ForeignExceptionHandler {
    /// Create a handler; without a marker type stack exhaustion is never
    /// detected and such failures take the generic path
    pub fn new(stack_overflow_type: Option<ClassHandle>) -> Self {
        Self { stack_overflow_type }
    }

    /// The stack-exhaustion marker type
    pub fn stack_overflow_type(&self) -> Option<ClassHandle> {
        self.stack_overflow_type
    }

    /// Decide how a failure is handled
    pub fn classify(&self, ctx: &ExceptionHandlerContext<'_>) -> FailureKind {
        let env = ctx.env();
        if let Some(marker) = self.stack_overflow_type {
            let class = env.get_object_class(ctx.throwable());
            if env.is_same_object(marker.as_object(), class.as_object()) {
                return FailureKind::StackExhaustion;
            }
        }
        if ctx.throwable_class_name() == FOREIGN_ERROR_CLASS {
            return FailureKind::CarrierPassthrough;
        }
        FailureKind::Generic
    }

    fn receive_carrier(&self, ctx: &ExceptionHandlerContext<'_>) -> BridgeError {
        let env: &dyn NativeEnv = ctx.env();
        match endpoints::call_to_byte_array(env, ctx.throwable()) {
            Ok(array) => {
                let raw_data = if array.is_null() {
                    None
                } else {
                    let bytes = env.byte_array_contents(array);
                    env.delete_local_ref(array);
                    Some(bytes)
                };
                BridgeError::Foreign(ForeignError::create(raw_data, Direction::ForeignToLocal))
            }
            Err(err) => err,
        }
    }
}

impl ExceptionHandler for ForeignExceptionHandler {
    fn handle_exception(&self, ctx: &ExceptionHandlerContext<'_>) -> BridgeError {
        let kind = self.classify(ctx);
        trace!(?kind, function = ctx.entry().name(), "classified foreign failure");
        match kind {
            FailureKind::StackExhaustion => BridgeError::TransitionStackOverflow(&TRANSITION_STACK_OVERFLOW),
            FailureKind::CarrierPassthrough => self.receive_carrier(ctx),
            FailureKind::Generic => ctx.wrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::NativeCalls;
    use crate::foreign::pending;
    use crate::foreign::resolver::EntryPointResolver;
    use crate::loopback::{LoopbackEnv, LoopbackVm, STACK_OVERFLOW_ERROR_CLASS};
    use isobridge_sdk::{ObjectHandle, StackFrame};
    use std::sync::Arc;

    fn fail_with(
        vm: &Arc<LoopbackVm>,
        env: &LoopbackEnv,
        function: &'static str,
        raise: impl Fn(&LoopbackEnv) + Send + Sync + 'static,
    ) -> BridgeError {
        let class = vm.define_class("app.Service");
        vm.register_static(class, function, "()object", move |env, _| {
            raise(env);
            ObjectHandle::NULL
        });
        let entry = EntryPointResolver::in_class("app.Service", function, "()object")
            .resolve(env)
            .unwrap();
        let marker = vm.stack_overflow_error_class();
        NativeCalls::with_exception_handler(Arc::new(ForeignExceptionHandler::new(Some(marker))))
            .call_static_object(env, &entry, &[])
            .unwrap_err()
    }

    #[test]
    fn test_stack_exhaustion() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let marker = vm.stack_overflow_error_class();
        let err = fail_with(&vm, &env, "recurse", move |env| {
            env.throw_new(marker, None, vec![StackFrame::new("app.Service", "recurse")]);
        });

        assert!(err.is_transition_stack_overflow());
        assert!(err.stack_trace().is_empty());
    }

    #[test]
    fn test_same_name_distinct_type_is_generic() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let lookalike = vm.define_class(STACK_OVERFLOW_ERROR_CLASS);
        let err = fail_with(&vm, &env, "lookalike", move |env| {
            env.throw_new(lookalike, Some("deep"), Vec::new());
        });

        match &err {
            BridgeError::Wrapped(wrapper) => assert_eq!(wrapper.class_name(), STACK_OVERFLOW_ERROR_CLASS),
            other => panic!("expected Wrapped, got {:?}", other),
        }
        assert!(!err.stack_trace().is_empty());
    }

    #[test]
    fn test_carrier_passthrough() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let err = fail_with(&vm, &env, "forward", |env| {
            env.throw_foreign_error(Some(&[4u8, 5, 6][..]));
        });

        match &err {
            BridgeError::Foreign(carrier) => {
                assert_eq!(carrier.raw_data(), Some(&[4u8, 5, 6][..]));
                assert_eq!(carrier.direction(), Direction::ForeignToLocal);
                assert!(carrier.captures_local_stack());
                assert_eq!(carrier.stack_trace()[0].function, "forward");
                assert!(ForeignError::ptr_eq(&pending::get().unwrap(), carrier));
            }
            other => panic!("expected Foreign, got {:?}", other),
        }
        pending::clear();
    }

    #[test]
    fn test_carrier_without_payload() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let err = fail_with(&vm, &env, "forward_failed", |env| {
            env.throw_foreign_error(None);
        });

        match &err {
            BridgeError::Foreign(carrier) => assert!(carrier.raw_data().is_none()),
            other => panic!("expected Foreign, got {:?}", other),
        }
        pending::clear();
    }

    #[test]
    fn test_without_marker_overflow_is_generic() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let class = vm.define_class("app.Deep");
        let marker = vm.stack_overflow_error_class();
        vm.register_static(class, "recurse", "()object", move |env, _| {
            env.throw_new(marker, None, Vec::new());
            ObjectHandle::NULL
        });
        let entry = EntryPointResolver::in_class("app.Deep", "recurse", "()object")
            .resolve(&env)
            .unwrap();

        let err = NativeCalls::with_exception_handler(Arc::new(ForeignExceptionHandler::new(None)))
            .call_static_object(&env, &entry, &[])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Wrapped(_)));
    }
}
