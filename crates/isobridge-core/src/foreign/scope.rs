//! Method scope for calls entering the local context
//!
//! Every entry point called by the foreign context opens a scope first. The
//! first scope builds the foreign-error call gateway, because resolving the
//! stack-overflow marker type needs a live native environment and one is
//! guaranteed to exist here.

use std::sync::Arc;

use isobridge_sdk::{NativeEnv, StackFrame};
use tracing::span::EnteredSpan;
use tracing::debug_span;

use super::callstack::FrameGuard;
use super::carrier;
use crate::calls::NativeCalls;
use crate::config;
use crate::error::BridgeResult;

/// Entry scope of one foreign-to-local call
///
/// The scope's frame is on the shadow call stack until it is dropped.
#[must_use = "the scope ends when it is dropped"]
pub struct MethodScope<'a> {
    env: &'a dyn NativeEnv,
    name: &'static str,
    calls: Option<Arc<NativeCalls>>,
    _frame: FrameGuard,
    _span: EnteredSpan,
}

impl<'a> MethodScope<'a> {
    /// Environment of the call
    pub fn env(&self) -> &'a dyn NativeEnv {
        self.env
    }

    /// Entry point name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The foreign-error call gateway, building it if it was not preloaded
    pub fn calls(&self) -> BridgeResult<Arc<NativeCalls>> {
        match &self.calls {
            Some(calls) => Ok(calls.clone()),
            None => super::foreign_calls(Some(self.env)),
        }
    }
}

/// Open the scope of entry point `name`
///
/// `name` is recorded as a frame of the local side; use a qualified
/// `Type.function` name to set the declaring part.
pub fn open_method_scope<'a>(name: &'static str, env: &'a dyn NativeEnv) -> BridgeResult<MethodScope<'a>> {
    carrier::preallocate();
    let calls = if config::current().preload_stack_overflow_type {
        Some(super::foreign_calls(Some(env))?)
    } else {
        None
    };

    let span = debug_span!("foreign_scope", entry = name).entered();
    let frame = match name.rsplit_once('.') {
        Some((declaring, function)) => StackFrame::new(declaring, function),
        None => StackFrame::new("", name),
    };
    Ok(MethodScope {
        env,
        name,
        calls,
        _frame: FrameGuard::enter(frame),
        _span: span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::callstack;
    use crate::loopback::LoopbackVm;

    #[test]
    fn test_scope_enters_frame() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let before = callstack::depth();
        {
            let scope = open_method_scope("app.Service.handle", &env).unwrap();
            assert_eq!(scope.name(), "app.Service.handle");
            let frames = callstack::capture();
            assert_eq!(frames[0].declaring, "app.Service");
            assert_eq!(frames[0].function, "handle");
            assert!(scope.calls().is_ok());
        }
        assert_eq!(callstack::depth(), before);
    }

    #[test]
    fn test_unqualified_name() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let _scope = open_method_scope("main", &env).unwrap();
        let frames = callstack::capture();
        assert_eq!(frames[0].declaring, "");
        assert_eq!(frames[0].function, "main");
    }
}
