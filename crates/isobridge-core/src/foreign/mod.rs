//! Foreign error propagation
//!
//! A failure in one context reaches the other as a [`ForeignError`]: an
//! opaque byte payload produced by a [`BinaryMarshaller`]. The receiving
//! side keeps the carrier pending on its thread until the original error is
//! reconstructed with [`ForeignError::throw_original_error`], which merges
//! the stack traces of both sides.
//!
//! [`BinaryMarshaller`]: isobridge_sdk::BinaryMarshaller

pub mod callstack;
pub mod carrier;
pub mod endpoints;
pub mod handler;
pub mod merge;
pub mod pending;
pub mod resolver;
pub mod scope;
pub mod throwable;

use std::sync::Arc;

use isobridge_sdk::{ClassHandle, NativeEnv};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::calls::NativeCalls;
use crate::error::BridgeResult;

pub use carrier::{Direction, ForeignError, FOREIGN_ERROR_CLASS};
pub use handler::{FailureKind, ForeignExceptionHandler};
pub use merge::{merge_stack_trace, DirectMerger, ProcessMerger, StackMerger};
pub use resolver::{ClassResolver, EntryPoint, EntryPointResolver, ENTRY_POINTS_CLASS};
pub use scope::{open_method_scope, MethodScope};
pub use throwable::{DefaultThrowableMarshaller, RemoteError};

static FOREIGN_CALLS: OnceCell<Arc<NativeCalls>> = OnceCell::new();
static FOREIGN_CALLS_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// The call gateway that raises foreign carriers as [`ForeignError`]s
///
/// Built once per process. Building it resolves the stack-overflow marker
/// type, which needs `env`; without one a gateway that cannot detect stack
/// exhaustion is returned and nothing is cached.
pub fn foreign_calls(env: Option<&dyn NativeEnv>) -> BridgeResult<Arc<NativeCalls>> {
    if let Some(calls) = FOREIGN_CALLS.get() {
        return Ok(calls.clone());
    }
    let Some(env) = env else {
        return Ok(Arc::new(NativeCalls::with_exception_handler(Arc::new(
            ForeignExceptionHandler::new(None),
        ))));
    };

    let _lock = FOREIGN_CALLS_LOCK.lock();
    if let Some(calls) = FOREIGN_CALLS.get() {
        return Ok(calls.clone());
    }
    let calls = create_foreign_calls(env)?;
    let _ = FOREIGN_CALLS.set(calls.clone());
    Ok(calls)
}

fn create_foreign_calls(env: &dyn NativeEnv) -> BridgeResult<Arc<NativeCalls>> {
    let class = endpoints::call_get_stack_overflow_error_class(env)?;
    let marker = if class.is_null() {
        None
    } else {
        Some(ClassHandle::from_object(env.new_global_ref(class.as_object())))
    };
    debug!(marker = marker.is_some(), "created foreign-error call gateway");
    Ok(Arc::new(NativeCalls::with_exception_handler(Arc::new(
        ForeignExceptionHandler::new(marker),
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackVm;

    #[test]
    fn test_foreign_calls_is_cached() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let first = foreign_calls(Some(&env as &dyn NativeEnv)).unwrap();
        let second = foreign_calls(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
