//! Bootstrap end points of the foreign context
//!
//! These calls go through the default gateway, never through the
//! foreign-error gateway: a failure inside them must not re-enter the
//! handler that is using them.

use isobridge_sdk::{ClassHandle, NativeArg, NativeEnv, ObjectHandle};

use super::resolver::EntryPointResolver;
use crate::calls::NativeCalls;
use crate::error::BridgeResult;

/// `createForeignError(bytes) -> throwable`: builds a foreign carrier
pub static CREATE_FOREIGN_ERROR: EntryPointResolver =
    EntryPointResolver::new("createForeignError", "(bytes)throwable");

/// `toByteArray(carrier) -> bytes`: reads the payload of a foreign carrier
pub static TO_BYTE_ARRAY: EntryPointResolver =
    EntryPointResolver::new("toByteArray", "(isobridge.ForeignError)bytes");

/// `getStackOverflowErrorClass() -> class`: the stack-exhaustion marker type
pub static GET_STACK_OVERFLOW_ERROR_CLASS: EntryPointResolver =
    EntryPointResolver::new("getStackOverflowErrorClass", "()class");

pub(crate) fn call_create_foreign_error(env: &dyn NativeEnv, array: ObjectHandle) -> BridgeResult<ObjectHandle> {
    let entry = CREATE_FOREIGN_ERROR.resolve(env)?;
    NativeCalls::default_calls().call_static_object(env, &entry, &[NativeArg::Object(array)])
}

pub(crate) fn call_to_byte_array(env: &dyn NativeEnv, carrier: ObjectHandle) -> BridgeResult<ObjectHandle> {
    let entry = TO_BYTE_ARRAY.resolve(env)?;
    NativeCalls::default_calls().call_static_object(env, &entry, &[NativeArg::Object(carrier)])
}

pub(crate) fn call_get_stack_overflow_error_class(env: &dyn NativeEnv) -> BridgeResult<ClassHandle> {
    let entry = GET_STACK_OVERFLOW_ERROR_CLASS.resolve(env)?;
    let class = NativeCalls::default_calls().call_static_object(env, &entry, &[])?;
    Ok(ClassHandle::from_object(class))
}
