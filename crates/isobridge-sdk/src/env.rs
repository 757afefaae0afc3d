//! NativeEnv trait - the narrow native call interface
//!
//! Everything the bridge knows about the foreign context goes through this
//! trait: type and function lookup, static calls, pending-failure inspection
//! and byte-array transfer. The shape follows a JNI-style environment: one
//! environment per attached thread, opaque handles, and failures reported
//! as a *pending* throwable rather than a return value.

use crate::frame::StackFrame;
use crate::handle::{ClassHandle, MethodHandle, NativeArg, ObjectHandle};

/// Abstract native environment of the foreign context for the current thread.
pub trait NativeEnv {
    // ========================================================================
    // Lookup
    // ========================================================================

    /// Find a type by its fully qualified name
    fn find_class(&self, name: &str) -> Option<ClassHandle>;

    /// Find a static function on `class` by name and signature
    fn get_static_method_id(
        &self,
        class: ClassHandle,
        name: &str,
        signature: &str,
    ) -> Option<MethodHandle>;

    /// Promote a local reference to one that stays valid across calls
    fn new_global_ref(&self, obj: ObjectHandle) -> ObjectHandle;

    /// Release a local reference the caller no longer needs
    ///
    /// Null handles are ignored. References to types are never released.
    fn delete_local_ref(&self, obj: ObjectHandle);

    // ========================================================================
    // Calls and failures
    // ========================================================================

    /// Invoke a static function returning an object
    ///
    /// If the callee fails, the return value is null and the failure is
    /// left pending; check it with [`NativeEnv::exception_occurred`].
    fn call_static_object_method(
        &self,
        class: ClassHandle,
        method: MethodHandle,
        args: &[NativeArg],
    ) -> ObjectHandle;

    /// The pending throwable, if any
    fn exception_occurred(&self) -> Option<ObjectHandle>;

    /// Discard the pending throwable
    fn exception_clear(&self);

    /// Make `throwable` the pending failure of the foreign context
    fn throw(&self, throwable: ObjectHandle);

    // ========================================================================
    // Type inspection
    // ========================================================================

    /// Runtime type of an object
    fn get_object_class(&self, obj: ObjectHandle) -> ClassHandle;

    /// Reference identity
    fn is_same_object(&self, a: ObjectHandle, b: ObjectHandle) -> bool;

    /// Fully qualified name of a type
    fn class_name(&self, class: ClassHandle) -> String;

    // ========================================================================
    // Throwable inspection
    // ========================================================================

    /// Message of a foreign throwable
    fn throwable_message(&self, throwable: ObjectHandle) -> Option<String>;

    /// Stack trace of a foreign throwable, innermost first
    fn throwable_stack_trace(&self, throwable: ObjectHandle) -> Vec<StackFrame>;

    // ========================================================================
    // Byte arrays
    // ========================================================================

    /// Allocate a foreign byte array holding a copy of `bytes`
    fn new_byte_array(&self, bytes: &[u8]) -> ObjectHandle;

    /// Copy the contents of a foreign byte array (empty for null)
    fn byte_array_contents(&self, array: ObjectHandle) -> Vec<u8>;
}
