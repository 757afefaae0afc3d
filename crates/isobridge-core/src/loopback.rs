//! Loopback foreign context
//!
//! An in-process implementation of [`NativeEnv`] with the bootstrap end
//! points of the error protocol installed. It stands in for a foreign VM in
//! the same process: objects live in a handle table, static functions are
//! Rust closures, and failures are left pending on the calling thread's
//! environment exactly like a JNI-style native interface does.
//!
//! The bootstrap types and functions always get the same handles, so entry
//! points resolved against one loopback VM stay valid for every other one.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use isobridge_sdk::{ClassHandle, MethodHandle, NativeArg, NativeEnv, ObjectHandle, StackFrame};
use parking_lot::RwLock;

use crate::foreign::{ENTRY_POINTS_CLASS, FOREIGN_ERROR_CLASS};

/// Type name of the loopback stack-exhaustion marker
pub const STACK_OVERFLOW_ERROR_CLASS: &str = "isobridge.StackOverflowError";

/// Type name of the failure raised for an unknown function
pub const NO_SUCH_METHOD_ERROR_CLASS: &str = "isobridge.NoSuchMethodError";

const CLASS_CLASS: &str = "isobridge.Class";
const BYTE_ARRAY_CLASS: &str = "isobridge.ByteArray";

// Fixed handles of the bootstrap types
const ENTRY_POINTS_ID: u64 = 1;
const FOREIGN_ERROR_ID: u64 = 2;
const STACK_OVERFLOW_ERROR_ID: u64 = 3;
const NO_SUCH_METHOD_ERROR_ID: u64 = 4;
const CLASS_ID: u64 = 5;
const BYTE_ARRAY_ID: u64 = 6;

// Fixed handles of the bootstrap functions
const CREATE_FOREIGN_ERROR_ID: u64 = 1;
const TO_BYTE_ARRAY_ID: u64 = 2;
const GET_STACK_OVERFLOW_ERROR_CLASS_ID: u64 = 3;

const FIRST_DYNAMIC_ID: u64 = 16;

type StaticFn = Arc<dyn Fn(&LoopbackEnv, &[NativeArg]) -> ObjectHandle + Send + Sync>;

enum LoopbackObject {
    Class {
        name: String,
    },
    Throwable {
        class: ClassHandle,
        message: Option<String>,
        stack: Vec<StackFrame>,
        payload: Option<Vec<u8>>,
    },
    ByteArray(Vec<u8>),
}

struct StaticMethod {
    class: ClassHandle,
    name: String,
    signature: String,
    body: StaticFn,
}

/// Shared state of one loopback foreign context
pub struct LoopbackVm {
    objects: RwLock<HashMap<u64, LoopbackObject>>,
    class_names: RwLock<HashMap<String, ClassHandle>>,
    methods: RwLock<HashMap<u64, StaticMethod>>,
    next_object: AtomicU64,
    next_method: AtomicU64,
    method_lookups: AtomicUsize,
    global_refs: AtomicUsize,
}

impl LoopbackVm {
    /// Create a context with the bootstrap end points installed
    pub fn new() -> Arc<Self> {
        let vm = Self {
            objects: RwLock::new(HashMap::new()),
            class_names: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
            next_object: AtomicU64::new(FIRST_DYNAMIC_ID),
            next_method: AtomicU64::new(FIRST_DYNAMIC_ID),
            method_lookups: AtomicUsize::new(0),
            global_refs: AtomicUsize::new(0),
        };

        for (id, name) in [
            (ENTRY_POINTS_ID, ENTRY_POINTS_CLASS),
            (FOREIGN_ERROR_ID, FOREIGN_ERROR_CLASS),
            (STACK_OVERFLOW_ERROR_ID, STACK_OVERFLOW_ERROR_CLASS),
            (NO_SUCH_METHOD_ERROR_ID, NO_SUCH_METHOD_ERROR_CLASS),
            (CLASS_ID, CLASS_CLASS),
            (BYTE_ARRAY_ID, BYTE_ARRAY_CLASS),
        ] {
            vm.insert_class(ClassHandle::from_raw(id), name);
        }

        let entry_points = ClassHandle::from_raw(ENTRY_POINTS_ID);
        vm.insert_method(
            CREATE_FOREIGN_ERROR_ID,
            entry_points,
            "createForeignError",
            "(bytes)throwable",
            Arc::new(|env: &LoopbackEnv, args: &[NativeArg]| {
                let array = args.first().and_then(NativeArg::as_object).unwrap_or_default();
                let payload = if array.is_null() {
                    None
                } else {
                    Some(env.byte_array_contents(array))
                };
                env.vm.alloc(LoopbackObject::Throwable {
                    class: ClassHandle::from_raw(FOREIGN_ERROR_ID),
                    message: None,
                    stack: Vec::new(),
                    payload,
                })
            }),
        );
        vm.insert_method(
            TO_BYTE_ARRAY_ID,
            entry_points,
            "toByteArray",
            "(isobridge.ForeignError)bytes",
            Arc::new(|env: &LoopbackEnv, args: &[NativeArg]| {
                let carrier = args.first().and_then(NativeArg::as_object).unwrap_or_default();
                let payload = match env.vm.objects.read().get(&carrier.raw()) {
                    Some(LoopbackObject::Throwable { payload, .. }) => payload.clone(),
                    _ => None,
                };
                match payload {
                    Some(bytes) => env.new_byte_array(&bytes),
                    None => ObjectHandle::NULL,
                }
            }),
        );
        vm.insert_method(
            GET_STACK_OVERFLOW_ERROR_CLASS_ID,
            entry_points,
            "getStackOverflowErrorClass",
            "()class",
            Arc::new(|_: &LoopbackEnv, _: &[NativeArg]| {
                ClassHandle::from_raw(STACK_OVERFLOW_ERROR_ID).as_object()
            }),
        );

        Arc::new(vm)
    }

    /// Attach the current thread, returning its environment
    pub fn attach(self: &Arc<Self>) -> LoopbackEnv {
        LoopbackEnv {
            vm: self.clone(),
            pending: Cell::new(None),
        }
    }

    /// Define a new type
    ///
    /// Every call creates a distinct type. Lookup by name finds the first
    /// type defined under that name.
    pub fn define_class(&self, name: &str) -> ClassHandle {
        let class = ClassHandle::from_raw(self.next_object.fetch_add(1, Ordering::Relaxed));
        self.insert_class(class, name);
        class
    }

    /// Register a static function on `class`
    pub fn register_static<F>(&self, class: ClassHandle, name: &str, signature: &str, body: F) -> MethodHandle
    where
        F: Fn(&LoopbackEnv, &[NativeArg]) -> ObjectHandle + Send + Sync + 'static,
    {
        let id = self.next_method.fetch_add(1, Ordering::Relaxed);
        self.insert_method(id, class, name, signature, Arc::new(body));
        MethodHandle::from_raw(id)
    }

    /// Number of function lookups served so far
    pub fn method_lookups(&self) -> usize {
        self.method_lookups.load(Ordering::SeqCst)
    }

    /// Number of global references handed out so far
    pub fn global_refs(&self) -> usize {
        self.global_refs.load(Ordering::SeqCst)
    }

    /// Number of live objects, types included
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// The stack-exhaustion marker type
    pub fn stack_overflow_error_class(&self) -> ClassHandle {
        ClassHandle::from_raw(STACK_OVERFLOW_ERROR_ID)
    }

    /// The foreign carrier type
    pub fn foreign_error_class(&self) -> ClassHandle {
        ClassHandle::from_raw(FOREIGN_ERROR_ID)
    }

    fn insert_class(&self, class: ClassHandle, name: &str) {
        self.objects.write().insert(
            class.raw(),
            LoopbackObject::Class {
                name: name.to_string(),
            },
        );
        self.class_names
            .write()
            .entry(name.to_string())
            .or_insert(class);
    }

    fn insert_method(&self, id: u64, class: ClassHandle, name: &str, signature: &str, body: StaticFn) {
        self.methods.write().insert(
            id,
            StaticMethod {
                class,
                name: name.to_string(),
                signature: signature.to_string(),
                body,
            },
        );
    }

    fn alloc(&self, object: LoopbackObject) -> ObjectHandle {
        let id = self.next_object.fetch_add(1, Ordering::Relaxed);
        self.objects.write().insert(id, object);
        ObjectHandle::from_raw(id)
    }
}

impl fmt::Debug for LoopbackVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackVm")
            .field("objects", &self.objects.read().len())
            .field("methods", &self.methods.read().len())
            .finish()
    }
}

/// Per-thread environment of a [`LoopbackVm`]
pub struct LoopbackEnv {
    vm: Arc<LoopbackVm>,
    pending: Cell<Option<ObjectHandle>>,
}

impl LoopbackEnv {
    /// The context this environment is attached to
    pub fn vm(&self) -> &Arc<LoopbackVm> {
        &self.vm
    }

    /// Allocate a throwable of type `class`
    pub fn new_throwable(&self, class: ClassHandle, message: Option<&str>, stack: Vec<StackFrame>) -> ObjectHandle {
        self.vm.alloc(LoopbackObject::Throwable {
            class,
            message: message.map(str::to_string),
            stack,
            payload: None,
        })
    }

    /// Allocate a throwable of type `class` and make it pending
    pub fn throw_new(&self, class: ClassHandle, message: Option<&str>, stack: Vec<StackFrame>) {
        let throwable = self.new_throwable(class, message, stack);
        self.throw(throwable);
    }

    /// Raise a foreign carrier holding `payload`
    pub fn throw_foreign_error(&self, payload: Option<&[u8]>) {
        let throwable = self.vm.alloc(LoopbackObject::Throwable {
            class: self.vm.foreign_error_class(),
            message: None,
            stack: Vec::new(),
            payload: payload.map(<[u8]>::to_vec),
        });
        self.throw(throwable);
    }
}

impl fmt::Debug for LoopbackEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackEnv")
            .field("pending", &self.pending.get())
            .finish()
    }
}

impl NativeEnv for LoopbackEnv {
    fn find_class(&self, name: &str) -> Option<ClassHandle> {
        self.vm.class_names.read().get(name).copied()
    }

    fn get_static_method_id(&self, class: ClassHandle, name: &str, signature: &str) -> Option<MethodHandle> {
        self.vm.method_lookups.fetch_add(1, Ordering::SeqCst);
        self.vm
            .methods
            .read()
            .iter()
            .find(|(_, m)| m.class == class && m.name == name && m.signature == signature)
            .map(|(id, _)| MethodHandle::from_raw(*id))
    }

    fn new_global_ref(&self, obj: ObjectHandle) -> ObjectHandle {
        self.vm.global_refs.fetch_add(1, Ordering::SeqCst);
        obj
    }

    fn delete_local_ref(&self, obj: ObjectHandle) {
        let mut objects = self.vm.objects.write();
        if !matches!(objects.get(&obj.raw()), Some(LoopbackObject::Class { .. })) {
            objects.remove(&obj.raw());
        }
    }

    fn call_static_object_method(&self, class: ClassHandle, method: MethodHandle, args: &[NativeArg]) -> ObjectHandle {
        let body = self
            .vm
            .methods
            .read()
            .get(&method.raw())
            .filter(|m| m.class == class)
            .map(|m| m.body.clone());
        match body {
            Some(body) => body(self, args),
            None => {
                self.throw_new(
                    ClassHandle::from_raw(NO_SUCH_METHOD_ERROR_ID),
                    Some(&format!("{:?} on {:?}", method, class)),
                    Vec::new(),
                );
                ObjectHandle::NULL
            }
        }
    }

    fn exception_occurred(&self) -> Option<ObjectHandle> {
        self.pending.get()
    }

    fn exception_clear(&self) {
        self.pending.set(None);
    }

    fn throw(&self, throwable: ObjectHandle) {
        self.pending.set(Some(throwable));
    }

    fn get_object_class(&self, obj: ObjectHandle) -> ClassHandle {
        match self.vm.objects.read().get(&obj.raw()) {
            Some(LoopbackObject::Class { .. }) => ClassHandle::from_raw(CLASS_ID),
            Some(LoopbackObject::Throwable { class, .. }) => *class,
            Some(LoopbackObject::ByteArray(_)) => ClassHandle::from_raw(BYTE_ARRAY_ID),
            None => ClassHandle::NULL,
        }
    }

    fn is_same_object(&self, a: ObjectHandle, b: ObjectHandle) -> bool {
        a == b
    }

    fn class_name(&self, class: ClassHandle) -> String {
        match self.vm.objects.read().get(&class.raw()) {
            Some(LoopbackObject::Class { name }) => name.clone(),
            _ => String::new(),
        }
    }

    fn throwable_message(&self, throwable: ObjectHandle) -> Option<String> {
        match self.vm.objects.read().get(&throwable.raw()) {
            Some(LoopbackObject::Throwable { message, .. }) => message.clone(),
            _ => None,
        }
    }

    fn throwable_stack_trace(&self, throwable: ObjectHandle) -> Vec<StackFrame> {
        match self.vm.objects.read().get(&throwable.raw()) {
            Some(LoopbackObject::Throwable { stack, .. }) => stack.clone(),
            _ => Vec::new(),
        }
    }

    fn new_byte_array(&self, bytes: &[u8]) -> ObjectHandle {
        self.vm.alloc(LoopbackObject::ByteArray(bytes.to_vec()))
    }

    fn byte_array_contents(&self, array: ObjectHandle) -> Vec<u8> {
        match self.vm.objects.read().get(&array.raw()) {
            Some(LoopbackObject::ByteArray(bytes)) => bytes.clone(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_types() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let endpoints = env.find_class(ENTRY_POINTS_CLASS).unwrap();
        assert_eq!(env.class_name(endpoints), ENTRY_POINTS_CLASS);
        assert_eq!(env.find_class(STACK_OVERFLOW_ERROR_CLASS), Some(vm.stack_overflow_error_class()));
        assert_eq!(env.get_object_class(endpoints.as_object()), env.find_class(CLASS_CLASS).unwrap());
        assert!(env.find_class("app.Missing").is_none());
    }

    #[test]
    fn test_bootstrap_handles_are_stable() {
        let a = LoopbackVm::new().attach();
        let b = LoopbackVm::new().attach();
        let class = a.find_class(ENTRY_POINTS_CLASS).unwrap();
        assert_eq!(Some(class), b.find_class(ENTRY_POINTS_CLASS));
        assert_eq!(
            a.get_static_method_id(class, "toByteArray", "(isobridge.ForeignError)bytes"),
            b.get_static_method_id(class, "toByteArray", "(isobridge.ForeignError)bytes"),
        );
    }

    #[test]
    fn test_create_and_read_foreign_error() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let class = env.find_class(ENTRY_POINTS_CLASS).unwrap();
        let create = env
            .get_static_method_id(class, "createForeignError", "(bytes)throwable")
            .unwrap();
        let to_bytes = env
            .get_static_method_id(class, "toByteArray", "(isobridge.ForeignError)bytes")
            .unwrap();

        let array = env.new_byte_array(&[1, 2, 3]);
        let carrier = env.call_static_object_method(class, create, &[array.into()]);
        assert_eq!(env.class_name(env.get_object_class(carrier)), FOREIGN_ERROR_CLASS);

        let bytes = env.call_static_object_method(class, to_bytes, &[carrier.into()]);
        assert_eq!(env.byte_array_contents(bytes), vec![1, 2, 3]);

        let empty = env.call_static_object_method(class, create, &[ObjectHandle::NULL.into()]);
        let none = env.call_static_object_method(class, to_bytes, &[empty.into()]);
        assert!(none.is_null());
        assert!(env.exception_occurred().is_none());
    }

    #[test]
    fn test_unknown_method_is_pending_failure() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let result = env.call_static_object_method(
            ClassHandle::from_raw(ENTRY_POINTS_ID),
            MethodHandle::from_raw(999),
            &[],
        );
        assert!(result.is_null());

        let throwable = env.exception_occurred().unwrap();
        assert_eq!(env.class_name(env.get_object_class(throwable)), NO_SUCH_METHOD_ERROR_CLASS);
        env.exception_clear();
        assert!(env.exception_occurred().is_none());
    }

    #[test]
    fn test_define_class_same_name_is_distinct() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let lookalike = vm.define_class(STACK_OVERFLOW_ERROR_CLASS);
        assert_ne!(lookalike, vm.stack_overflow_error_class());
        assert_eq!(env.class_name(lookalike), STACK_OVERFLOW_ERROR_CLASS);
        assert_eq!(env.find_class(STACK_OVERFLOW_ERROR_CLASS), Some(vm.stack_overflow_error_class()));
    }

    #[test]
    fn test_pending_failure_is_per_env() {
        let vm = LoopbackVm::new();
        let first = vm.attach();
        let second = vm.attach();
        first.throw_new(vm.stack_overflow_error_class(), Some("deep"), Vec::new());
        assert!(first.exception_occurred().is_some());
        assert!(second.exception_occurred().is_none());
        assert_eq!(first.throwable_message(first.exception_occurred().unwrap()).as_deref(), Some("deep"));
    }

    #[test]
    fn test_delete_local_ref() {
        let vm = LoopbackVm::new();
        let env = vm.attach();
        let before = vm.object_count();

        let array = env.new_byte_array(&[1, 2]);
        assert_eq!(vm.object_count(), before + 1);
        env.delete_local_ref(array);
        assert_eq!(vm.object_count(), before);
        assert!(env.byte_array_contents(array).is_empty());

        // Types and null stay untouched
        env.delete_local_ref(vm.stack_overflow_error_class().as_object());
        env.delete_local_ref(ObjectHandle::NULL);
        assert_eq!(vm.object_count(), before);
        assert_eq!(env.class_name(vm.stack_overflow_error_class()), STACK_OVERFLOW_ERROR_CLASS);
    }
}
