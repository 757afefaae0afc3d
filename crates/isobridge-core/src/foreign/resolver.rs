//! Lazy resolution of the bootstrap entry points
//!
//! The foreign context exposes a handful of static functions the protocol
//! itself needs. Each is looked up at most once per process: the first
//! caller resolves it under a process-wide lock, every later caller reads
//! the published handles without locking. Declaring types are cached the
//! same way, so resolvers on one type share a single global reference.

use std::fmt;

use isobridge_sdk::{ClassHandle, MethodHandle, NativeEnv};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

/// Foreign type that declares the bootstrap functions
pub const ENTRY_POINTS_CLASS: &str = "isobridge.ForeignErrorEndPoints";

static RESOLVE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Resolved `(declaring type, callable)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    class: ClassHandle,
    method: MethodHandle,
    declaring: &'static str,
    name: &'static str,
}

impl EntryPoint {
    /// Create an entry point from resolved handles
    pub fn new(class: ClassHandle, method: MethodHandle, declaring: &'static str, name: &'static str) -> Self {
        Self {
            class,
            method,
            declaring,
            name,
        }
    }

    /// Declaring type handle (a global reference)
    pub fn class(&self) -> ClassHandle {
        self.class
    }

    /// Callable handle
    pub fn method(&self) -> MethodHandle {
        self.method
    }

    /// Name of the declaring type
    pub fn declaring(&self) -> &'static str {
        self.declaring
    }

    /// Function name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One lazily resolved foreign type, held as a global reference
///
/// The reference is created once and shared by every resolver pointing at
/// this type, whether or not their function lookups succeed.
pub struct ClassResolver {
    name: &'static str,
    resolved: OnceCell<ClassHandle>,
}

impl ClassResolver {
    /// Resolver for the type called `name`
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            resolved: OnceCell::new(),
        }
    }

    /// Type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type handle, if already resolved
    pub fn get(&self) -> Option<ClassHandle> {
        self.resolved.get().copied()
    }

    /// Resolve the type, creating its global reference at most once
    pub fn resolve(&self, env: &dyn NativeEnv) -> BridgeResult<ClassHandle> {
        if let Some(class) = self.resolved.get() {
            return Ok(*class);
        }
        let _lock = RESOLVE_LOCK.lock();
        self.resolve_locked(env)
    }

    // Caller holds RESOLVE_LOCK
    fn resolve_locked(&self, env: &dyn NativeEnv) -> BridgeResult<ClassHandle> {
        if let Some(class) = self.resolved.get() {
            return Ok(*class);
        }
        let class = env
            .find_class(self.name)
            .ok_or_else(|| BridgeError::EntryPointsClassNotFound {
                class: self.name.to_string(),
            })?;
        let class = ClassHandle::from_object(env.new_global_ref(class.as_object()));
        debug!(class = self.name, "resolved entry point type");
        let _ = self.resolved.set(class);
        Ok(class)
    }
}

impl fmt::Debug for ClassResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassResolver")
            .field("name", &self.name)
            .field("resolved", &self.get())
            .finish()
    }
}

static ENTRY_POINTS: ClassResolver = ClassResolver::new(ENTRY_POINTS_CLASS);

enum ClassSource {
    EntryPoints,
    Shared(&'static ClassResolver),
    Own(ClassResolver),
}

impl ClassSource {
    fn resolver(&self) -> &ClassResolver {
        match self {
            ClassSource::EntryPoints => &ENTRY_POINTS,
            ClassSource::Shared(resolver) => resolver,
            ClassSource::Own(resolver) => resolver,
        }
    }
}

/// One lazily resolved entry point
pub struct EntryPointResolver {
    class: ClassSource,
    name: &'static str,
    signature: &'static str,
    resolved: OnceCell<EntryPoint>,
}

impl EntryPointResolver {
    /// Resolver for a function on [`ENTRY_POINTS_CLASS`]
    ///
    /// All such resolvers share one reference to the declaring type.
    pub const fn new(name: &'static str, signature: &'static str) -> Self {
        Self::from_source(ClassSource::EntryPoints, name, signature)
    }

    /// Resolver for a function on another type
    pub const fn in_class(class_name: &'static str, name: &'static str, signature: &'static str) -> Self {
        Self::from_source(ClassSource::Own(ClassResolver::new(class_name)), name, signature)
    }

    /// Resolver for a function on a type shared with other resolvers
    pub const fn with_class(class: &'static ClassResolver, name: &'static str, signature: &'static str) -> Self {
        Self::from_source(ClassSource::Shared(class), name, signature)
    }

    const fn from_source(class: ClassSource, name: &'static str, signature: &'static str) -> Self {
        Self {
            class,
            name,
            signature,
            resolved: OnceCell::new(),
        }
    }

    /// Function name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Function signature
    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// The entry point, if already resolved
    pub fn get(&self) -> Option<EntryPoint> {
        self.resolved.get().copied()
    }

    /// Resolve the entry point, looking it up at most once
    ///
    /// A failed function lookup publishes no entry point; it means the
    /// foreign side was built against a different protocol version. The
    /// declaring type stays cached either way.
    pub fn resolve(&self, env: &dyn NativeEnv) -> BridgeResult<EntryPoint> {
        if let Some(entry) = self.resolved.get() {
            return Ok(*entry);
        }

        let _lock = RESOLVE_LOCK.lock();
        if let Some(entry) = self.resolved.get() {
            return Ok(*entry);
        }

        let entry = self.lookup(env)?;
        debug!(
            class = entry.declaring(),
            name = self.name,
            signature = self.signature,
            "resolved entry point"
        );
        // The lock serializes writers, so the cell is still empty here
        let _ = self.resolved.set(entry);
        Ok(entry)
    }

    fn lookup(&self, env: &dyn NativeEnv) -> BridgeResult<EntryPoint> {
        let declaring = self.class.resolver();
        let class = declaring.resolve_locked(env)?;
        let method = env
            .get_static_method_id(class, self.name, self.signature)
            .ok_or_else(|| BridgeError::EntryPointNotFound {
                name: self.name.to_string(),
                signature: self.signature.to_string(),
            })?;
        Ok(EntryPoint::new(class, method, declaring.name(), self.name))
    }
}

impl fmt::Debug for EntryPointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointResolver")
            .field("class", &self.class.resolver().name())
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("resolved", &self.get())
            .finish()
    }
}
