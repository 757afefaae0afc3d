//! Opaque handles into the foreign context
//!
//! The native call interface cannot move live object graphs, only opaque
//! references and scalars. Handles are plain `u64` ids owned by the foreign
//! context; `0` is the null handle. Classes are objects too, so a
//! `ClassHandle` and an `ObjectHandle` with the same id name the same thing.

use std::fmt;

/// Reference to an object living in the foreign context
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ObjectHandle(u64);

/// Reference to a type (class) living in the foreign context
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ClassHandle(u64);

/// Reference to a callable foreign function
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct MethodHandle(u64);

macro_rules! impl_handle {
    ($ty:ident, $label:literal) => {
        impl $ty {
            /// The null handle
            pub const NULL: $ty = $ty(0);

            /// Create from a raw id
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw id
            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// Check if this is the null handle
            #[inline]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            /// Check if this is a non-null handle
            #[inline]
            pub const fn is_non_null(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, concat!($label, "(null)"))
                } else {
                    write!(f, concat!($label, "({:#x})"), self.0)
                }
            }
        }
    };
}

impl_handle!(ObjectHandle, "Object");
impl_handle!(ClassHandle, "Class");
impl_handle!(MethodHandle, "Method");

impl ClassHandle {
    /// View this class as an object reference
    #[inline]
    pub const fn as_object(self) -> ObjectHandle {
        ObjectHandle(self.0)
    }

    /// Reinterpret an object reference that is known to denote a class
    #[inline]
    pub const fn from_object(obj: ObjectHandle) -> Self {
        Self(obj.0)
    }
}

/// JValue-style positional argument for a foreign call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeArg {
    /// Object reference (may be null)
    Object(ObjectHandle),
    /// Boolean scalar
    Bool(bool),
    /// 32-bit integer scalar
    I32(i32),
    /// 64-bit integer scalar
    I64(i64),
    /// 64-bit float scalar
    F64(f64),
}

impl NativeArg {
    /// Get the object reference, if this argument is one
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            NativeArg::Object(h) => Some(*h),
            _ => None,
        }
    }
}

impl From<ObjectHandle> for NativeArg {
    fn from(h: ObjectHandle) -> Self {
        NativeArg::Object(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles() {
        assert!(ObjectHandle::NULL.is_null());
        assert!(ClassHandle::default().is_null());
        assert!(MethodHandle::from_raw(7).is_non_null());
    }

    #[test]
    fn test_class_object_share_id_space() {
        let class = ClassHandle::from_raw(42);
        assert_eq!(class.as_object(), ObjectHandle::from_raw(42));
        assert_eq!(ClassHandle::from_object(class.as_object()), class);
    }

    #[test]
    fn test_handle_debug() {
        assert_eq!(format!("{:?}", ObjectHandle::NULL), "Object(null)");
        assert_eq!(format!("{:?}", ClassHandle::from_raw(16)), "Class(0x10)");
    }

    #[test]
    fn test_native_arg_object() {
        let arg = NativeArg::from(ObjectHandle::from_raw(3));
        assert_eq!(arg.as_object(), Some(ObjectHandle::from_raw(3)));
        assert_eq!(NativeArg::I32(1).as_object(), None);
    }
}
