//! Pending-error registry
//!
//! One slot per thread holding the carrier that was raised locally and has
//! not been unmarshalled yet. The slot is only consulted to merge stack
//! traces; it never crosses threads.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::carrier::ForeignError;

thread_local! {
    static PENDING: RefCell<Option<ForeignError>> = const { RefCell::new(None) };
}

/// Register `carrier` as this thread's live carrier, replacing any previous one
///
/// Only carriers that captured their local stack are ever raised locally;
/// others are ignored.
pub fn set(carrier: ForeignError) {
    debug_assert!(
        carrier.captures_local_stack(),
        "exported carriers are never pending"
    );
    if !carrier.captures_local_stack() {
        return;
    }
    PENDING.with(|slot| *slot.borrow_mut() = Some(carrier));
}

/// This thread's live carrier
pub fn get() -> Option<ForeignError> {
    PENDING.with(|slot| slot.borrow().clone())
}

/// Forget this thread's live carrier
pub fn clear() {
    let _ = PENDING.try_with(|slot| slot.borrow_mut().take());
}

/// Clears the registry when dropped, on return and on unwinding alike
#[must_use = "the registry is cleared when the guard is dropped"]
pub struct PendingGuard {
    _not_send: PhantomData<*const ()>,
}

impl PendingGuard {
    /// Create a guard for the current thread
    pub fn new() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Default for PendingGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::Direction;

    #[test]
    fn test_set_get_clear() {
        clear();
        assert!(get().is_none());

        let carrier = ForeignError::create(Some(vec![1, 2, 3]), Direction::ForeignToLocal);
        let pending = get().unwrap();
        assert!(ForeignError::ptr_eq(&pending, &carrier));

        clear();
        assert!(get().is_none());
    }

    #[test]
    fn test_second_carrier_overwrites_first() {
        let first = ForeignError::create(Some(vec![1]), Direction::ForeignToLocal);
        let second = ForeignError::create(Some(vec![2]), Direction::ForeignToLocal);

        let pending = get().unwrap();
        assert!(ForeignError::ptr_eq(&pending, &second));
        assert!(!ForeignError::ptr_eq(&pending, &first));
        clear();
    }

    #[test]
    fn test_guard_clears_on_panic() {
        let _carrier = ForeignError::create(Some(vec![9]), Direction::ForeignToLocal);
        let result = std::panic::catch_unwind(|| {
            let _guard = PendingGuard::new();
            panic!("unmarshal failed");
        });
        assert!(result.is_err());
        assert!(get().is_none());
    }

    #[test]
    fn test_registry_is_per_thread() {
        let _carrier = ForeignError::create(Some(vec![7]), Direction::ForeignToLocal);
        let seen = std::thread::spawn(|| get().is_some()).join().unwrap();
        assert!(!seen);
        assert!(get().is_some());
        clear();
    }
}
