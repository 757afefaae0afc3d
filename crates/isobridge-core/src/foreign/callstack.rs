//! Per-thread shadow call stack
//!
//! Rust keeps no inspectable record of the frames between an entry point and
//! a boundary call, so bridge code records them explicitly: every local frame
//! that should appear in a merged trace enters a [`FrameGuard`] for its
//! duration. A carrier created on reception of a foreign failure snapshots
//! this stack.

use std::cell::RefCell;
use std::marker::PhantomData;

use isobridge_sdk::StackFrame;

thread_local! {
    static CALL_STACK: RefCell<Vec<StackFrame>> = const { RefCell::new(Vec::new()) };
}

/// Scope of one local frame on the shadow call stack
///
/// Guards must be dropped in reverse order of entry, which scoping
/// guarantees. The guard is tied to the thread that created it.
#[must_use = "the frame is popped when the guard is dropped"]
pub struct FrameGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl FrameGuard {
    /// Push `frame` as the new innermost frame
    pub fn enter(frame: StackFrame) -> Self {
        let depth = CALL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(frame);
            stack.len()
        });
        Self {
            depth,
            _not_send: PhantomData,
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown
        let _ = CALL_STACK.try_with(|stack| {
            stack.borrow_mut().truncate(self.depth - 1);
        });
    }
}

/// Snapshot of the current thread's frames, innermost first
pub fn capture() -> Vec<StackFrame> {
    CALL_STACK.with(|stack| stack.borrow().iter().rev().cloned().collect())
}

/// Number of frames currently entered on this thread
pub fn depth() -> usize {
    CALL_STACK.with(|stack| stack.borrow().len())
}
