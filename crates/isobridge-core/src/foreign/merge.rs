//! Stack trace merging
//!
//! Combines the frames of a reconstructed foreign error with the local frames
//! captured by this thread's pending carrier, so the trace reads as one call
//! chain across the boundary. Frames are ordered innermost first.

use isobridge_sdk::{Isolate, IsolateKind, StackFrame};
use tracing::{trace, warn};

use super::carrier::Direction;
use super::pending;

/// Strategy for combining local and foreign frames
pub trait StackMerger {
    /// Merge `foreign` with `local`, ordered by `direction`
    fn merge(&self, local: &[StackFrame], foreign: &[StackFrame], direction: Direction) -> Vec<StackFrame>;
}

/// Merger for a foreign context inside this process
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectMerger;

impl StackMerger for DirectMerger {
    fn merge(&self, local: &[StackFrame], foreign: &[StackFrame], direction: Direction) -> Vec<StackFrame> {
        splice(local, foreign, direction)
    }
}

/// Merger for a foreign context in a separate OS process
///
/// Frames from another process may arrive as bare instruction addresses.
/// Those are resolved through the isolate's symbolizer before splicing.
pub struct ProcessMerger<'a> {
    isolate: &'a Isolate,
}

impl<'a> ProcessMerger<'a> {
    /// Create a merger for `isolate`
    pub fn new(isolate: &'a Isolate) -> Self {
        Self { isolate }
    }
}

impl StackMerger for ProcessMerger<'_> {
    fn merge(&self, local: &[StackFrame], foreign: &[StackFrame], direction: Direction) -> Vec<StackFrame> {
        match self.isolate.symbolizer() {
            Some(symbolizer) => {
                let resolved: Vec<StackFrame> = foreign
                    .iter()
                    .map(|frame| {
                        if frame.is_unresolved() {
                            symbolizer.symbolize(frame)
                        } else {
                            frame.clone()
                        }
                    })
                    .collect();
                splice(local, &resolved, direction)
            }
            None => splice(local, foreign, direction),
        }
    }
}

/// Concatenate two traces in boundary order
///
/// A failure that went local to foreign was raised deeper than the local
/// frames, so the foreign frames come first; the other way round the local
/// frames are the inner ones.
pub(crate) fn splice(local: &[StackFrame], foreign: &[StackFrame], direction: Direction) -> Vec<StackFrame> {
    let (inner, outer) = match direction {
        Direction::LocalToForeign => (foreign, local),
        Direction::ForeignToLocal | Direction::Undefined => (local, foreign),
    };
    let mut merged = Vec::with_capacity(inner.len() + outer.len());
    merged.extend_from_slice(inner);
    merged.extend_from_slice(outer);
    merged
}

/// Merge `foreign` with the local frames of this thread's pending carrier
///
/// Returns `foreign` unchanged when it is empty or when no carrier is
/// pending.
pub fn merge_stack_trace(isolate: &Isolate, foreign: &[StackFrame]) -> Vec<StackFrame> {
    if foreign.is_empty() {
        return Vec::new();
    }
    let Some(carrier) = pending::get() else {
        return foreign.to_vec();
    };
    let direction = carrier.direction();
    if direction == Direction::Undefined {
        warn!("pending carrier has no direction, keeping foreign trace");
        return foreign.to_vec();
    }

    trace!(kind = %isolate.kind(), ?direction, "merging stack traces");
    let local = carrier.stack_trace();
    match isolate.kind() {
        IsolateKind::Native | IsolateKind::Host => DirectMerger.merge(local, foreign, direction),
        IsolateKind::Process => ProcessMerger::new(isolate).merge(local, foreign, direction),
    }
}
