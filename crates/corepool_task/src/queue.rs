//! A bounded, lock-free, array-backed MPMC queue using per-slot sequence
//! numbers (Vyukov-style) rather than the lap/stamp encoding.
//!
//! Each slot carries a single atomic `sequence` that encodes both occupancy
//! and generation: for slot index `i` in a capacity-`C` ring,
//! `sequence == i` means the slot is empty and ready for the producer
//! claiming position `i`; `sequence == i + 1` means full and ready for the
//! consumer claiming position `i`.

use core::cell::UnsafeCell;
use core::fmt;
use core::mem::{self, MaybeUninit};
use core::sync::atomic::{AtomicUsize, Ordering};

use corepool_os::utils::{Backoff, CachePadded};

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded, lock-free, multi-producer multi-consumer queue.
///
/// Capacity must be a power of two (so that `index & mask` replaces a
/// modulo), fixed at construction. `push`/`pop` never allocate and never
/// block; a full/empty observation is a clean `false`/`None`.
pub struct RingQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

#[expect(unsafe_code, reason = "slots are only ever aliased through the push/pop CAS protocol")]
unsafe impl<T: Send> Send for RingQueue<T> {}
#[expect(unsafe_code, reason = "slots are only ever aliased through the push/pop CAS protocol")]
unsafe impl<T: Send> Sync for RingQueue<T> {}

impl<T> RingQueue<T> {
    /// Creates a new queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two, or is less than 2.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring queue capacity must be at least 2");
        assert!(capacity.is_power_of_two(), "ring queue capacity must be a power of two");

        let buffer: Box<[Slot<T>]> = (0..capacity)
            .map(|i| Slot { sequence: AtomicUsize::new(i), value: UnsafeCell::new(MaybeUninit::uninit()) })
            .collect();

        Self {
            buffer,
            mask: capacity - 1,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Capacity of the queue, as given at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Attempts to enqueue `value`.
    ///
    /// On success returns `Ok(())`. If the queue was observed full at the
    /// claim point, returns `Err(value)` so the caller retains ownership.
    /// The queue never silently drops a rejected value.
    ///
    /// Safe to call concurrently from multiple producer threads.
    pub fn push(&self, value: T) -> Result<(), T> {
        let backoff = Backoff::new();
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);

        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        #[expect(unsafe_code, reason = "slot was exclusively claimed by the CAS above")]
                        unsafe {
                            (*slot.value.get()).write(value);
                        }
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(cur) => {
                        pos = cur;
                        backoff.spin();
                    }
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
                backoff.spin();
            }
        }
    }

    /// Attempts to dequeue one value.
    ///
    /// Returns `None` iff the queue was observed empty at the claim point.
    ///
    /// Safe to call concurrently from multiple consumer threads, used here
    /// by the owning worker and its occasional stealing peer.
    pub fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);

        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos.wrapping_add(1)) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        #[expect(unsafe_code, reason = "slot was exclusively claimed by the CAS above")]
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence.store(pos.wrapping_add(self.buffer.len()), Ordering::Release);
                        return Some(value);
                    }
                    Err(cur) => {
                        pos = cur;
                        backoff.spin();
                    }
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
                backoff.spin();
            }
        }
    }

    /// Returns `true` if the queue holds no values.
    ///
    /// Racy under concurrent access, intended for diagnostics, not
    /// coordination.
    pub fn is_empty(&self) -> bool {
        let enqueue = self.enqueue_pos.load(Ordering::SeqCst);
        let dequeue = self.dequeue_pos.load(Ordering::SeqCst);
        enqueue == dequeue
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        if mem::needs_drop::<T>() {
            while self.pop().is_some() {}
        }
    }
}

impl<T> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("RingQueue { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::RingQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::scope;
    use std::vec::Vec;

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_capacity() {
        let _ = RingQueue::<i32>::new(3);
    }

    #[test]
    fn smoke() {
        let q = RingQueue::new(2);
        q.push(7).unwrap();
        assert_eq!(q.pop(), Some(7));
        q.push(8).unwrap();
        assert_eq!(q.pop(), Some(8));
        assert!(q.pop().is_none());
    }

    /// S1, queue basic (capacity 2, single thread).
    #[test]
    fn s1_queue_basic() {
        let q = RingQueue::new(2);

        assert_eq!(q.pop(), None);
        assert_eq!(q.push(1), Ok(()));
        assert_eq!(q.push(2), Ok(()));
        assert_eq!(q.push(3), Err(3));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
        assert_eq!(q.push(3), Ok(()));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn capacity_is_reported() {
        for shift in 1..6 {
            let cap = 1usize << shift;
            let q = RingQueue::<i32>::new(cap);
            assert_eq!(q.capacity(), cap);
        }
    }

    #[test]
    fn is_empty_tracks_state() {
        let q = RingQueue::new(2);
        assert!(q.is_empty());
        q.push(()).unwrap();
        assert!(!q.is_empty());
        q.pop().unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn full_push_returns_value_back() {
        let q = RingQueue::new(2);
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.push(3), Err(3));
    }

    #[test]
    fn spsc() {
        #[cfg(miri)]
        const COUNT: usize = 50;
        #[cfg(not(miri))]
        const COUNT: usize = 100_000;

        let q = RingQueue::new(4);

        scope(|scope| {
            scope.spawn(|| {
                for i in 0..COUNT {
                    loop {
                        if let Some(x) = q.pop() {
                            assert_eq!(x, i);
                            break;
                        }
                    }
                }
                assert!(q.pop().is_none());
            });

            scope.spawn(|| {
                for i in 0..COUNT {
                    while q.push(i).is_err() {}
                }
            });
        });
    }

    #[test]
    fn mpmc() {
        #[cfg(miri)]
        const COUNT: usize = 50;
        #[cfg(not(miri))]
        const COUNT: usize = 25_000;
        const THREADS: usize = 4;

        let q = RingQueue::<usize>::new(4);
        let v = (0..COUNT).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();

        scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..COUNT {
                        let n = loop {
                            if let Some(x) = q.pop() {
                                break x;
                            }
                        };
                        v[n].fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for i in 0..COUNT {
                        while q.push(i).is_err() {}
                    }
                });
            }
        });

        for c in v {
            assert_eq!(c.load(Ordering::SeqCst), THREADS);
        }
    }

    /// Property #4: at quiescence, `sequence[i] mod C == i` for every slot.
    #[test]
    fn sequence_invariant_at_quiescence() {
        let q = RingQueue::new(4);
        for i in 0..10 {
            q.push(i).unwrap();
            q.pop().unwrap();
        }
        for (i, slot) in q.buffer.iter().enumerate() {
            let seq = slot.sequence.load(Ordering::SeqCst);
            assert_eq!(seq % q.buffer.len(), i);
        }
    }

    /// Property #1/#2 sketch: a scripted sequence of push/pop never exceeds
    /// capacity and never fabricates or loses a value.
    #[test]
    fn conservation_and_capacity() {
        let q = RingQueue::new(4);
        let mut pushed = Vec::new();
        let mut popped = Vec::new();

        for i in 0..100 {
            if i % 3 != 0 {
                if q.push(i).is_ok() {
                    pushed.push(i);
                }
            } else if let Some(v) = q.pop() {
                popped.push(v);
            }
        }
        while let Some(v) = q.pop() {
            popped.push(v);
        }

        assert_eq!(pushed, popped);
    }

    /// Property-based version of #1/#2: for any scripted interleaving of
    /// push/pop on a single-threaded queue, the delta between successful
    /// pushes and pops never exceeds capacity, and the pop order matches the
    /// push order of values that were actually accepted (single-producer
    /// ordering, property #3, holds trivially here since both sides run on
    /// the same thread).
    mod proptests {
        use super::RingQueue;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Op {
            Push(u32),
            Pop,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop),]
        }

        proptest! {
            #[test]
            fn conservation_and_capacity_bound(ops in prop::collection::vec(op_strategy(), 0..500)) {
                let capacity = 4;
                let q = RingQueue::new(capacity);
                let mut pushed = Vec::new();
                let mut popped = Vec::new();
                let mut resident: i64 = 0;

                for op in ops {
                    match op {
                        Op::Push(v) => {
                            if q.push(v).is_ok() {
                                pushed.push(v);
                                resident += 1;
                            }
                        }
                        Op::Pop => {
                            if let Some(v) = q.pop() {
                                popped.push(v);
                                resident -= 1;
                            }
                        }
                    }
                    prop_assert!(resident >= 0);
                    prop_assert!(resident <= capacity as i64);
                }

                while let Some(v) = q.pop() {
                    popped.push(v);
                }

                prop_assert_eq!(pushed, popped);
            }
        }
    }
}
