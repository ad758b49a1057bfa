use core::mem::{self, MaybeUninit};
use core::ptr;

/// Size, in bytes, of a [`Task`]'s inline buffer.
const INLINE_SIZE: usize = corepool_cfg::TASK_INLINE_SIZE;

/// Carries the inline buffer's own alignment requirement. A plain
/// `[u8; INLINE_SIZE]` field has alignment 1, which wouldn't guarantee room
/// for a closure with pointer-width captures regardless of what the
/// surrounding `Task` is aligned to. The field needs its own alignment, not
/// just the struct's.
#[repr(align(8))]
struct Storage(MaybeUninit<[u8; INLINE_SIZE]>);

/// A move-only, nullary, no-return unit of deferred work.
///
/// The closure passed to [`Task::new`] is stored inline, no heap allocation,
/// in a buffer sized by [`corepool_cfg::TASK_INLINE_SIZE`]. A closure whose
/// captured state doesn't fit is rejected at compile time.
///
/// A `Task` is invoked at most once: [`Task::invoke`] consumes it. Dropping a
/// `Task` that was never invoked runs the held closure's destructor instead.
pub struct Task {
    storage: Storage,
    invoke: unsafe fn(*mut u8),
    drop: unsafe fn(*mut u8),
}

impl Task {
    /// Moves `f` into a new `Task`.
    ///
    /// # Panics / compile errors
    ///
    /// Fails to compile if `size_of::<F>()` exceeds
    /// [`corepool_cfg::TASK_INLINE_SIZE`] or `align_of::<F>()` exceeds the
    /// `Task`'s own alignment.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        const {
            assert!(
                mem::size_of::<F>() <= INLINE_SIZE,
                "closure capture too large for the Task inline buffer"
            );
            assert!(
                mem::align_of::<F>() <= mem::align_of::<Storage>(),
                "closure capture alignment exceeds the Task inline buffer"
            );
        }

        let mut storage = Storage(MaybeUninit::<[u8; INLINE_SIZE]>::uninit());

        #[expect(unsafe_code, reason = "writing F into the inline buffer it was sized for")]
        unsafe {
            storage.0.as_mut_ptr().cast::<F>().write(f);
        }

        Self { storage, invoke: invoke_trampoline::<F>, drop: drop_trampoline::<F> }
    }

    /// Invokes and consumes the held closure.
    ///
    /// Calling this more than once on logically distinct `Task`s is fine;
    /// calling it twice on the *same* value is prevented by ownership (`self`
    /// is consumed).
    pub fn invoke(self) {
        let mut this = mem::ManuallyDrop::new(self);
        let ptr = this.storage.0.as_mut_ptr().cast::<u8>();

        #[expect(unsafe_code, reason = "ptr was constructed by Task::new for this exact vtable")]
        unsafe {
            (this.invoke)(ptr);
        }
        // The closure has been moved out and run; there is nothing left to
        // drop, and `ManuallyDrop` ensures we don't try.
    }
}

#[expect(unsafe_code, reason = "invoke trampoline paired 1:1 with the write in Task::new")]
unsafe fn invoke_trampoline<F: FnOnce()>(ptr: *mut u8) {
    let f = unsafe { ptr.cast::<F>().read() };
    f();
}

#[expect(unsafe_code, reason = "drop trampoline paired 1:1 with the write in Task::new")]
unsafe fn drop_trampoline<F>(ptr: *mut u8) {
    unsafe { ptr::drop_in_place(ptr.cast::<F>()) };
}

impl Drop for Task {
    fn drop(&mut self) {
        let ptr = self.storage.0.as_mut_ptr().cast::<u8>();
        #[expect(unsafe_code, reason = "dropping a Task that was never invoked")]
        unsafe {
            (self.drop)(ptr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn is_send<T: Send>() {}

    #[test]
    fn is_send_marker() {
        is_send::<Task>();
    }

    #[test]
    fn invoke_runs_closure_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = Task::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        task.invoke();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_without_invoke_runs_destructor() {
        struct DropMarker(Arc<AtomicUsize>);
        impl Drop for DropMarker {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let marker = DropMarker(counter.clone());
        let task = Task::new(move || {
            let _keep_alive = &marker;
        });
        drop(task);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn captures_small_state() {
        let a = 1usize;
        let b = 2usize;
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = Task::new(move || {
            c.fetch_add(a + b, Ordering::SeqCst);
        });
        task.invoke();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    // Oversized captures are rejected at compile time by the `const { assert!(..) }`
    // block in `Task::new`, matching S5 / `UndersizedTaskBuffer`:
    //
    // ```compile_fail
    // let huge = [0u8; 4096];
    // corepool_task::task::Task::new(move || { let _ = huge; });
    // ```
}
