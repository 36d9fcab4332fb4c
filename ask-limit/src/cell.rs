use std::fmt::Debug;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

/// A single value shared between threads.
///
/// Every operation on one cell is linearizable: there is a total order of
/// `get`, `set` and `update` calls consistent with the order they were issued in.
/// Nothing is promised about the relative order of operations on distinct cells.
pub trait SharedCell<T>: Debug {
    /// Returns the current value.
    fn get(&self) -> T;

    /// Replaces the current value.
    fn set(&self, value: T);

    /// Reads, applies `f` and stores the result as one indivisible step.
    ///
    /// Returns the stored value. `f` may be invoked more than once by
    /// lock-free implementations, so it must not have side effects.
    fn update<F>(&self, f: F) -> T
    where
        F: FnMut(&T) -> T;
}

/// Mutex backed cell for values that do not fit a native atomic register.
///
/// `parking_lot::Mutex` does not poison, so a panic elsewhere can never make
/// the cell unusable.
#[derive(Debug, Default)]
pub struct ConcurrentCell<T> {
    value: Mutex<T>,
}

impl<T> ConcurrentCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Mutates the value under the lock and returns whatever `f` returns.
    pub fn update_in_place<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.value.lock();
        f(&mut guard)
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> SharedCell<T> for ConcurrentCell<T>
where
    T: Clone + Debug,
{
    fn get(&self) -> T {
        self.value.lock().clone()
    }

    fn set(&self, value: T) {
        *self.value.lock() = value;
    }

    fn update<F>(&self, mut f: F) -> T
    where
        F: FnMut(&T) -> T,
    {
        let mut guard = self.value.lock();
        let next = f(&guard);
        *guard = next.clone();
        next
    }
}

/// Lock-free cell for a `u64`, built on compare-and-swap.
#[derive(Debug, Default)]
pub struct AtomicCell {
    value: AtomicU64,
}

impl AtomicCell {
    pub fn new(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Adds one, saturating at `u64::MAX`, and returns the new value.
    pub fn increment(&self) -> u64 {
        self.update(|v| v.saturating_add(1))
    }
}

impl SharedCell<u64> for AtomicCell {
    fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    fn update<F>(&self, mut f: F) -> u64
    where
        F: FnMut(&u64) -> u64,
    {
        let mut next = 0;
        // The closure always returns Some, so this cannot fail. Ignore the result.
        let _ = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                next = f(&v);
                Some(next)
            });
        next
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::thread;

    use more_asserts::assert_ge;

    use super::*;

    const WRITERS: usize = 8;
    const READERS: usize = 4;
    const UPDATES_PER_WRITER: usize = 2_500;

    fn hammer<C>(cell: Arc<C>) -> u64
    where
        C: SharedCell<u64> + Send + Sync + 'static,
    {
        let barrier = Arc::new(Barrier::new(WRITERS + READERS));
        let mut handles = vec![];

        for _ in 0..WRITERS {
            let cell = Arc::clone(&cell);
            let bar = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                bar.wait();
                for _ in 0..UPDATES_PER_WRITER {
                    cell.update(|v| v + 1);
                }
            }));
        }

        for _ in 0..READERS {
            let cell = Arc::clone(&cell);
            let bar = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                bar.wait();
                let mut last = 0;
                for _ in 0..UPDATES_PER_WRITER {
                    let seen = cell.get();
                    // Only increments happen, so reads never go backwards
                    assert_ge!(seen, last);
                    last = seen;
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        cell.get()
    }

    #[test]
    fn mutex_cell_loses_no_updates() {
        let cell = Arc::new(ConcurrentCell::new(0u64));
        assert_eq!(hammer(cell), (WRITERS * UPDATES_PER_WRITER) as u64);
    }

    #[test]
    fn atomic_cell_loses_no_updates() {
        let cell = Arc::new(AtomicCell::new(0));
        assert_eq!(hammer(cell), (WRITERS * UPDATES_PER_WRITER) as u64);
    }

    #[test]
    fn readers_never_see_a_torn_pair() {
        // Writers keep both halves equal; a torn read would see them differ.
        let cell = Arc::new(ConcurrentCell::new((0u64, 0u64)));
        let mut handles = vec![];

        for _ in 0..4 {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || {
                for _ in 0..5_000 {
                    cell.update(|(a, b)| (a + 1, b + 1));
                }
            }));
        }
        for _ in 0..4 {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || {
                for _ in 0..5_000 {
                    let (a, b) = cell.get();
                    assert_eq!(a, b);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.get(), (20_000, 20_000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_increment_across_tasks() {
        let cell = Arc::new(AtomicCell::new(0));
        let mut handles = vec![];

        for _ in 0..10_000 {
            let cell = Arc::clone(&cell);
            handles.push(tokio::spawn(async move { cell.increment() }));
        }

        let results = futures::future::join_all(handles).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(cell.get(), 10_000);
    }

    #[test]
    fn set_is_visible_to_later_reads() {
        let cell = ConcurrentCell::new(String::from("before"));
        cell.set(String::from("after"));
        assert_eq!(cell.get(), "after");
        assert_eq!(cell.update(|s| format!("{s}!")), "after!");
        assert_eq!(cell.into_inner(), "after!");
    }

    #[test]
    fn update_in_place_returns_closure_result() {
        let cell = ConcurrentCell::new(vec![1, 2]);
        let len = cell.update_in_place(|v| {
            v.push(3);
            v.len()
        });
        assert_eq!(len, 3);
        assert_eq!(cell.get(), vec![1, 2, 3]);
    }

    #[test]
    fn increment_saturates() {
        let cell = AtomicCell::new(u64::MAX);
        assert_eq!(cell.increment(), u64::MAX);
    }
}
