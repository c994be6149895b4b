/*!
Building blocks for the bulk parallel passes over the marker graph.

Work is split into contiguous batches of indices that worker threads
claim from a shared [`BatchCursor`]. The cursor is the only state
the workers share; everything else they touch is partitioned by
index, which is what makes [`DisjointWriter`] sound to use.
*/

use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::StorageError;

/// Hands out consecutive, disjoint `[begin, end)` ranges covering
/// `0..end`, each at most `batch_size` long.
#[derive(Debug)]
pub struct BatchCursor {
    next: AtomicUsize,
    end: usize,
    batch_size: usize,
}

impl BatchCursor {
    pub fn new(end: usize, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self {
            next: AtomicUsize::new(0),
            end,
            batch_size,
        }
    }

    /// Claim the next batch, or `None` once everything has been
    /// handed out.
    #[inline]
    pub fn next_batch(&self) -> Option<Range<usize>> {
        let begin = self.next.fetch_add(self.batch_size, Ordering::Relaxed);
        if begin >= self.end {
            None
        } else {
            let end = self.end.min(begin + self.batch_size);
            Some(begin..end)
        }
    }
}

/// A fixed-size pool of worker threads. Each call to
/// [`run`](WorkerPool::run) or [`run_batches`](WorkerPool::run_batches)
/// is a barrier: it returns once every worker has finished.
pub struct WorkerPool {
    pool: ThreadPool,
    thread_count: usize,
}

impl WorkerPool {
    pub fn new(thread_count: usize) -> Result<Self, StorageError> {
        assert!(thread_count > 0, "worker pool needs at least one thread");
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|ix| format!("markergraph-worker-{}", ix))
            .build()?;
        Ok(Self { pool, thread_count })
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Run `f` once on every worker thread, passing the worker's
    /// index. A panic in any worker is propagated to the caller.
    pub fn run<F>(&self, f: F)
    where
        F: Fn(usize) + Sync,
    {
        let f = &f;
        self.pool.scope(|scope| {
            for worker in 0..self.thread_count {
                scope.spawn(move |_| f(worker));
            }
        });
    }

    /// Split `0..total` into batches and process them on all workers.
    pub fn run_batches<F>(&self, total: usize, batch_size: usize, f: F)
    where
        F: Fn(Range<usize>) + Sync,
    {
        let cursor = BatchCursor::new(total, batch_size);
        self.run(|_worker| {
            while let Some(batch) = cursor.next_batch() {
                f(batch);
            }
        });
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("thread_count", &self.thread_count)
            .finish()
    }
}

/// Shared write access to a mutable slice from several threads.
///
/// Every write is bounds checked, but nothing stops two threads from
/// writing the same element, hence the `unsafe` methods: callers must
/// guarantee that no element is accessed by more than one thread
/// while the writer is alive.
pub struct DisjointWriter<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<'a, T: Send> Send for DisjointWriter<'a, T> {}
unsafe impl<'a, T: Send> Sync for DisjointWriter<'a, T> {}

impl<'a, T> DisjointWriter<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrite the element at `index`.
    ///
    /// # Safety
    ///
    /// No other thread may access `index` concurrently.
    #[inline]
    pub unsafe fn write(&self, index: usize, value: T) {
        assert!(index < self.len, "index {} out of bounds", index);
        self.ptr.add(index).write(value);
    }

    /// # Safety
    ///
    /// No other thread may access `index` while the returned
    /// reference is alive.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub unsafe fn get_mut(&self, index: usize) -> &mut T {
        assert!(index < self.len, "index {} out of bounds", index);
        &mut *self.ptr.add(index)
    }

    /// # Safety
    ///
    /// No other thread may access any index in `range` while the
    /// returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [T] {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "range {:?} out of bounds for length {}",
            range,
            self.len
        );
        std::slice::from_raw_parts_mut(
            self.ptr.add(range.start),
            range.end - range.start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::quickcheck;

    fn drain(cursor: &BatchCursor) -> Vec<Range<usize>> {
        std::iter::from_fn(|| cursor.next_batch()).collect()
    }

    quickcheck! {
        fn prop_batches_cover_range(total: u16, batch_size: u8) -> bool {
            let total = total as usize;
            let batch_size = batch_size as usize + 1;
            let batches = drain(&BatchCursor::new(total, batch_size));

            let mut expected = 0;
            for batch in batches.iter() {
                if batch.start != expected || batch.len() > batch_size {
                    return false;
                }
                expected = batch.end;
            }
            expected == total
        }
    }

    #[test]
    fn cursor_handles_empty_range() {
        let cursor = BatchCursor::new(0, 10);
        assert_eq!(cursor.next_batch(), None);
        assert_eq!(cursor.next_batch(), None);
    }

    #[test]
    fn pool_runs_every_worker() {
        let pool = WorkerPool::new(4).unwrap();
        let ran = AtomicUsize::new(0);
        pool.run(|_| {
            ran.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn pool_batches_write_disjoint_slots() {
        let pool = WorkerPool::new(3).unwrap();
        let mut values = vec![0u64; 1000];
        {
            let writer = DisjointWriter::new(&mut values);
            pool.run_batches(1000, 7, |batch| {
                for ix in batch {
                    unsafe { writer.write(ix, ix as u64 * 2) };
                }
            });
        }
        assert!(values.iter().enumerate().all(|(ix, &v)| v == ix as u64 * 2));
    }

    #[test]
    #[should_panic]
    fn writer_checks_bounds() {
        let mut values = vec![0u8; 4];
        let writer = DisjointWriter::new(&mut values);
        unsafe { writer.write(4, 1) };
    }
}
