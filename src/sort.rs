//! Parallel quicksort over an index permutation, with work stealing.
//!
//! Threads share a LIFO stack of unsorted sub-slices. A thread partitions its
//! slice around a median-of-three pivot, pushes the larger half for others to
//! steal and keeps the smaller one; small slices are finished with insertion
//! sort. The jobs are disjoint `&mut` sub-slices of one buffer, so the
//! pending jobs always tile the unsorted part of the range exactly.

use std::ops::Range;

#[cfg(all(feature = "shuttle", test))]
use shuttle::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
#[cfg(not(all(feature = "shuttle", test)))]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use tracing::debug;

use crate::error::{FpError, Result};
use crate::item::ItemCount;
use crate::utils::Backoff;

/// Slices shorter than this are insertion sorted.
pub const INSERTION_SORT_THRESH: usize = 100;

/// Jobs waiting to be picked up, plus the number of threads holding one.
///
/// The counter only changes under the stack lock. A thread that fails to pop
/// and then sees the counter at zero knows no job exists or can appear.
pub(crate) struct WorkStack<T> {
    jobs: Mutex<Vec<T>>,
    busy: AtomicUsize,
}

impl<T> WorkStack<T> {
    pub(crate) fn new(jobs: Vec<T>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            busy: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push(&self, job: T) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.push(job);
    }

    /// Pops a job, moving the caller between busy and idle as needed.
    pub(crate) fn pop(&self, busy: &mut bool) -> Option<T> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.pop() {
            Some(job) => {
                if !*busy {
                    self.busy.fetch_add(1, Ordering::AcqRel);
                    *busy = true;
                }
                Some(job)
            }
            None => {
                if *busy {
                    self.busy.fetch_sub(1, Ordering::AcqRel);
                    *busy = false;
                }
                None
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.busy.load(Ordering::Acquire) == 0
    }

    /// Runs one worker until every job, including the ones `process` spawns,
    /// is finished. `process` returns the part of a job to continue with.
    pub(crate) fn work(&self, mut process: impl FnMut(T, &Self) -> Option<T>) {
        let mut busy = false;
        let mut current = None;
        let backoff = Backoff::new();
        loop {
            if let Some(job) = current.take() {
                current = process(job, self);
                continue;
            }
            match self.pop(&mut busy) {
                Some(job) => {
                    backoff.reset();
                    current = Some(job);
                }
                None => {
                    if self.is_done() {
                        return;
                    }
                    backoff.snooze();
                }
            }
        }
    }
}

/// Returns the indices in `range`, ordered so that `key(&items[i])` is
/// non-decreasing. Equal keys are ordered by index.
///
/// # Examples
///
/// ```
/// use fpmerge::sort::sort_by_key;
/// let values = [5, 1, 3];
/// let sorted = sort_by_key(&values, 0..3, 2, |v| *v).unwrap();
/// assert_eq!(sorted, vec![1, 2, 0]);
/// ```
pub fn sort_by_key<T, K, F>(
    items: &[T],
    range: Range<usize>,
    num_threads: usize,
    key: F,
) -> Result<Vec<usize>>
where
    T: Sync,
    K: Ord,
    F: Fn(&T) -> K + Sync,
{
    if range.start > range.end || range.end > items.len() {
        return Err(FpError::SortRange {
            start: range.start,
            end: range.end,
            len: items.len(),
        });
    }
    if num_threads == 0 {
        return Err(FpError::Config("num_threads must be at least 1".into()));
    }

    let mut indices: Vec<usize> = range.collect();
    if indices.len() < 2 {
        return Ok(indices);
    }

    let less = |a: usize, b: usize| (key(&items[a]), a) < (key(&items[b]), b);
    let stack = WorkStack::new(vec![indices.as_mut_slice()]);
    if num_threads == 1 {
        run_sorter(&stack, &less, INSERTION_SORT_THRESH);
    } else {
        std::thread::scope(|s| {
            for _ in 1..num_threads {
                s.spawn(|| run_sorter(&stack, &less, INSERTION_SORT_THRESH));
            }
            run_sorter(&stack, &less, INSERTION_SORT_THRESH);
        });
    }
    drop(stack);

    debug!(len = indices.len(), num_threads, "sorted index range");
    Ok(indices)
}

/// Sorts `items[range]` by ascending support count.
pub fn sort_counts(
    items: &[ItemCount],
    range: Range<usize>,
    num_threads: usize,
) -> Result<Vec<usize>> {
    sort_by_key(items, range, num_threads, |ic| ic.count)
}

/// Works on `stack` until every job is sorted. Slices shorter than
/// `insertion_thresh` are insertion sorted.
pub(crate) fn run_sorter<'a>(
    stack: &WorkStack<&'a mut [usize]>,
    less: &impl Fn(usize, usize) -> bool,
    insertion_thresh: usize,
) {
    stack.work(|job, stack| quick_step(job, stack, less, insertion_thresh));
}

/// Partitions `job`, publishes the larger side and returns the smaller one.
fn quick_step<'a>(
    job: &'a mut [usize],
    stack: &WorkStack<&'a mut [usize]>,
    less: &impl Fn(usize, usize) -> bool,
    insertion_thresh: usize,
) -> Option<&'a mut [usize]> {
    // median of three needs three elements
    if job.len() < insertion_thresh.max(3) {
        insertion_sort(job, less);
        return None;
    }

    median_of_three(job, less);
    let p = partition(job, less);
    let (left, rest) = job.split_at_mut(p);
    let right = &mut rest[1..];

    let (larger, smaller) = if left.len() >= right.len() {
        (left, right)
    } else {
        (right, left)
    };
    stack.push(larger);
    Some(smaller)
}

pub(crate) fn insertion_sort(s: &mut [usize], less: &impl Fn(usize, usize) -> bool) {
    for i in 1..s.len() {
        let cur = s[i];
        let mut j = i;
        while j > 0 && less(cur, s[j - 1]) {
            s[j] = s[j - 1];
            j -= 1;
        }
        s[j] = cur;
    }
}

/// Orders first, middle and last so that the median lands at position 0
/// and the maximum at the end.
fn median_of_three(s: &mut [usize], less: &impl Fn(usize, usize) -> bool) {
    let last = s.len() - 1;
    let mid = last / 2;
    if less(s[last], s[0]) {
        s.swap(0, last);
    }
    if less(s[last], s[mid]) {
        s.swap(mid, last);
    }
    if less(s[0], s[mid]) {
        s.swap(mid, 0);
    }
}

/// Lomuto partition around the pivot `s[0]`. Every element less than the
/// pivot ends up left of the pivot's final position, every other element
/// right of it. Returns that position.
fn partition(s: &mut [usize], less: &impl Fn(usize, usize) -> bool) -> usize {
    let pivot = s[0];
    let mut j = 0;
    for i in 1..s.len() {
        if less(s[i], pivot) {
            j += 1;
            s.swap(i, j);
        }
    }
    s.swap(0, j);
    j
}
