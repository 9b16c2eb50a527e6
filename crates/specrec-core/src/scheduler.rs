//! Bounded-concurrency execution of asynchronous tasks.
//!
//! Every task is a closure receiving its 1-based ordinal and the total count,
//! which callers use for progress logging. At most `max_concurrent` tasks are in
//! flight; when one settles the next queued task starts. Results come back in
//! input order once every task has settled, whatever order they completed in.
//!
//! Tasks are polled on the caller's task, so "concurrent" means interleaved I/O
//! rather than parallel threads. A failing task does not cancel its siblings:
//! tasks that can fail should return a `Result` as their output.
//!
//! # Examples
//!
//! ```
//! use specrec_core::scheduler::run_bounded;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let tasks: Vec<_> = (0..5)
//!     .map(|n| move |ordinal: usize, total: usize| async move { (n * 2, ordinal, total) })
//!     .collect();
//! let results = run_bounded(tasks, 2).await;
//! assert_eq!(results[4], (8, 5, 5));
//! # }
//! ```

// Internal imports (std, crate)
use std::future::Future;

// External imports (alphabetized)
use futures::stream::{self, StreamExt};

/// Run `tasks` with at most `max_concurrent` in flight, returning results in input order
///
/// A ceiling of zero is treated as one.
pub async fn run_bounded<F, Fut, T>(tasks: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: FnOnce(usize, usize) -> Fut,
    Fut: Future<Output = T>,
{
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    // Unordered so a slow task only holds its own slot
    let mut settled: Vec<(usize, T)> = stream::iter(tasks.into_iter().enumerate())
        .map(|(index, task)| async move { (index, task(index + 1, total).await) })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;
    settled.sort_by_key(|(index, _)| *index);
    settled.into_iter().map(|(_, output)| output).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ceiling_is_enforced_and_order_preserved() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..31u64)
            .map(|n| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                move |ordinal: usize, total: usize| async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Later tasks finish first so completion order differs from input order
                    tokio::time::sleep(Duration::from_millis((31 - n) % 7 * 3)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    (ordinal, total)
                }
            })
            .collect();

        let results = run_bounded(tasks, 15).await;

        assert_eq!(results.len(), 31);
        for (i, (ordinal, total)) in results.iter().enumerate() {
            assert_eq!(*ordinal, i + 1);
            assert_eq!(*total, 31);
        }
        assert!(peak.load(Ordering::SeqCst) <= 15);
        assert!(peak.load(Ordering::SeqCst) > 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_task_only_holds_its_own_slot() {
        let first_done = Arc::new(AtomicBool::new(false));
        let started_early = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..31u64)
            .map(|n| {
                let first_done = Arc::clone(&first_done);
                let started_early = Arc::clone(&started_early);
                move |ordinal: usize, _: usize| async move {
                    if !first_done.load(Ordering::SeqCst) {
                        started_early.fetch_add(1, Ordering::SeqCst);
                    }
                    let delay = if n == 0 { 500 } else { 10 };
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    if n == 0 {
                        first_done.store(true, Ordering::SeqCst);
                    }
                    ordinal
                }
            })
            .collect();

        let results = run_bounded(tasks, 15).await;

        // Tasks 16..31 take the slots freed by tasks 2..15 while task 1 is still running
        assert_eq!(started_early.load(Ordering::SeqCst), 31);
        assert_eq!(results, (1..=31).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_settled_slot_starts_next_task() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        // Task 2 settles first, so task 3 must start before task 1 finishes
        let delays = [200u64, 5, 5];
        let tasks: Vec<_> = delays
            .iter()
            .map(|&delay| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let order = Arc::clone(&order);
                move |ordinal: usize, _: usize| async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    order.lock().unwrap().push(format!("start {}", ordinal));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    order.lock().unwrap().push(format!("end {}", ordinal));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    ordinal
                }
            })
            .collect();

        assert_eq!(run_bounded(tasks, 2).await, vec![1, 2, 3]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let order = order.lock().unwrap().clone();
        let position = |event: &str| order.iter().position(|e| e == event).unwrap();
        assert!(position("start 3") < position("end 1"));
        assert!(position("end 2") < position("start 3"));
    }

    #[tokio::test]
    async fn test_failures_do_not_cancel_siblings() {
        let tasks: Vec<_> = (0..4)
            .map(|n| move |_: usize, _: usize| async move {
                if n == 1 {
                    Err(format!("task {} failed", n))
                } else {
                    Ok(n)
                }
            })
            .collect();

        let results = run_bounded(tasks, 2).await;
        assert_eq!(
            results,
            vec![Ok(0), Err("task 1 failed".to_string()), Ok(2), Ok(3)]
        );
    }

    #[tokio::test]
    async fn test_empty_and_zero_ceiling() {
        let empty: Vec<fn(usize, usize) -> std::future::Ready<()>> = Vec::new();
        assert!(run_bounded(empty, 15).await.is_empty());

        let tasks: Vec<_> = (0..3)
            .map(|n| move |_: usize, _: usize| async move { n })
            .collect();
        assert_eq!(run_bounded(tasks, 0).await, vec![0, 1, 2]);
    }
}
