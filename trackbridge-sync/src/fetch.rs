//! Concurrent independent reads within one issue.

use std::thread;

/// Run `left` on a scoped thread and `right` on the caller, returning both.
///
/// A panic on the scoped thread is resumed on the caller.
pub(crate) fn both<A, B>(
    left: impl FnOnce() -> A + Send,
    right: impl FnOnce() -> B,
) -> (A, B)
where
    A: Send,
{
    thread::scope(|scope| {
        let handle = scope.spawn(left);
        let right = right();
        let left = handle
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
        (left, right)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_both_results_in_order() {
        let data = vec![1, 2, 3];
        let (sum, len) = both(|| data.iter().sum::<i32>(), || data.len());
        assert_eq!((sum, len), (6, 3));
    }

    #[test]
    #[should_panic(expected = "left side failed")]
    fn left_panics_propagate() {
        let _ = both(|| -> i32 { panic!("left side failed") }, || 1);
    }
}
