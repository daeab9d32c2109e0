//! Striped partitioning of the compress targets across workers.

use std::num::NonZeroUsize;

/// Splits `items` into `n` chunks; chunk `i` gets indices `i, i+n, i+2n, ...`
pub fn split<T: Clone>(items: &[T], n: NonZeroUsize) -> Vec<Vec<T>> {
    let n = n.get();
    (0..n)
        .map(|offset| items.iter().skip(offset).step_by(n).cloned().collect())
        .collect()
}
