//! Rayon or sequential execution behind one call.
//!
//! With the `parallel` feature the work is spread over rayon's global pool;
//! without it the same closure runs in order on the calling thread. Output
//! order always matches input order.

/// Map every item of `items` through `f`, preserving order.
#[cfg(feature = "parallel")]
pub fn map_ordered<T, U, F>(items: Vec<T>, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Sync + Send,
{
    use rayon::prelude::*;
    items.into_par_iter().map(f).collect()
}

/// Map every item of `items` through `f`, preserving order.
#[cfg(not(feature = "parallel"))]
pub fn map_ordered<T, U, F>(items: Vec<T>, f: F) -> Vec<U>
where
    F: Fn(T) -> U,
{
    items.into_iter().map(f).collect()
}
