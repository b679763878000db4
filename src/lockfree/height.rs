//! Random tower heights.

use rand::Rng;

/// Draws a node height by flipping fair coins.
///
/// Counts heads until the first tail or until `max_height` is reached, so
/// `P(height = k) = 2^-(k+1)` for `k < max_height` and the remaining mass sits at `max_height`.
pub fn random_height<R: Rng + ?Sized>(rng: &mut R, max_height: usize) -> usize {
    let mut height = 0;
    while height < max_height && rng.gen::<bool>() {
        height += 1;
    }
    height
}

/// Draws a height with the calling thread's generator.
pub(crate) fn thread_height(max_height: usize) -> usize {
    random_height(&mut rand::thread_rng(), max_height)
}
