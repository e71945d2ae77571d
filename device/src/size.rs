//! Overflow-checked size arithmetic.
//!
//! Every buffer size is a product of caller-supplied extents, so the
//! multiplications are checked with the division identity `(a*c)/a == c`
//! rather than hardware overflow flags, which keeps the check portable.
//!
//! Two variants with different failure audiences:
//! - [`checked_multiply`] returns `None` on overflow; call sites that
//!   multiply caller-supplied extents turn this into a catchable error.
//! - [`checked_multiply_assert`] panics on overflow and is reserved for
//!   internal stride/padding arithmetic that is already bounded by a
//!   validated total; overflow there is a compiler bug, not a user error.

/// Multiply two unsigned sizes, returning `None` on overflow.
pub fn checked_multiply(a: usize, c: usize) -> Option<usize> {
    if a == 0 {
        return Some(0);
    }
    let t = a.wrapping_mul(c);
    if t / a != c {
        return None;
    }
    Some(t)
}

/// Multiply two unsigned sizes, panicking on overflow.
///
/// # Panics
///
/// Panics if `a * c` overflows. Only use on arithmetic whose operands are
/// already bounded by a validated total size.
pub fn checked_multiply_assert(a: usize, c: usize) -> usize {
    checked_multiply(a, c).expect("overflow in checked multiply")
}
