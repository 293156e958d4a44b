//! Bulk reset to type defaults
//!
//! Every persisted field type knows how to zero itself. Records implement
//! [`Reset`] by resetting each persisted field in turn, recursing into nested
//! records. Resetting writes fields directly, never through a change tracker,
//! so a bulk reset never bumps the version.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;

/// In-place reset to the type's zero value
pub trait Reset {
    fn reset(&mut self);
}

macro_rules! reset_to_zero {
    ($($ty:ty => $zero:expr),* $(,)?) => {
        $(
            impl Reset for $ty {
                #[inline]
                fn reset(&mut self) {
                    *self = $zero;
                }
            }
        )*
    };
}

reset_to_zero! {
    bool => false,
    i8 => 0, i16 => 0, i32 => 0, i64 => 0, i128 => 0, isize => 0,
    u8 => 0, u16 => 0, u32 => 0, u64 => 0, u128 => 0, usize => 0,
    f32 => 0.0, f64 => 0.0,
}

impl Reset for String {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Reset for Option<T> {
    fn reset(&mut self) {
        *self = None;
    }
}

impl<T> Reset for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Reset for VecDeque<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Eq + Hash, V> Reset for HashMap<K, V> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Ord, V> Reset for BTreeMap<K, V> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Reset `record` in place and hand the same instance back
pub fn reset_to_default<R: Reset + ?Sized>(record: &mut R) -> &mut R {
    record.reset();
    record
}
