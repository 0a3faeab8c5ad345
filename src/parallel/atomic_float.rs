//! AtomicFloat

use crate::common::{bits_to_float, float_to_bits, Float};
use std::sync::atomic::{AtomicU64, Ordering};

/// Implement atomic floating point value using `AtomicU64`.
#[derive(Debug)]
pub struct AtomicFloat {
    /// Bit representation of floating point value.
    bits: AtomicU64,
}

impl AtomicFloat {
    /// Create a new `AtomicFloat`.
    ///
    /// * `v` - The value.
    pub fn new(v: Float) -> Self {
        Self {
            bits: AtomicU64::new(float_to_bits(v)),
        }
    }

    /// Add a floating point value.
    ///
    /// * `v` - The value to add.
    pub fn add(&self, v: Float) {
        let mut old_bits = self.bits.load(Ordering::Relaxed);
        loop {
            let new_bits = float_to_bits(bits_to_float(old_bits) + v);
            let result = self.bits.compare_exchange_weak(
                old_bits,
                new_bits,
                Ordering::SeqCst,
                Ordering::Relaxed,
            );
            match result {
                Ok(_) => break,
                Err(x) => {
                    old_bits = x;
                }
            }
        }
    }

    /// Returns the current value.
    pub fn value(&self) -> Float {
        bits_to_float(self.bits.load(Ordering::SeqCst))
    }
}

impl Default for AtomicFloat {
    /// Returns the "default value" for `AtomicFloat`.
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates() {
        let a = AtomicFloat::new(1.5);
        a.add(2.25);
        assert_eq!(a.value(), 3.75);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let a = AtomicFloat::default();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10_000 {
                        a.add(0.5);
                    }
                });
            }
        });
        assert_eq!(a.value(), 4.0 * 10_000.0 * 0.5);
    }
}
