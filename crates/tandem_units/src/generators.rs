//! Property-based generators for dumps, pages and chaos settings.
//!
//! Uses proptest strategies to generate:
//! - Pages with a mix of all-zero, random, sparse and truncated content
//! - Whole dumps built from such pages
//! - Throttle configurations for adversarial scheduling

use crate::throttle::ThrottleConfig;
use proptest::prelude::*;

/// Strategy for one page of exactly `size` bytes.
pub fn page(size: usize) -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        2 => Just(vec![0u8; size]),                         // all zero
        5 => prop::collection::vec(any::<u8>(), size),      // random
        3 => prop::collection::vec(                          // sparse
            prop_oneof![9 => Just(0u8), 1 => any::<u8>()],
            size,
        ),
    ]
}

/// Strategy for a dump of up to `max_pages` pages whose final page may be
/// truncated.
pub fn dump(page_size: usize, max_pages: usize) -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(page(page_size), 0..max_pages.max(1)),
        prop::collection::vec(any::<u8>(), 0..page_size),
    )
        .prop_map(|(pages, tail)| {
            let mut dump = pages.concat();
            dump.extend(tail);
            dump
        })
}

/// Strategy for throttle settings, from gentle to heavy stalling.
pub fn throttle_config() -> impl Strategy<Value = ThrottleConfig> {
    (any::<u64>(), 0.0..0.6f64).prop_map(|(seed, rate)| {
        ThrottleConfig::default()
            .with_seed(seed)
            .with_stall_rate(rate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn pages_have_exact_size(p in page(64)) {
            prop_assert_eq!(p.len(), 64);
        }

        #[test]
        fn dumps_end_with_short_tail(d in dump(32, 4)) {
            prop_assert!(d.len() < 32 * 4 + 32);
        }

        #[test]
        fn throttle_rates_are_probabilities(c in throttle_config()) {
            prop_assert!((0.0..1.0).contains(&c.stall_rate));
        }
    }
}
