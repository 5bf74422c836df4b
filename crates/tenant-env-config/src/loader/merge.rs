//! Merge helper for base and overlay values.

use crate::ConfigValues;

/// Merge overlay values over a copy of the base.
///
/// Overlay keys replace base values; base keys absent from the overlay pass
/// through unchanged. Neither input is modified.
pub fn merge_overlay(base: &ConfigValues, overlay: &ConfigValues) -> ConfigValues {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
