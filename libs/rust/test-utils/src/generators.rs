//! Shared proptest generators for lease and secret types.

use proptest::collection::btree_map;
use proptest::prelude::*;
use std::collections::BTreeMap;
use vault_lease::VersionedSecret;

/// Lease durations from one second to one day.
pub fn lease_seconds_strategy() -> impl Strategy<Value = i64> {
    1i64..=86_400
}

/// Renewal threshold ratios in (0, 1], in steps of 0.001.
pub fn ratio_strategy() -> impl Strategy<Value = f64> {
    (1u32..=1000).prop_map(|n| f64::from(n) / 1000.0)
}

/// A lease with a remaining TTL inside it.
pub fn lease_and_remaining_strategy() -> impl Strategy<Value = (i64, i64)> {
    lease_seconds_strategy().prop_flat_map(|lease| (Just(lease), 0..=lease))
}

/// KV secret paths such as `app/db`.
pub fn secret_path_strategy() -> impl Strategy<Value = String> {
    "[a-z]{2,8}/[a-z]{2,8}"
}

/// Non-empty secret key/value maps.
pub fn secret_data_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    btree_map("[a-z_]{1,12}", "[A-Za-z0-9!@#%^&*]{1,32}", 1..8)
}

/// Versioned secrets with an optional version marker.
pub fn versioned_secret_strategy() -> impl Strategy<Value = VersionedSecret> {
    (secret_data_strategy(), proptest::option::of(1u64..10_000))
        .prop_map(|(data, version)| VersionedSecret { data, version })
}
