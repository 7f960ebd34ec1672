//! Property-based tests for the lease manager.
//!
//! Tests validate:
//! - Threshold is `lease × ratio` and renewal triggers iff remaining <= threshold
//! - Remaining TTL right after issuance equals the lease
//! - Cache replacement is atomic under concurrent readers
//! - Tokens never appear in debug output

use proptest::prelude::*;
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    lease_and_remaining_strategy, lease_seconds_strategy, ratio_strategy, secret_path_strategy,
    versioned_secret_strategy,
};
use tokio::time::Instant;
use vault_lease::{
    Credential, LeaseAction, SecretCache, SecretRecord, VersionedSecret, decide,
    session::{remaining_ttl, threshold_ttl},
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn prop_threshold_is_lease_times_ratio(lease in lease_seconds_strategy(), ratio in ratio_strategy()) {
        let threshold = threshold_ttl(lease, ratio);
        prop_assert!((threshold - lease as f64 * ratio).abs() < 1e-9);
        prop_assert!(threshold > 0.0);
        prop_assert!(threshold <= lease as f64);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn prop_renewal_iff_at_or_below_threshold(
        (lease, remaining) in lease_and_remaining_strategy(),
        ratio in ratio_strategy(),
    ) {
        prop_assume!(remaining > 0);
        let threshold = threshold_ttl(lease, ratio);
        let action = decide(remaining, true, threshold);

        if remaining as f64 <= threshold {
            prop_assert_eq!(action, LeaseAction::Renew);
        } else {
            prop_assert_eq!(action, LeaseAction::Hold);
        }
    }

    #[test]
    fn prop_never_renew_when_not_renewable(
        (lease, remaining) in lease_and_remaining_strategy(),
        ratio in ratio_strategy(),
    ) {
        let action = decide(remaining, false, threshold_ttl(lease, ratio));
        prop_assert_eq!(action, LeaseAction::Reauthenticate);
    }

    #[test]
    fn prop_expired_always_reauthenticates(lease in lease_seconds_strategy(), ratio in ratio_strategy()) {
        prop_assert_eq!(decide(0, true, threshold_ttl(lease, ratio)), LeaseAction::Reauthenticate);
    }

    #[test]
    fn prop_remaining_ttl_at_issue_equals_lease(lease in lease_seconds_strategy()) {
        let now = Instant::now();
        let credential = Credential::new(SecretString::from("s.prop"), lease, now, true);
        prop_assert_eq!(credential.remaining_ttl(now), lease);
    }

    #[test]
    fn prop_remaining_ttl_never_negative(lease in lease_seconds_strategy(), elapsed in 0u64..200_000) {
        let remaining = remaining_ttl(lease, Duration::from_secs(elapsed));
        prop_assert!(remaining >= 0);
        prop_assert!(remaining <= lease);
        if elapsed < lease.unsigned_abs() {
            prop_assert_eq!(remaining, lease - i64::try_from(elapsed).unwrap());
        }
    }

    #[test]
    fn prop_credential_debug_hides_token(token in "[A-Za-z0-9.]{12,40}") {
        let credential = Credential::new(SecretString::from(token.clone()), 60, Instant::now(), true);
        let debug = format!("{credential:?}");
        prop_assert!(!debug.contains(&token));
    }

    #[test]
    fn prop_cache_keeps_latest_record_per_path(
        path in secret_path_strategy(),
        secrets in proptest::collection::vec(versioned_secret_strategy(), 1..6),
    ) {
        let cache = SecretCache::new();
        for secret in &secrets {
            cache.replace(SecretRecord::from_read(path.as_str(), secret.clone()));
        }

        let last = secrets.last().unwrap();
        let record = cache.get(&path).unwrap();
        prop_assert_eq!(&record.data, &last.data);
        prop_assert_eq!(record.version, last.version);
        prop_assert_eq!(cache.len(), 1);
    }
}

fn generation(n: u64) -> SecretRecord {
    let value = format!("generation-{n}");
    SecretRecord::from_read(
        "app/db",
        VersionedSecret {
            data: BTreeMap::from([
                ("username".to_string(), value.clone()),
                ("password".to_string(), value),
            ]),
            version: Some(n),
        },
    )
}

#[test]
fn test_cache_replacement_is_atomic_under_concurrent_reads() {
    let cache = Arc::new(SecretCache::new());
    cache.replace(generation(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..5_000 {
                    let record = cache.get("app/db").unwrap();
                    let expected = format!("generation-{}", record.version.unwrap());
                    assert_eq!(record.get("username"), Some(expected.as_str()));
                    assert_eq!(record.get("password"), Some(expected.as_str()));
                }
            })
        })
        .collect();

    for n in 1..=2_000 {
        cache.replace(generation(n));
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(cache.get("app/db").unwrap().version, Some(2_000));
}

#[test]
fn test_unrelated_path_reads_during_writes() {
    let cache = Arc::new(SecretCache::new());
    cache.replace(SecretRecord::from_read(
        "app/api",
        VersionedSecret {
            data: BTreeMap::from([("key".to_string(), "stable".to_string())]),
            version: Some(1),
        },
    ));

    let writer = {
        let cache = Arc::clone(&cache);
        std::thread::spawn(move || {
            for n in 0..2_000 {
                cache.replace(generation(n));
            }
        })
    };

    for _ in 0..2_000 {
        let record = cache.get("app/api").unwrap();
        assert_eq!(record.get("key"), Some("stable"));
    }
    writer.join().unwrap();
}
