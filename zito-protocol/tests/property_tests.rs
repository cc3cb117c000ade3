//! Property-based tests for the signing protocol.
//!
//! These use proptest to verify the core invariants across a wide range of
//! inputs: sign/verify round trips, rejection of any tampering, and
//! determinism of the canonical serialization.

mod signature_properties {
    use proptest::prelude::*;
    use zito_protocol::signature;

    proptest! {
        /// verify(secret, c, sign(secret, c)) always holds.
        #[test]
        fn round_trip_verifies(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            canonical in ".{0,200}"
        ) {
            let sig = signature::sign(&secret, &canonical);
            prop_assert!(signature::verify(&secret, &canonical, &sig).is_ok());
        }

        /// Flipping any single hex character of the signature breaks it.
        #[test]
        fn mutated_signature_fails(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            canonical in ".{0,200}",
            position in 0usize..64
        ) {
            let sig = signature::sign(&secret, &canonical);
            let mut bytes: Vec<char> = sig.chars().collect();
            bytes[position] = if bytes[position] == '0' { '1' } else { '0' };
            let mutated: String = bytes.into_iter().collect();
            prop_assume!(mutated != sig);
            prop_assert!(signature::verify(&secret, &canonical, &mutated).is_err());
        }

        /// Appending anything to the canonical string breaks verification.
        #[test]
        fn extended_canonical_fails(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            canonical in ".{0,200}",
            suffix in ".{1,20}"
        ) {
            let sig = signature::sign(&secret, &canonical);
            let extended = format!("{canonical}{suffix}");
            prop_assert!(signature::verify(&secret, &extended, &sig).is_err());
        }

        /// A different secret never verifies the same canonical string.
        #[test]
        fn wrong_secret_fails(
            secret in proptest::collection::vec(any::<u8>(), 1..64),
            other in proptest::collection::vec(any::<u8>(), 1..64),
            canonical in ".{0,200}"
        ) {
            prop_assume!(secret != other);
            let sig = signature::sign(&secret, &canonical);
            prop_assert!(signature::verify(&other, &canonical, &sig).is_err());
        }
    }
}

mod canonical_properties {
    use proptest::prelude::*;
    use zito_protocol::canonical::{canonical_string, CanonicalRequest};

    proptest! {
        /// Identical inputs always produce identical canonical strings.
        #[test]
        fn deterministic(
            method in "[A-Za-z]{3,7}",
            path in "/[a-z0-9/]{0,30}",
            body in ".{0,100}",
            timestamp in 0i64..4_000_000_000i64,
            nonce in "[a-z0-9-]{1,36}",
            origin in "[a-z0-9.]{1,30}"
        ) {
            let request = CanonicalRequest::new(method, path, vec![], body);
            let a = canonical_string(&request, timestamp, &nonce, &origin);
            let b = canonical_string(&request, timestamp, &nonce, &origin);
            prop_assert_eq!(a, b);
        }

        /// Transmitted query order never changes the canonical string when
        /// keys are distinct: the sort normalizes it.
        #[test]
        fn query_order_is_normalized(
            entries in proptest::collection::hash_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..8),
            timestamp in 0i64..4_000_000_000i64
        ) {
            let forward: Vec<(String, String)> =
                entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let mut reversed = forward.clone();
            reversed.reverse();

            let a = CanonicalRequest::new("POST", "/p", forward, "{}");
            let b = CanonicalRequest::new("POST", "/p", reversed, "{}");
            prop_assert_eq!(
                canonical_string(&a, timestamp, "n", "o"),
                canonical_string(&b, timestamp, "n", "o")
            );
        }

        /// Method casing is normalized.
        #[test]
        fn method_case_insensitive(path in "/[a-z]{0,10}") {
            let lower = CanonicalRequest::new("post", path.clone(), vec![], "");
            let upper = CanonicalRequest::new("POST", path, vec![], "");
            prop_assert_eq!(
                canonical_string(&lower, 1, "n", "o"),
                canonical_string(&upper, 1, "n", "o")
            );
        }
    }
}

mod timestamp_properties {
    use proptest::prelude::*;
    use zito_protocol::TimestampValidator;

    proptest! {
        /// Acceptance is exactly |now - ts| <= skew.
        #[test]
        fn window_is_symmetric(
            now in 1_000_000i64..4_000_000_000i64,
            delta in -1_000i64..1_000i64
        ) {
            let validator = TimestampValidator::new(300);
            let accepted = validator.is_fresh(now + delta, now);
            prop_assert_eq!(accepted, delta.abs() <= 300);
        }
    }
}
