//! Identifier generation for trace and span IDs.
//!
//! Identifiers are generated independently by every process that takes part
//! in a trace, with no central coordination. They are UUID version 7 values:
//! a 48-bit Unix millisecond timestamp followed by 74 random bits, rendered in
//! the simple (hyphen-less, lowercase hex) form.
//!
//! The timestamp prefix keeps identifiers roughly time-ordered, which is
//! convenient for storage keys; the random tail makes collisions between
//! processes negligible.

use uuid::Uuid;

/// Length of a rendered identifier in characters.
pub const ID_LEN: usize = 32;

/// Generates a fresh globally-unique identifier.
///
/// # Examples
///
/// ```
/// use scene_core::ids::new_id;
///
/// let a = new_id();
/// let b = new_id();
/// assert_ne!(a, b);
/// assert_eq!(a.len(), scene_core::ids::ID_LEN);
/// ```
#[must_use]
pub fn new_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Returns `true` if `id` has the shape of an identifier produced by [`new_id`].
///
/// Decoding a trace context does not apply this check: identifiers minted by
/// other tracers only have to be non-empty.
#[must_use]
pub fn is_well_formed(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Extracts the millisecond timestamp embedded in an identifier.
///
/// Returns `None` for identifiers that are not UUID v7 values.
#[must_use]
pub fn timestamp_millis(id: &str) -> Option<u64> {
    let uuid = Uuid::try_parse(id).ok()?;
    if uuid.get_version_num() != 7 {
        return None;
    }
    let (secs, nanos) = uuid.get_timestamp()?.to_unix();
    Some(secs * 1000 + u64::from(nanos) / 1_000_000)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::{SystemTime, UNIX_EPOCH};

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_id_is_well_formed() {
        let id = new_id();
        assert!(is_well_formed(&id), "unexpected id shape: {id}");
    }

    #[test]
    fn new_id_10_000_unique() {
        let set: HashSet<String> = (0..10_000).map(|_| new_id()).collect();
        assert_eq!(set.len(), 10_000);
    }

    #[test]
    fn new_id_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..1_000).map(|_| new_id()).collect::<Vec<_>>()))
            .collect();
        let mut set = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(set.insert(id));
            }
        }
        assert_eq!(set.len(), 4_000);
    }

    #[test]
    fn timestamp_is_close_to_now() {
        let now = u64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis(),
        )
        .unwrap();
        let ts = timestamp_millis(&new_id()).unwrap();
        assert!(ts.abs_diff(now) < 5_000);
    }

    #[test]
    fn timestamp_rejects_other_versions() {
        let v4 = Uuid::new_v4().simple().to_string();
        assert!(timestamp_millis(&v4).is_none());
        assert!(timestamp_millis("not-an-id").is_none());
    }

    #[test]
    fn is_well_formed_rejects_bad_input() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("0123"));
        assert!(!is_well_formed(&"Z".repeat(ID_LEN)));
        assert!(!is_well_formed(&"A".repeat(ID_LEN)));
        assert!(is_well_formed(&"a".repeat(ID_LEN)));
    }

    proptest! {
        #[test]
        fn arbitrary_strings_of_wrong_length_are_rejected(s in "[0-9a-f]{0,31}") {
            prop_assert!(!is_well_formed(&s));
        }
    }
}
