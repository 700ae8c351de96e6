//! Short random identifier generation.

use rand::Rng;

const ID_LENGTH: usize = 4;
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_ATTEMPTS: usize = 10_000;

/// Generate a catalog id that `is_taken` does not already claim.
///
/// Panics after an absurd number of collisions; with the id space far
/// larger than any realistic catalog this only happens when the caller's
/// predicate is broken.
pub fn generate_id<F>(is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut rng = rand::rng();
    for _ in 0..MAX_ATTEMPTS {
        let id: String = (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect();
        if !is_taken(&id) {
            return id;
        }
    }
    panic!("could not find a free id after {} attempts", MAX_ATTEMPTS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_well_formed() {
        let id = generate_id(|_| false);
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn test_taken_ids_are_skipped() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let id = generate_id(|candidate| seen.contains(candidate));
            assert!(seen.insert(id));
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    #[should_panic(expected = "could not find a free id")]
    fn test_exhaustion_panics() {
        generate_id(|_| true);
    }
}
