//! Random short-code generation, grounded on the collision-retry loops of
//! `generate_game_code` and `generate_reconnect_code` in the original
//! implementation: draw a random alphanumeric string, check it against a
//! caller-supplied uniqueness predicate, retry up to 100 times.

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_ATTEMPTS: u32 = 100;

/// Draws a random `len`-character alphanumeric code and retries while
/// `exists` reports a collision, up to 100 attempts. Returns `None` if no
/// unique code was found in that many tries (the original's `s[0] = 0`
/// give-up path).
pub fn generate_code(len: usize, mut exists: impl FnMut(&str) -> bool) -> Option<String> {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..ALPHABET.len());

    for _ in 0..MAX_ATTEMPTS {
        let candidate: String = (0..len)
            .map(|_| ALPHABET[dist.sample(&mut rng)] as char)
            .collect();

        if !exists(&candidate) {
            return Some(candidate);
        }
    }

    None
}

/// Draws a value in `1..=6`, used both for real die rolls and validated
/// admin `force_roll` overrides.
pub fn roll_die() -> u8 {
    rand::thread_rng().gen_range(1..=6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_code_avoids_collisions() {
        let taken = ["AAAA"];
        let code = generate_code(4, |c| taken.contains(&c)).unwrap();
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(code, "AAAA");
    }

    #[test]
    fn generate_code_gives_up_when_always_colliding() {
        assert!(generate_code(4, |_| true).is_none());
    }

    #[test]
    fn roll_die_in_range() {
        for _ in 0..1000 {
            let v = roll_die();
            assert!((1..=6).contains(&v));
        }
    }
}
