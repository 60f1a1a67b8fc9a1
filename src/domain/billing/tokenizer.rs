//! Non-reversible card tokens.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

/// Derives a stable token for a card number with HMAC-SHA256.
///
/// The full number is never stored; the token lets the same card be
/// recognised again without being reversible.
#[derive(Clone)]
pub struct CardTokenizer {
    key: SecretString,
}

impl CardTokenizer {
    pub fn new(key: SecretString) -> Self {
        Self { key }
    }

    /// Returns `tok_` followed by the hex digest of the digits-only number.
    pub fn tokenize(&self, card_digits: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.key.expose_secret().as_bytes())
            .expect("HMAC accepts any key");
        mac.update(card_digits.as_bytes());
        format!("tok_{}", hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for CardTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardTokenizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(key: &str) -> CardTokenizer {
        CardTokenizer::new(SecretString::new(key.to_string()))
    }

    #[test]
    fn token_is_stable_for_same_card() {
        let t = tokenizer("k1");
        assert_eq!(t.tokenize("4111111111111111"), t.tokenize("4111111111111111"));
    }

    #[test]
    fn token_depends_on_key_and_card() {
        let a = tokenizer("k1").tokenize("4111111111111111");
        let b = tokenizer("k2").tokenize("4111111111111111");
        let c = tokenizer("k1").tokenize("4111111111111112");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn token_never_contains_the_card_number() {
        let token = tokenizer("k1").tokenize("4111111111111111");
        assert!(token.starts_with("tok_"));
        assert_eq!(token.len(), 4 + 64);
        assert!(!token.contains("4111111111111111"));
    }
}
