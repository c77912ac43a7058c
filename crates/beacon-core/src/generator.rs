use crate::shortcode::{ShortCode, MAX_LENGTH};
use sha2::{Digest, Sha256};

/// Derives short codes from long URLs.
///
/// Implementations must be deterministic: the same `(long_url, attempt)`
/// pair always yields the same code.
pub trait Generator: Send + Sync + 'static {
    /// Returns the candidate code for the given collision-retry attempt.
    ///
    /// Attempt `0` is the canonical code for `long_url`.
    fn generate_salted(&self, long_url: &str, attempt: u32) -> ShortCode;

    fn generate(&self, long_url: &str) -> ShortCode {
        self.generate_salted(long_url, 0)
    }
}

pub const DEFAULT_CODE_LENGTH: usize = 8;
pub const MIN_CODE_LENGTH: usize = 4;

/// Hex-encoded SHA-256 of the long URL, truncated to `length` characters.
///
/// Salted attempts hash `"{long_url}#{attempt}"`.
#[derive(Debug, Clone, Copy)]
pub struct Sha256Generator {
    length: usize,
}

impl Sha256Generator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
        }
    }

    /// Creates a generator producing codes of `length` hex characters,
    /// clamped to `4..=MAX_LENGTH` so every code stays resolvable.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_CODE_LENGTH, MAX_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for Sha256Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for Sha256Generator {
    fn generate_salted(&self, long_url: &str, attempt: u32) -> ShortCode {
        let digest = match attempt {
            0 => Sha256::digest(long_url.as_bytes()),
            n => Sha256::digest(format!("{long_url}#{n}").as_bytes()),
        };
        let mut code = hex::encode(digest);
        code.truncate(self.length);
        ShortCode::new_unchecked(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_truncated_sha256_hex() {
        let generator = Sha256Generator::new();
        let code = generator.generate("https://example.com/popular");
        assert_eq!(code.as_str(), "9241e624");

        let code = generator.generate("https://example.com/less-popular");
        assert_eq!(code.as_str(), "b40ab5f6");
    }

    #[test]
    fn is_deterministic() {
        let generator = Sha256Generator::new();
        let url = "https://www.example.com/very/long/path";
        assert_eq!(generator.generate(url), generator.generate(url));
        assert_eq!(generator.generate(url).as_str(), "ae497ee3");
    }

    #[test]
    fn salted_attempts_differ_from_canonical_code() {
        let generator = Sha256Generator::new();
        let url = "https://example.com/popular";
        assert_eq!(generator.generate_salted(url, 0), generator.generate(url));
        assert_eq!(generator.generate_salted(url, 1).as_str(), "3937693d");
    }

    #[test]
    fn honours_configured_length() {
        let generator = Sha256Generator::with_length(16);
        let code = generator.generate("https://example.com/popular");
        assert_eq!(code.as_str(), "9241e624c5f2d64b");

        assert_eq!(Sha256Generator::with_length(1).length(), 4);
        assert_eq!(Sha256Generator::with_length(40).length(), MAX_LENGTH);
        assert_eq!(Sha256Generator::with_length(100).length(), MAX_LENGTH);
    }

    #[test]
    fn generated_codes_pass_validation() {
        for length in [MIN_CODE_LENGTH, DEFAULT_CODE_LENGTH, MAX_LENGTH, 64] {
            let code = Sha256Generator::with_length(length).generate("https://example.com");
            assert!(ShortCode::new(code.as_str()).is_ok(), "length {length}");
        }
    }
}
