use tracing::warn;
use ulid::Ulid;

/// Literal prefix of every generated auth key.
pub const AUTH_KEY_PREFIX: &str = "INITKEY";

/// Source of session-unique random keys.
pub trait SessionKeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default generator backed by ULIDs (48-bit timestamp + 80 random bits).
#[derive(Debug, Default, Clone, Copy)]
pub struct UlidSessionKeys;

impl SessionKeyGenerator for UlidSessionKeys {
    fn generate(&self) -> String {
        Ulid::new().to_string()
    }
}

/// Builds auth keys of the form `INITKEY<session key>`.
pub struct AuthKeyProvider<'a> {
    generator: &'a dyn SessionKeyGenerator,
}

impl<'a> AuthKeyProvider<'a> {
    pub fn new(generator: &'a dyn SessionKeyGenerator) -> Self {
        Self { generator }
    }

    pub fn generate(&self) -> String {
        let suffix = self.generator.generate();
        let suffix = if suffix.trim().is_empty() {
            warn!("session key generator returned an empty key, falling back to ULID");
            UlidSessionKeys.generate()
        } else {
            suffix
        };
        format!("{AUTH_KEY_PREFIX}{suffix}")
    }
}
