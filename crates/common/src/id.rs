//! ID and token generation.

use ulid::Ulid;
use uuid::Uuid;

/// Generator for entity IDs and opaque tokens.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new lowercase ULID.
    ///
    /// ULIDs sort by creation time, which keeps `id` usable as a secondary
    /// ordering key next to `created_at`.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a session token.
    ///
    /// Two random v4 UUIDs give 244 bits of randomness with no time component.
    #[must_use]
    pub fn generate_session_token(&self) -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    /// Generate an OAuth `state` value for CSRF protection.
    #[must_use]
    pub fn generate_state(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
