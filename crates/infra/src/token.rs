use uuid::Uuid;

use tokenforge_core::TokenGenerator;

/// Opaque tokens from random UUIDv4s, rendered as 32 lowercase hex digits.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokenGenerator;

impl UuidTokenGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl TokenGenerator for UuidTokenGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
