//! Common type definitions.
//!
//! Entity ids owned by this service are UUIDs wrapped in type aliases. Zones and records are
//! mirrors of provider-side objects, so they keep the provider's own string identifiers.
//!
//! - [`UserId`]: User account identifier
//! - [`DnsTokenId`]: Linked provider token identifier
//! - [`ApiKeyId`]: API key identifier
//! - [`DeviceCodeId`]: Device authorization request identifier
//! - [`ZoneId`] / [`RecordId`]: Provider zone and record identifiers
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type DnsTokenId = Uuid;
pub type ApiKeyId = Uuid;
pub type DeviceCodeId = Uuid;
pub type ZoneId = String;
pub type RecordId = String;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
