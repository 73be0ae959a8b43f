//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`AccountId`]: Credit-holding account
//! - [`JobId`]: Enhancement job
//! - [`VariationId`]: One candidate output of a job
//! - [`ArtifactId`]: Upscaled final artifact
//! - [`TransactionId`]: Ledger transaction (purchase or refund)

use uuid::Uuid;

// Type aliases for IDs
pub type AccountId = Uuid;
pub type JobId = Uuid;
pub type VariationId = Uuid;
pub type ArtifactId = Uuid;
pub type TransactionId = Uuid;

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
