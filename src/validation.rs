//! Input validation for GroupCore.
//!
//! This module provides validation functions for all user inputs.
//! All validators return GroupError::Validation on failure.

use uuid::Uuid;

use crate::error::{GroupError, GroupResult};

// Limits
pub const MAX_DISPLAY_NAME_LENGTH: usize = 200;
pub const MAX_LOCATOR_LENGTH: usize = 2048;
pub const MAX_FILE_NAME_LENGTH: usize = 255;
pub const MAX_REMOTE_ID_LENGTH: usize = 128;
pub const UUID_HEX_LENGTH: usize = 32;

/// Validate a local document ID (32-char lowercase hex UUID).
///
/// Returns the parsed Uuid so callers can go straight to BLOB bytes.
pub fn validate_local_id(value: &str, field_name: &str) -> GroupResult<Uuid> {
    if value.len() != UUID_HEX_LENGTH || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GroupError::validation(
            field_name,
            format!(
                "must be a {}-character hex UUID, got {:?}",
                UUID_HEX_LENGTH, value
            ),
        ));
    }

    Uuid::parse_str(value).map_err(|e| GroupError::validation(field_name, e.to_string()))
}

/// Validate a group display name.
pub fn validate_display_name(value: &str) -> GroupResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GroupError::validation(
            "display_name",
            "display name cannot be empty",
        ));
    }
    if value.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(GroupError::validation(
            "display_name",
            format!(
                "display name cannot exceed {} characters",
                MAX_DISPLAY_NAME_LENGTH
            ),
        ));
    }
    Ok(())
}

/// Validate an asset locator (the URL the remote provider pulls content from).
///
/// The locator is opaque to us beyond being non-empty, bounded, and free of
/// control characters; the remote provider resolves it for upload.
pub fn validate_locator(value: &str) -> GroupResult<()> {
    if value.trim().is_empty() {
        return Err(GroupError::validation("url", "asset locator cannot be empty"));
    }
    if value.len() > MAX_LOCATOR_LENGTH {
        return Err(GroupError::validation(
            "url",
            format!("asset locator cannot exceed {} characters", MAX_LOCATOR_LENGTH),
        ));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(GroupError::validation(
            "url",
            "asset locator cannot contain control characters",
        ));
    }
    Ok(())
}

/// Validate an asset file name.
pub fn validate_file_name(value: &str) -> GroupResult<()> {
    if value.trim().is_empty() {
        return Err(GroupError::validation(
            "file_name",
            "file name cannot be empty",
        ));
    }
    if value.len() > MAX_FILE_NAME_LENGTH {
        return Err(GroupError::validation(
            "file_name",
            format!("file name cannot exceed {} characters", MAX_FILE_NAME_LENGTH),
        ));
    }
    Ok(())
}

/// Validate a remote provider identifier (group or member id).
pub fn validate_remote_id(value: &str, field_name: &str) -> GroupResult<()> {
    if value.trim().is_empty() {
        return Err(GroupError::validation(field_name, "cannot be empty"));
    }
    if value.len() > MAX_REMOTE_ID_LENGTH {
        return Err(GroupError::validation(
            field_name,
            format!("cannot exceed {} characters", MAX_REMOTE_ID_LENGTH),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_local_id_accepts_simple_uuid() {
        let id = Uuid::now_v7().simple().to_string();
        let parsed = validate_local_id(&id, "group_id").unwrap();
        assert_eq!(parsed.simple().to_string(), id);
    }

    #[test]
    fn test_validate_local_id_rejects_bad_input() {
        assert!(validate_local_id("", "group_id").is_err());
        assert!(validate_local_id("not-a-uuid", "group_id").is_err());
        assert!(validate_local_id("zzzz0000zzzz0000zzzz0000zzzz0000", "group_id").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("My Avatars").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(MAX_DISPLAY_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_locator() {
        assert!(validate_locator("https://cdn.example.com/a.png").is_ok());
        assert!(validate_locator("img://a1").is_ok());
        assert!(validate_locator("").is_err());
        assert!(validate_locator("bad\nlocator").is_err());
        assert!(validate_locator(&"u".repeat(MAX_LOCATOR_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("portrait.png").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(&"f".repeat(MAX_FILE_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_remote_id() {
        assert!(validate_remote_id("grp_12345", "remote_group_id").is_ok());
        assert!(validate_remote_id("", "remote_group_id").is_err());
        assert!(validate_remote_id(&"r".repeat(MAX_REMOTE_ID_LENGTH + 1), "remote_group_id").is_err());
    }
}
