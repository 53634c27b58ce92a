//! Input validation and sanitization
//!
//! Interface names end up in shell arguments and sysfs paths, SSIDs end up
//! as YAML keys. Addresses are deliberately not checked here; netplan is
//! the judge of those.

use crate::error::{NetplanError, NetplanResult};

/// Maximum length for interface names (Linux kernel limit is 15)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Maximum SSID length in bytes (802.11)
const MAX_SSID_LEN: usize = 32;

/// Maximum length for error messages shown to users
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Validate interface name to prevent command injection
///
/// Interface names must be alphanumeric with optional dashes and underscores,
/// and no longer than 15 characters (Linux kernel limit)
pub fn validate_interface_name(name: &str) -> NetplanResult<()> {
    if name.is_empty() {
        return Err(NetplanError::InvalidParameter(
            "Interface name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(NetplanError::InvalidParameter(
            format!("Interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN)
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(NetplanError::InvalidParameter(
                format!("Invalid interface name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    // Don't allow names starting with dash (could be interpreted as option)
    if name.starts_with('-') {
        return Err(NetplanError::InvalidParameter(
            "Interface name cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Validate WiFi SSID
///
/// SSIDs can be 1-32 bytes; control characters would break the YAML key
pub fn validate_ssid(ssid: &str) -> NetplanResult<()> {
    if ssid.is_empty() {
        return Err(NetplanError::InvalidParameter(
            "SSID cannot be empty".to_string()
        ));
    }

    if ssid.len() > MAX_SSID_LEN {
        return Err(NetplanError::InvalidParameter(
            format!("SSID cannot exceed {} bytes", MAX_SSID_LEN)
        ));
    }

    if ssid.chars().any(|c| c.is_control()) {
        return Err(NetplanError::InvalidParameter(
            "SSID contains invalid control characters".to_string()
        ));
    }

    Ok(())
}

/// Sanitize error messages before they leave the process
pub fn sanitize_error_message(stderr: &str) -> String {
    let mut sanitized = stderr.trim().to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("... (truncated)");
    }

    sanitized
}
