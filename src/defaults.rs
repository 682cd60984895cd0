//! Default values for loader configuration and manifest handling.

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const BASE_URL_ENV: &str = "REMOTE_MODULES_BASE_URL";

/// Separator used when serializing a module key.
pub const KEY_SEPARATOR: char = '#';

/// Base URL used when a derived base would be empty.
pub const ROOT_BASE_URL: &str = "/";

/// Registration method stamped on manifests built from raw stats.
pub const CUSTOM_REGISTRATION: &str = "custom";

pub fn request_timeout_secs() -> u64 { REQUEST_TIMEOUT_SECS }
pub fn base_url() -> String { ROOT_BASE_URL.to_string() }
pub fn registration_method() -> String { CUSTOM_REGISTRATION.to_string() }
