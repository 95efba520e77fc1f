//! Shared primitive types used across the entire engine.

/// A subscriber identifier as it appears in the panel exports.
/// Usually a phone number, sometimes an arbitrary username.
pub type UserId = String;

/// Two-letter Brazilian state code (UF).
pub type StateCode = String;
