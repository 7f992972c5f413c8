//! Platform-specific integrations that sit outside the core RPC/event surface.

#[cfg(feature = "apns")]
pub mod apns;
