// ABOUTME: Validated domain types for tenants, containers, and images.
// ABOUTME: Newtype constructors reject malformed values at the boundary.

mod container_id;
mod credential;
mod fingerprint;
mod image_ref;

pub use container_id::ContainerId;
pub use credential::Credential;
pub use fingerprint::{CONTAINER_NAME_PREFIX, FingerprintError, TenantFingerprint};
pub use image_ref::{ImageRef, ParseImageRefError};
