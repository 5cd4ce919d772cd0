//! Permission profiles
//!
//! A profile bundles an ordered rule list with a default decision and a
//! security posture. The `ProfileStore` owns all profiles and the
//! active-profile pointer; the factory in `builtin` seeds the immutable
//! conservative/balanced/permissive profiles.

pub mod builtin;
pub mod profile;
pub mod store;

pub use builtin::ensure_built_in_profiles;
pub use profile::{PermissionProfile, ProfileDraft, ProfileUpdate};
pub use store::ProfileStore;
