mod version_check;

pub use version_check::{
    current_version, fetch_latest_version, is_newer_version, spawn_version_check, VersionStatus,
};
