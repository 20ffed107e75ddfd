//! Resource implementations

pub mod block_storage;
pub mod cdn_zone;
pub mod virtual_file_system_storage;
pub mod waiters;

pub use block_storage::BlockStorageResource;
pub use cdn_zone::CdnZoneResource;
pub use virtual_file_system_storage::VirtualFileSystemStorageResource;

use tfplug::types::{AttributePath, Diagnostic, DynamicValue, StateBuilder};

/// String attribute, empty when null or missing
pub(crate) fn string_attr(value: &DynamicValue, name: &str) -> String {
    value
        .get_string(&AttributePath::new(name))
        .unwrap_or_default()
}

/// Whole-number attribute; `None` when null, unknown or negative
pub(crate) fn u64_attr(value: &DynamicValue, name: &str) -> Option<u64> {
    value
        .get_number(&AttributePath::new(name))
        .ok()
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
}

/// The id of the remote object tracked by a state value
pub(crate) fn state_id(value: &DynamicValue) -> Option<String> {
    value
        .get_string(&AttributePath::new("id"))
        .ok()
        .filter(|id| !id.is_empty())
}

/// `planned` with the remote object's id recorded. If the id cannot be set
/// a warning is pushed and a fresh state holding just the id is returned, so
/// the remote object stays tracked.
pub(crate) fn state_with_id(
    planned: &DynamicValue,
    id: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> DynamicValue {
    let mut state = planned.clone();
    match state.set_string(&AttributePath::new("id"), id) {
        Ok(()) => state,
        Err(e) => {
            diagnostics.push(Diagnostic::warning(
                "Could not record id in planned state",
                format!("Recording id {} on a fresh state instead: {}", id, e),
            ));
            StateBuilder::new().string("id", id).build()
        }
    }
}

/// Minimum size accepted for block and file system storage, in GB
pub(crate) const MIN_SIZE_GB: f64 = 10.0;
