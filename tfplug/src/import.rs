//! Import helpers for simplifying resource import implementations

use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// This is useful for simple resources where the import ID maps directly to
/// a single attribute in the resource state. The host follows up with a read
/// that fills in everything else.
///
/// Example: ID "cb676a46-66fd-4dfb-b839-443f2e6c0b60" -> state.id = "cb676a46-..."
pub fn import_state_passthrough_id(
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let mut response = ImportResourceStateResponse {
        imported_resources: Vec::new(),
        diagnostics: Vec::new(),
    };

    if request.id.is_empty() {
        response.diagnostics.push(
            Diagnostic::error("Invalid import ID", "The import ID must not be empty")
                .with_attribute(attr_path),
        );
        return response;
    }

    let mut state = DynamicValue::empty_object();
    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{:?}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return response;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
    response
}
