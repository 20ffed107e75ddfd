//! Data source implementations
//!
//! Every list-style data source fetches the full collection and filters it
//! client-side. Items are matched by their JSON field names.

pub mod billing_history;
pub mod cdn_zones;
pub mod invoice_items;
pub mod invoices;
pub mod pending_charges;

pub use billing_history::BillingHistoryDataSource;
pub use cdn_zones::{CdnZoneDataSource, CdnZonesDataSource};
pub use invoice_items::InvoiceItemsDataSource;
pub use invoices::{InvoiceDataSource, InvoicesDataSource};
pub use pending_charges::PendingChargesDataSource;

use serde::Serialize;
use tfplug::filter::{matches_all, Filter};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

pub(crate) const TOO_MANY_RESULTS: &str =
    "your search returned too many results. Please refine your search to be more specific";
pub(crate) const NO_RESULTS: &str = "no results were found";

/// Parses the `filter` blocks of a config
pub(crate) fn read_filters(config: &DynamicValue) -> Result<Option<Vec<Filter>>, Diagnostic> {
    Filter::from_config(config)
        .map_err(|e| Diagnostic::error("Invalid filter", format!("Issue with filter: {}", e)))
}

/// Like [`read_filters`] for data sources that must be narrowed to one item
pub(crate) fn required_filters(config: &DynamicValue) -> Result<Vec<Filter>, Diagnostic> {
    read_filters(config)?.ok_or_else(|| {
        Diagnostic::error(
            "Missing filter",
            "At least one filter block is required to select a single result",
        )
    })
}

/// Keeps the items matching every filter; no filters keeps everything
pub(crate) fn filter_items<T: Serialize>(
    items: Vec<T>,
    filters: Option<&[Filter]>,
) -> Result<Vec<T>, Diagnostic> {
    let Some(filters) = filters else {
        return Ok(items);
    };

    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let attributes = Dynamic::from_serializable(&item).map_err(|e| {
            Diagnostic::error("Failed to filter results", format!("Encoding error: {}", e))
        })?;
        if matches_all(filters, &attributes) {
            kept.push(item);
        }
    }
    Ok(kept)
}

/// The only item of a filtered result
pub(crate) fn single<T>(items: Vec<T>) -> Result<T, Diagnostic> {
    if items.len() > 1 {
        return Err(Diagnostic::error("Too many results", TOO_MANY_RESULTS));
    }
    items
        .into_iter()
        .next()
        .ok_or_else(|| Diagnostic::error("No results", NO_RESULTS))
}
