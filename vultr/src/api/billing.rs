//! Billing API implementation

use super::client::Client;
use super::common::{collect_pages, ListOptions, Meta};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingHistory {
    pub id: i64,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub balance: f64,
}

/// Line item of an invoice; pending charges use the same shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub units: i64,
    #[serde(default)]
    pub unit_type: String,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    billing_history: Vec<BillingHistory>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct InvoicePage {
    #[serde(default)]
    billing_invoices: Vec<Invoice>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct InvoiceItemPage {
    #[serde(default)]
    invoice_items: Vec<InvoiceItem>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct PendingChargesResponse {
    #[serde(default)]
    pending_charges: Vec<InvoiceItem>,
}

#[derive(Clone, Copy)]
pub struct BillingApi<'a> {
    client: &'a Client,
}

impl<'a> BillingApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn history_page(
        &self,
        options: &ListOptions,
    ) -> Result<(Vec<BillingHistory>, Meta), ApiError> {
        let page: HistoryPage = self
            .client
            .get(&format!("/v2/billing/history{}", options.to_query_string()))
            .await?;
        Ok((page.billing_history, page.meta))
    }

    pub async fn invoices_page(
        &self,
        options: &ListOptions,
    ) -> Result<(Vec<Invoice>, Meta), ApiError> {
        let page: InvoicePage = self
            .client
            .get(&format!("/v2/billing/invoices{}", options.to_query_string()))
            .await?;
        Ok((page.billing_invoices, page.meta))
    }

    pub async fn invoice_items_page(
        &self,
        invoice_id: i64,
        options: &ListOptions,
    ) -> Result<(Vec<InvoiceItem>, Meta), ApiError> {
        let page: InvoiceItemPage = self
            .client
            .get(&format!(
                "/v2/billing/invoices/{}/items{}",
                invoice_id,
                options.to_query_string()
            ))
            .await?;
        Ok((page.invoice_items, page.meta))
    }

    /// Every billing history entry, across all pages
    pub async fn list_history(&self) -> Result<Vec<BillingHistory>, ApiError> {
        collect_pages(|options| async move { self.history_page(&options).await }).await
    }

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        collect_pages(|options| async move { self.invoices_page(&options).await }).await
    }

    pub async fn list_invoice_items(&self, invoice_id: i64) -> Result<Vec<InvoiceItem>, ApiError> {
        collect_pages(|options| async move { self.invoice_items_page(invoice_id, &options).await })
            .await
    }

    pub async fn pending_charges(&self) -> Result<Vec<InvoiceItem>, ApiError> {
        let response: PendingChargesResponse =
            self.client.get("/v2/billing/pending-charges").await?;
        Ok(response.pending_charges)
    }
}

/// Rounds a currency amount to cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
