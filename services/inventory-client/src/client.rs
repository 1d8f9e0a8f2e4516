use crate::error::{ClientError, ClientResult};
use crate::types::{
    Envelope, ErrorBody, InventoryItem, InventoryStats, ItemFilter, ItemRef, ListEnvelope,
    NewItem, Page, StockAdjustment, StockMovement, StockMovementType, StockTransaction,
    TransactionQuery, TransferReceipt, UpdateItem,
};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// HTTP client for the inventory service.
///
/// Tenant and identity are fixed at construction and sent as headers on
/// every request, mirroring what the gateway forwards. Each call stamps a
/// fresh `X-Trace-ID`.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub roles: Vec<String>,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl InventoryClient {
    pub fn new(base_url: impl Into<String>, tenant_id: Uuid, identity: Identity) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Tenant-ID",
            HeaderValue::from_str(&tenant_id.to_string())
                .map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
        );
        if !identity.roles.is_empty() {
            headers.insert(
                "X-Roles",
                HeaderValue::from_str(&identity.roles.join(","))
                    .map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
            );
        }
        if let Some(id) = identity.user_id {
            headers.insert(
                "X-User-ID",
                HeaderValue::from_str(&id.to_string())
                    .map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
            );
        }
        if let Some(name) = identity.user_name.as_deref() {
            headers.insert(
                "X-User-Name",
                HeaderValue::from_str(name).map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
            );
        }
        if let Some(email) = identity.user_email.as_deref() {
            headers.insert(
                "X-User-Email",
                HeaderValue::from_str(email).map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
            );
        }
        let http = reqwest::Client::builder().default_headers(headers).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn trace_id() -> HeaderValue {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap_or(HeaderValue::from_static(""))
    }

    async fn into_api_error(resp: Response) -> ClientError {
        let status = resp.status().as_u16();
        let body: ErrorBody = match resp.json().await {
            Ok(body) => body,
            Err(_) => ErrorBody { code: None, message: None },
        };
        let code = body.code.unwrap_or_else(|| "unknown".into());
        let message = body.message.unwrap_or_else(|| format!("request failed with status {status}"));
        ClientError::Api { status, code, message }
    }

    async fn expect_data<T: DeserializeOwned>(resp: Response) -> ClientResult<T> {
        if !resp.status().is_success() {
            return Err(Self::into_api_error(resp).await);
        }
        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }

    async fn expect_page<T: DeserializeOwned>(resp: Response) -> ClientResult<Page<T>> {
        if !resp.status().is_success() {
            return Err(Self::into_api_error(resp).await);
        }
        let envelope: ListEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(Page {
            items: envelope.data,
            total: envelope.total,
            page: envelope.pagination.page,
            limit: envelope.pagination.limit,
            total_pages: envelope.pagination.total_pages,
        })
    }

    pub async fn list_items(&self, filter: &ItemFilter) -> ClientResult<Page<InventoryItem>> {
        let resp = self
            .http
            .get(self.url("/inventory"))
            .header("X-Trace-ID", Self::trace_id())
            .query(&filter.to_query_pairs())
            .send()
            .await?;
        Self::expect_page(resp).await
    }

    /// Resolves an item reference. `ItemRef::New` is an item that does not
    /// exist yet: it yields `Ok(None)` without any request.
    pub async fn fetch_item(&self, item: ItemRef) -> ClientResult<Option<InventoryItem>> {
        let id = match item {
            ItemRef::New => return Ok(None),
            ItemRef::Existing(id) => id,
        };
        let resp = self
            .http
            .get(self.url(&format!("/inventory/{id}")))
            .header("X-Trace-ID", Self::trace_id())
            .send()
            .await?;
        let item = Self::expect_data(resp).await?;
        Ok(Some(item))
    }

    pub async fn create_item(&self, item: &NewItem) -> ClientResult<InventoryItem> {
        let resp = self
            .http
            .post(self.url("/inventory"))
            .header("X-Trace-ID", Self::trace_id())
            .json(item)
            .send()
            .await?;
        Self::expect_data(resp).await
    }

    pub async fn update_item(&self, id: Uuid, item: &UpdateItem) -> ClientResult<InventoryItem> {
        let resp = self
            .http
            .put(self.url(&format!("/inventory/{id}")))
            .header("X-Trace-ID", Self::trace_id())
            .json(item)
            .send()
            .await?;
        Self::expect_data(resp).await
    }

    /// Deactivates an item. The service soft-deletes; the returned item has
    /// `is_active == false`.
    pub async fn delete_item(&self, id: Uuid) -> ClientResult<InventoryItem> {
        let resp = self
            .http
            .delete(self.url(&format!("/inventory/{id}")))
            .header("X-Trace-ID", Self::trace_id())
            .send()
            .await?;
        Self::expect_data(resp).await
    }

    /// Records one stock movement. When `transaction_date` is unset it is
    /// stamped with the current time here, before the request leaves the
    /// process.
    pub async fn update_stock_level(
        &self,
        item_id: Uuid,
        mut movement: StockMovement,
    ) -> ClientResult<StockAdjustment> {
        if movement.transaction_date.is_none() {
            movement.transaction_date = Some(Utc::now());
        }
        let resp = self
            .http
            .patch(self.url(&format!("/inventory/{item_id}/stock")))
            .header("X-Trace-ID", Self::trace_id())
            .json(&movement)
            .send()
            .await?;
        Self::expect_data(resp).await
    }

    pub async fn list_transactions(
        &self,
        item_id: Uuid,
        query: &TransactionQuery,
    ) -> ClientResult<Page<StockTransaction>> {
        let resp = self
            .http
            .get(self.url(&format!("/inventory/{item_id}/transactions")))
            .header("X-Trace-ID", Self::trace_id())
            .query(&query.to_query_pairs())
            .send()
            .await?;
        Self::expect_page(resp).await
    }

    pub async fn low_stock_items(&self) -> ClientResult<Vec<InventoryItem>> {
        let resp = self
            .http
            .get(self.url("/inventory/low-stock"))
            .header("X-Trace-ID", Self::trace_id())
            .send()
            .await?;
        Self::expect_data(resp).await
    }

    pub async fn inventory_stats(&self) -> ClientResult<InventoryStats> {
        let resp = self
            .http
            .get(self.url("/inventory/stats"))
            .header("X-Trace-ID", Self::trace_id())
            .send()
            .await?;
        Self::expect_data(resp).await
    }

    /// Moves `quantity` units from one item to another as two sequential
    /// stock movements: a debit on `from`, then a credit on `to`. Both legs
    /// share a reference number, and each leg's reason names the other item
    /// (with the caller's `reason` appended when given).
    ///
    /// This is not atomic. If the debit fails nothing has moved and the
    /// error propagates as-is; the credit is never attempted. If the credit
    /// fails after the debit committed, the stock is gone from `from` and
    /// not yet on `to`, and the error comes back as
    /// [`ClientError::StrandedDebit`] so the caller can reconcile.
    pub async fn transfer_stock(
        &self,
        from: Uuid,
        to: Uuid,
        quantity: i32,
        reason: Option<String>,
        department: Option<String>,
    ) -> ClientResult<TransferReceipt> {
        if quantity <= 0 {
            return Err(ClientError::InvalidRequest(
                "transfer quantity must be positive".into(),
            ));
        }
        if from == to {
            return Err(ClientError::InvalidRequest(
                "cannot transfer an item to itself".into(),
            ));
        }

        let reference = format!("XFER-{}", Uuid::new_v4());

        let mut debit = StockMovement::new(StockMovementType::Transfer, -quantity);
        debit.department = department.clone();
        debit.reference_number = Some(reference.clone());
        debit.reason = Some(compose_reason(format!("Transfer to item {to}"), reason.as_deref()));
        let debit = self.update_stock_level(from, debit).await?;

        let mut credit = StockMovement::new(StockMovementType::Transfer, quantity);
        credit.department = department;
        credit.reference_number = Some(reference);
        credit.reason = Some(compose_reason(format!("Transfer from item {from}"), reason.as_deref()));
        match self.update_stock_level(to, credit).await {
            Ok(credit) => Ok(TransferReceipt {
                debit: debit.transaction,
                credit: credit.transaction,
            }),
            Err(source) => {
                tracing::error!(
                    %from,
                    %to,
                    quantity,
                    debit_transaction = %debit.transaction.id,
                    "Transfer credit failed after debit committed"
                );
                Err(ClientError::StrandedDebit {
                    from,
                    to,
                    quantity,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Issues stock to a department (housekeeping cart, kitchen, minibar
    /// restock run): a single debit leg with the department recorded.
    pub async fn transfer_to_department(
        &self,
        item_id: Uuid,
        quantity: i32,
        department: impl Into<String>,
        reason: Option<String>,
    ) -> ClientResult<StockAdjustment> {
        if quantity <= 0 {
            return Err(ClientError::InvalidRequest(
                "transfer quantity must be positive".into(),
            ));
        }
        let department = department.into();
        let mut movement = StockMovement::new(StockMovementType::Transfer, -quantity);
        movement.reason = Some(compose_reason(format!("Issued to {department}"), reason.as_deref()));
        movement.department = Some(department);
        self.update_stock_level(item_id, movement).await
    }

    /// True when an API error is the service's insufficient-stock rejection.
    pub fn is_insufficient_stock(err: &ClientError) -> bool {
        matches!(
            err,
            ClientError::Api { status, code, .. }
                if *status == StatusCode::BAD_REQUEST.as_u16() && code == "insufficient_stock"
        )
    }
}

// Leg reasons always lead with the generated counterpart reference; a
// caller-supplied reason is appended after it.
fn compose_reason(generated: String, caller: Option<&str>) -> String {
    match caller.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("{generated}: {extra}"),
        None => generated,
    }
}
