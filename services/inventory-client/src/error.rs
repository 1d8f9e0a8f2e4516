use uuid::Uuid;

/// Errors surfaced by [`crate::InventoryClient`].
///
/// `Api` carries the service's own error body so callers can show the
/// service message verbatim and branch on the stable `code`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A two-leg transfer debited the source item but failed to credit the
    /// destination. Stock has left `from` and not arrived at `to`; nothing
    /// is rolled back, so the caller must reconcile (or re-credit) manually.
    #[error("transfer stranded: {quantity} units left item {from} but were not credited to item {to}: {source}")]
    StrandedDebit {
        from: Uuid,
        to: Uuid,
        quantity: i32,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// The service error code, when this is an API-level failure.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_stranded_transfer(&self) -> bool {
        matches!(self, Self::StrandedDebit { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
