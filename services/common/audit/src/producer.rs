use crate::{AuditActor, AuditError, AuditEvent, AuditResult, AuditSeverity, AUDIT_EVENT_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Delivery seam for audit events. Services emit through an [`AuditProducer`]
/// and stay agnostic of where events land.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, event: &AuditEvent) -> AuditResult<()>;
}

/// Drops events. Used by tests and by services started without an audit store.
#[derive(Debug, Default, Clone)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn deliver(&self, _event: &AuditEvent) -> AuditResult<()> { Ok(()) }
}

/// Writes events to the `audit_events` table of the service's own database.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn deliver(&self, event: &AuditEvent) -> AuditResult<()> {
        sqlx::query(
            "INSERT INTO audit_events (event_id, event_version, tenant_id, actor_id, actor_name, actor_email, entity_type, entity_id, action, occurred_at, source_service, severity, trace_id, payload, meta)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(event.event_id)
        .bind(event.event_version)
        .bind(event.tenant_id)
        .bind(event.actor.id)
        .bind(event.actor.name.as_deref())
        .bind(event.actor.email.as_deref())
        .bind(&event.entity_type)
        .bind(event.entity_id)
        .bind(&event.action)
        .bind(event.occurred_at)
        .bind(&event.source_service)
        .bind(event.severity.as_str())
        .bind(event.trace_id)
        .bind(&event.payload)
        .bind(&event.meta)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Database(e.to_string()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuditProducer {
    sink: Arc<dyn AuditSink>,
    source_service: String,
}

impl AuditProducer {
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self { sink: Arc::new(sink), source_service: "unknown".into() }
    }

    pub fn for_service(sink: impl AuditSink + 'static, source_service: impl Into<String>) -> Self {
        Self { sink: Arc::new(sink), source_service: source_service.into() }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn emit(
        &self,
        tenant_id: Uuid,
        actor: AuditActor,
        entity_type: impl Into<String>,
        entity_id: Option<Uuid>,
        action: impl Into<String>,
        severity: AuditSeverity,
        trace_id: Option<Uuid>,
        payload: serde_json::Value,
        meta: serde_json::Value,
    ) -> AuditResult<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4(),
            event_version: AUDIT_EVENT_VERSION,
            tenant_id,
            actor,
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
            occurred_at: Utc::now(),
            source_service: self.source_service.clone(),
            severity,
            trace_id,
            payload,
            meta,
        };
        self.sink.deliver(&event).await?;
        Ok(event)
    }
}

pub fn extract_actor_from_headers(headers: &axum::http::HeaderMap, claims_raw: &serde_json::Value, subject: Uuid) -> AuditActor {
    use axum::http::HeaderMap;
    fn header_str(map: &HeaderMap, name: &str) -> Option<String> {
        map.get(name).and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }
    let mut actor = AuditActor { id: Some(subject), name: None, email: None };
    actor.name = claims_raw.get("name").and_then(|v| v.as_str()).map(|s| s.to_string());
    actor.email = claims_raw.get("email").and_then(|v| v.as_str()).map(|s| s.to_string());
    if let Some(v) = header_str(headers, "X-User-ID").and_then(|s| Uuid::parse_str(&s).ok()) { actor.id = Some(v); }
    if let Some(v) = header_str(headers, "X-User-Name") { actor.name = Some(v); }
    if let Some(v) = header_str(headers, "X-User-Email") { actor.email = Some(v); }
    actor
}
