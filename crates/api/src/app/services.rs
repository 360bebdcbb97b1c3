use std::{convert::Infallible, path::{Path, PathBuf}, sync::Arc, time::Duration};

use anyhow::Context;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use uuid::Uuid;

use bakery_auth::{Hs256Jwt, JwtValidator};
use bakery_events::EventEnvelope;
use bakery_infra::config::{AppConfig, StoreBackend};
use bakery_infra::store::{InMemoryStore, Store};
use bakery_infra::{EventPublisher, Services};

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RealtimeMessage {
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl From<&EventEnvelope> for RealtimeMessage {
    fn from(envelope: &EventEnvelope) -> Self {
        Self {
            event_type: envelope.event_type().to_string(),
            aggregate_type: envelope.aggregate_type().to_string(),
            aggregate_id: envelope.aggregate_id(),
            occurred_at: envelope.occurred_at(),
            payload: envelope.payload().clone(),
        }
    }
}

/// Forwards committed envelopes to SSE subscribers. Lossy: with no
/// subscribers, or a lagging one, messages are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<RealtimeMessage>,
}

impl BroadcastPublisher {
    pub fn new(tx: broadcast::Sender<RealtimeMessage>) -> Self {
        Self { tx }
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, envelope: EventEnvelope) {
        let _ = self.tx.send(RealtimeMessage::from(&envelope));
    }
}

/// Everything a handler needs, shared through an `Extension`.
pub struct AppServices {
    pub services: Services,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    upload_dir: PathBuf,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>, config: &AppConfig) -> Self {
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
        let jwt = Arc::new(Hs256Jwt::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::hours(config.token_ttl_hours),
        ));
        let publisher = Arc::new(BroadcastPublisher::new(realtime_tx.clone()));
        let services = Services::new(store, publisher, jwt);
        Self {
            services,
            realtime_tx,
            upload_dir: config.upload_dir.clone(),
        }
    }

    /// Lower the bcrypt cost (tests).
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.services = self.services.with_password_cost(cost);
        self
    }

    /// Connect the configured store, create the schema and the bootstrap admin.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = build_store(config).await?;
        let app = Self::new(store, config);

        if let Some(admin) = &config.bootstrap_admin {
            let created = app
                .services
                .ensure_admin(&admin.email, &admin.password)
                .await
                .context("failed to create bootstrap admin")?;
            if created {
                tracing::info!(email = %admin.email, "bootstrap admin created");
            }
        }

        tokio::fs::create_dir_all(&app.upload_dir)
            .await
            .with_context(|| format!("failed to create upload dir {}", app.upload_dir.display()))?;

        Ok(app)
    }

    pub fn jwt_validator(&self) -> Arc<dyn JwtValidator> {
        self.services.jwt()
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when STORE_BACKEND=postgres")?;
            let store = bakery_infra::store::PgStore::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to postgres")?;
            store.migrate().await.context("failed to create schema")?;
            tracing::info!(max_connections = config.db_max_connections, "using postgres store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => {
            anyhow::bail!("STORE_BACKEND=postgres requires the `postgres` feature")
        }
    }
}

/// Build the SSE stream behind `/api/stream`.
pub fn sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => Some(Ok(sse_event(&m))),
        Err(e) => {
            tracing::warn!(error = %e, "sse subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn sse_data(message: &RealtimeMessage) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        tracing::warn!(
            error = %e,
            event_type = %message.event_type,
            aggregate_id = %message.aggregate_id,
            "failed to serialize realtime message"
        );
        "{}".to_string()
    })
}

fn sse_event(message: &RealtimeMessage) -> SseEvent {
    SseEvent::default()
        .event(message.event_type.as_str())
        .data(sse_data(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some("unit-secret".to_string()),
            "BOOTSTRAP_ADMIN_EMAIL" => Some("root@bakery.test".to_string()),
            "BOOTSTRAP_ADMIN_PASSWORD" => Some("rootpass".to_string()),
            "UPLOAD_DIR" => Some(std::env::temp_dir().join("bakery-api-unit").display().to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn realtime_messages_serialize_for_the_wire() {
        let message = RealtimeMessage {
            event_type: "delivery.claimed".into(),
            aggregate_type: "delivery".into(),
            aggregate_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            payload: serde_json::json!({ "driver_id": "d-1" }),
        };
        let data: serde_json::Value = serde_json::from_str(&sse_data(&message)).unwrap();
        assert_eq!(data["event_type"], "delivery.claimed");
        assert_eq!(data["aggregate_id"], message.aggregate_id.to_string());
        assert_eq!(data["payload"]["driver_id"], "d-1");
    }

    #[tokio::test]
    async fn from_config_bootstraps_admin_on_memory_store() {
        let app = AppServices::from_config(&config()).await.unwrap();
        let session = app.services.login("root@bakery.test", "rootpass").await.unwrap();
        assert_eq!(session.user.role, bakery_auth::Role::Admin);

        let claims = app.jwt_validator().validate(&session.token, Utc::now()).unwrap();
        assert_eq!(claims.sub, session.user.id);
    }

    #[tokio::test]
    async fn committed_changes_reach_subscribers() {
        let app = AppServices::from_config(&config()).await.unwrap();
        let mut rx = app.realtime_tx().subscribe();

        let admin = app.services.login("root@bakery.test", "rootpass").await.unwrap();
        let principal = bakery_auth::Principal::new(admin.user.id, admin.user.role);
        let category = app.services.create_category("Breads", None).await.unwrap();
        let product = app
            .services
            .create_product(bakery_catalog::ProductDraft {
                name: "Baguette".into(),
                description: None,
                base_price: bakery_core::Money::from_cents(250),
                category_id: category.id,
                image_url: None,
                customizable: false,
                showcase_stock: 3,
            })
            .await
            .unwrap();
        app.services
            .place_order(
                &principal,
                bakery_infra::services::PlaceOrder {
                    user_id: None,
                    fulfillment: bakery_sales::Fulfillment::Pickup,
                    scheduled_for: Utc::now(),
                    delivery_address: None,
                    address_reference: None,
                    lines: vec![bakery_infra::services::PlaceOrderLine {
                        product_id: product.id,
                        quantity: 1,
                        customization: None,
                    }],
                    notes: None,
                    shipping_cost: None,
                    payment_method: None,
                    driver_id: None,
                },
            )
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event_type, "order.placed");
        assert_eq!(msg.aggregate_type, "order");
    }
}
