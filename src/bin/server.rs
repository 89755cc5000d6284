//! Demo server: registers a small model set and mounts the model, auth, and
//! common routes. Uses PostgreSQL when DATABASE_URL is set, otherwise an
//! in-memory store.

use modelgate::auth::dev::{DevHasher, DevTokenIssuer, LogMailer};
use modelgate::{
    auth_routes, common_routes, model_routes, AllowAll, AppState, FieldDescriptor, FieldType,
    KeyType, MemoryStorage, ModelRegistry, PgStorage, PluginConfig, SchemaBuilder, Storage,
};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn registry() -> Result<ModelRegistry, modelgate::AppError> {
    ModelRegistry::builder()
        .model(
            SchemaBuilder::new("auth", "User")
                .table("auth_user")
                .key("id", KeyType::Int)
                .field(FieldDescriptor::new("username", FieldType::ShortText).max_length(150))
                .field(FieldDescriptor::new("password", FieldType::LongText))
                .field(FieldDescriptor::new("email", FieldType::Email))
                .field(FieldDescriptor::new("is_active", FieldType::Boolean).default_value(false.into()))
                .build(),
        )
        .model(
            SchemaBuilder::new("shop", "Country")
                .table("shop_country")
                .field(FieldDescriptor::new("name", FieldType::ShortText).max_length(100))
                .build(),
        )
        .model(
            SchemaBuilder::new("shop", "Customer")
                .table("shop_customer")
                .field(FieldDescriptor::new("name", FieldType::ShortText).max_length(100))
                .field(FieldDescriptor::new("dob", FieldType::Date).nullable())
                .field(FieldDescriptor::new("email", FieldType::Email))
                .field(FieldDescriptor::new("phone_no", FieldType::ShortText).max_length(20))
                .field(FieldDescriptor::new("address", FieldType::LongText).nullable())
                .field(FieldDescriptor::new("pin_code", FieldType::ShortText).max_length(10).nullable())
                .field(FieldDescriptor::new("status", FieldType::ShortText).max_length(20).nullable())
                .field(
                    FieldDescriptor::new("country", FieldType::ForeignKey)
                        .nullable()
                        .references("shop.Country"),
                )
                .build(),
        )
        .internal_namespace("auth")
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("modelgate=info".parse()?))
        .init();

    let storage: Arc<dyn Storage> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            tracing::info!("using postgres backend");
            Arc::new(PgStorage::new(pool))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory backend");
            Arc::new(MemoryStorage::new())
        }
    };

    let state = AppState {
        registry: Arc::new(registry()?),
        storage,
        gate: Arc::new(AllowAll),
        config: Arc::new(PluginConfig::default()),
        hasher: Arc::new(DevHasher),
        tokens: Arc::new(DevTokenIssuer::new()),
        mailer: Arc::new(LogMailer),
    };

    let app = Router::new()
        .merge(common_routes())
        .nest("/api/v1", model_routes(state.clone()))
        .nest("/api/v1", auth_routes(state));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
