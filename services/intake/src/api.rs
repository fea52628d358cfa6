use crate::config::ApiConfig;
use crate::error::IntakeError;
use crate::intake::IntakeService;
use crate::item::{DeleteItemForm, ImageUpload, NewItemForm, UpdateItemForm};
use crate::pages;
use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::FormRejection,
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Form, Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};

/// Message returned when the request body cannot be decoded as a form
const MALFORMED_FORM: &str = "Malformed form submission.";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<IntakeService>,
    pub service_name: String,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/",
            get(add_item_form).post(add_item).fallback(method_not_allowed),
        )
        .route(
            "/add-item/",
            get(add_item_form).post(add_item).fallback(method_not_allowed),
        )
        .route(
            "/read_all_items/",
            get(read_all_items).fallback(method_not_allowed),
        )
        .route(
            "/update_item/",
            get(update_item_form)
                .post(update_item)
                .fallback(method_not_allowed),
        )
        .route(
            "/delete_item/",
            get(delete_item_form)
                .post(delete_item)
                .fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.service_name
    }))
}

async fn method_not_allowed() -> IntakeError {
    IntakeError::MethodNotAllowed
}

async fn add_item_form() -> Html<String> {
    Html(pages::add_item_page())
}

/// Create an item from the multipart submission
#[instrument(skip(state, multipart))]
async fn add_item(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, IntakeError> {
    let multipart = multipart.map_err(|e| {
        debug!(error = %e, "Rejected add-item body");
        IntakeError::Validation(MALFORMED_FORM.to_string())
    })?;

    let item = read_new_item_form(multipart).await?.validate()?;
    state.intake.create_item(item).await?;

    Ok(Html(pages::success_page()))
}

#[instrument(skip(state))]
async fn read_all_items(State(state): State<AppState>) -> Result<Html<String>, IntakeError> {
    let items = state.intake.list_items().await?;
    Ok(Html(pages::items_page(&items)))
}

async fn update_item_form(
    Query(query): Query<DeleteItemForm>,
) -> Result<Html<String>, IntakeError> {
    let id = query.validate()?;
    Ok(Html(pages::update_item_page(id)))
}

#[instrument(skip(state, form))]
async fn update_item(
    State(state): State<AppState>,
    form: Result<Form<UpdateItemForm>, FormRejection>,
) -> Result<Html<String>, IntakeError> {
    let Form(form) = form.map_err(malformed_form)?;
    let update = form.validate()?;

    let items = state.intake.update_item(update).await?;
    Ok(Html(pages::items_page(&items)))
}

async fn delete_item_form(
    Query(query): Query<DeleteItemForm>,
) -> Result<Html<String>, IntakeError> {
    let id = query.validate()?;
    Ok(Html(pages::delete_item_page(id)))
}

#[instrument(skip(state, form))]
async fn delete_item(
    State(state): State<AppState>,
    form: Result<Form<DeleteItemForm>, FormRejection>,
) -> Result<Html<String>, IntakeError> {
    let Form(form) = form.map_err(malformed_form)?;
    let id = form.validate()?;

    let items = state.intake.delete_item(id).await?;
    Ok(Html(pages::items_page(&items)))
}

/// Collect the add-item fields; unknown fields are ignored
async fn read_new_item_form(mut multipart: Multipart) -> Result<NewItemForm, IntakeError> {
    let mut form = NewItemForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed_multipart)? {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        match name.as_str() {
            "item_name" => {
                form.item_name = Some(field.text().await.map_err(malformed_multipart)?);
            }
            "item_description" => {
                form.item_description = Some(field.text().await.map_err(malformed_multipart)?);
            }
            "item_image" => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let data = field.bytes().await.map_err(malformed_multipart)?;

                form.item_image = Some(ImageUpload {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            _ => debug!(field = %name, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

fn malformed_multipart(e: MultipartError) -> IntakeError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        debug!(error = %e, "Multipart body over the upload limit");
        return IntakeError::PayloadTooLarge;
    }

    debug!(error = %e, "Malformed multipart body");
    IntakeError::Validation(MALFORMED_FORM.to_string())
}

fn malformed_form(e: FormRejection) -> IntakeError {
    debug!(error = %e, "Malformed form body");
    IntakeError::Validation(MALFORMED_FORM.to_string())
}

/// Start the intake API server, stopping when `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting intake API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
