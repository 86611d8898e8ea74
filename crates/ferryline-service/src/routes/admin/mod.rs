use std::future::Future;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Json, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::auth::SessionUser;
use crate::editor::{EditState, Editors};
use crate::errors::{ApiError, ContentError};
use crate::guard::require_session;
use crate::models::{Article, ArticleInput, Collection, Product, ProductInput, Schedule, ScheduleInput};
use crate::repositories::ListParams;

pub mod form;

use form::SaveForm;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum SessionState {
    Loading,
    SignedIn,
    SignedOut,
}

/// Session as reported to clients; the tokens stay on the server.
#[derive(Debug, Serialize)]
struct SessionView {
    status: SessionState,
    user: Option<SessionUser>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionView {
    fn of<S: AppState>(state: &S) -> Self {
        if state.session().status().is_loading() {
            return Self {
                status: SessionState::Loading,
                user: None,
                expires_at: None,
            };
        }

        match state.session().current() {
            Some(session) => Self {
                status: SessionState::SignedIn,
                user: Some(session.user),
                expires_at: session.expires_at,
            },
            None => Self {
                status: SessionState::SignedOut,
                user: None,
                expires_at: None,
            },
        }
    }
}

async fn session_status<S: AppState>(State(state): State<S>) -> Json<SessionView> {
    Json(SessionView::of(&state))
}

#[instrument(skip_all, fields(email = %payload.email))]
async fn login<S: AppState>(
    State(state): State<S>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionView>, ApiError> {
    debug!("Processing login request");
    state
        .session()
        .sign_in(payload.email.trim(), &payload.password)
        .await?;

    Ok(Json(SessionView::of(&state)))
}

#[instrument(skip_all)]
async fn logout<S: AppState>(State(state): State<S>) -> Json<SessionView> {
    state.session().sign_out().await;
    Json(SessionView::of(&state))
}

/// Runs a save as a submit of the collection's edit session, so a second
/// submit while this one is in flight is refused.
async fn tracked_save<T, F>(
    editors: &Editors,
    collection: Collection,
    draft: Value,
    save: F,
) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ContentError>>,
{
    let ticket = editors.begin_submit(collection, draft)?;

    match save.await {
        Ok(saved) => {
            ticket.succeed();
            Ok(saved)
        }
        Err(err) => {
            ticket.fail(err.to_string());
            Err(err.into())
        }
    }
}

fn saved_response<T: Serialize>(created: bool, saved: T) -> Response {
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(saved)).into_response()
}

#[instrument(skip_all)]
async fn list_articles<S: AppState>(State(state): State<S>) -> Result<Response, ApiError> {
    let articles = state
        .content()
        .list::<Article>(ListParams::newest_first())
        .await?;
    Ok(Json(&*articles).into_response())
}

#[instrument(skip_all, fields(id = form.input.id.as_deref(), has_image = form.image.is_some()))]
async fn save_article<S: AppState>(
    State(state): State<S>,
    form: SaveForm<ArticleInput>,
) -> Result<Response, ApiError> {
    let created = form.input.id.as_deref().is_none_or(|id| id.trim().is_empty());
    let draft = serde_json::to_value(&form.input).unwrap_or_default();

    let article = tracked_save(
        state.editors(),
        Collection::Articles,
        draft,
        state.content().save_article(form.input, form.image),
    )
    .await?;

    info!(id = %article.id, slug = %article.slug, "Article saved");
    Ok(saved_response(created, article))
}

#[instrument(skip_all)]
async fn list_schedules<S: AppState>(State(state): State<S>) -> Result<Response, ApiError> {
    let schedules = state
        .content()
        .list::<Schedule>(ListParams::oldest_first())
        .await?;
    Ok(Json(&*schedules).into_response())
}

#[instrument(skip_all, fields(id = form.input.id.as_deref()))]
async fn save_schedule<S: AppState>(
    State(state): State<S>,
    form: SaveForm<ScheduleInput>,
) -> Result<Response, ApiError> {
    let created = form.input.id.as_deref().is_none_or(|id| id.trim().is_empty());
    let draft = serde_json::to_value(&form.input).unwrap_or_default();

    let schedule = tracked_save(
        state.editors(),
        Collection::Schedules,
        draft,
        state.content().save_schedule(form.input),
    )
    .await?;

    info!(id = %schedule.id, "Schedule saved");
    Ok(saved_response(created, schedule))
}

#[instrument(skip_all)]
async fn list_products<S: AppState>(State(state): State<S>) -> Result<Response, ApiError> {
    let products = state
        .content()
        .list::<Product>(ListParams::newest_first())
        .await?;
    Ok(Json(&*products).into_response())
}

#[instrument(skip_all, fields(id = form.input.id.as_deref(), has_image = form.image.is_some()))]
async fn save_product<S: AppState>(
    State(state): State<S>,
    form: SaveForm<ProductInput>,
) -> Result<Response, ApiError> {
    let created = form.input.id.as_deref().is_none_or(|id| id.trim().is_empty());
    let draft = serde_json::to_value(&form.input).unwrap_or_default();

    let product = tracked_save(
        state.editors(),
        Collection::Products,
        draft,
        state.content().save_product(form.input, form.image),
    )
    .await?;

    info!(id = %product.id, "Product saved");
    Ok(saved_response(created, product))
}

#[instrument(skip_all, fields(collection = %path.0, id = %path.1))]
async fn delete_record<S: AppState>(
    State(state): State<S>,
    Path(path): Path<(Collection, String)>,
) -> Result<StatusCode, ApiError> {
    let (collection, id) = path;
    state.content().delete(collection, &id).await?;

    info!("Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_draft<S: AppState>(
    State(state): State<S>,
    Path(collection): Path<Collection>,
) -> Json<EditState> {
    Json(state.editors().state(collection))
}

async fn open_draft<S: AppState>(
    State(state): State<S>,
    Path(collection): Path<Collection>,
    Json(draft): Json<Value>,
) -> Result<Json<EditState>, ApiError> {
    Ok(Json(state.editors().open(collection, draft)?))
}

async fn cancel_draft<S: AppState>(
    State(state): State<S>,
    Path(collection): Path<Collection>,
) -> Json<EditState> {
    Json(state.editors().cancel(collection))
}

fn create_guarded_router<S: AppState>(state: &S) -> Router<S> {
    Router::new()
        .route("/articles", get(list_articles::<S>).post(save_article::<S>))
        .route("/schedules", get(list_schedules::<S>).post(save_schedule::<S>))
        .route("/products", get(list_products::<S>).post(save_product::<S>))
        .route(
            "/drafts/{collection}",
            get(get_draft::<S>)
                .post(open_draft::<S>)
                .delete(cancel_draft::<S>),
        )
        .route("/{collection}/{id}", delete(delete_record::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session::<S>,
        ))
}

pub fn create_admin_router<S: AppState>(state: &S) -> Router<S> {
    Router::new()
        .route("/login", get(session_status::<S>).post(login::<S>))
        .route("/logout", post(logout::<S>))
        .route("/session", get(session_status::<S>))
        .nest("/api", create_guarded_router(state))
}
