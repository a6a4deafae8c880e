//! HTTP request handlers
//!
//! Every handler returns `Result<Json<_>, ApiError>`. Errors are mapped to a
//! status code by [`api_error`] and always carry an `{"error": ...}` body.
//! Request bodies go through [`ApiJson`] so that undecodable JSON gets the
//! same treatment.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::{PlayTarget, SessionStatus};
use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// `Json` body extractor whose rejection is a 400 with an `error` body
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(api_error(
                "Request body",
                Error::BadRequest(rejection.body_text()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    button: String,
    volume: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    status: String,
    button: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    title: Option<String>,
    index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    status: String,
    track: String,
}

#[derive(Debug, Deserialize)]
pub struct TagEditRequest {
    track: String,
    tag: String,
    #[serde(default = "default_add")]
    add: bool,
}

fn default_add() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct TagEditResponse {
    track: String,
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterResponse {
    status: String,
    album: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RescanResponse {
    added: bool,
    tracks: usize,
}

// ============================================================================
// Commands
// ============================================================================

/// Remote-control buttons accepted by `POST /command`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Rescan the library, then play the current track
    Test,
    /// Pause/resume toggle
    Stop,
    Next,
    Before,
    Volume,
    Random,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Test => "test",
            Command::Stop => "stop",
            Command::Next => "next",
            Command::Before => "before",
            Command::Volume => "volume",
            Command::Random => "random",
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Command::Test),
            "stop" => Ok(Command::Stop),
            "next" => Ok(Command::Next),
            "before" => Ok(Command::Before),
            "volume" => Ok(Command::Volume),
            "random" => Ok(Command::Random),
            other => Err(Error::BadRequest(format!("unknown button '{}'", other))),
        }
    }
}

/// Map a crate error onto an HTTP status with an `error` body
pub fn api_error(context: &str, e: Error) -> ApiError {
    let status = match &e {
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::InvalidTrack(_) => StatusCode::NOT_FOUND,
        Error::EmptyPlaylist => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("{} failed: {}", context, e);
    } else {
        warn!("{} rejected: {}", context, e);
    }

    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "rcmp-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// POST /command - dispatch one remote-control button
pub async fn command(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = Command::from_str(&req.button).map_err(|e| api_error("Command", e))?;
    info!("Command: {}", command.as_str());

    let session = &ctx.session;
    let result = match command {
        Command::Test => {
            if let Err(e) = ctx.library.rescan().await {
                warn!("Rescan before test playback failed: {}", e);
            }
            session.play(None).await.map(|_| ())
        }
        Command::Stop => session.toggle_pause().await.map(|_| ()),
        Command::Next => session.next().await.map(|_| ()),
        Command::Before => session.previous().await.map(|_| ()),
        Command::Volume => match req.volume {
            Some(volume) => session.set_volume(volume).await.map(|_| ()),
            None => Err(Error::BadRequest("volume button requires a 'volume' value".to_string())),
        },
        Command::Random => session.toggle_shuffle().await.map(|_| ()),
    };
    result.map_err(|e| api_error(command.as_str(), e))?;

    Ok(Json(CommandResponse {
        status: "ok".to_string(),
        button: command.as_str().to_string(),
    }))
}

/// POST /select - play a track by name, or by playlist position
///
/// `title` wins when both are given.
pub async fn select(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let target = match (req.title, req.index) {
        (Some(title), _) => PlayTarget::Name(title),
        (None, Some(index)) => PlayTarget::Index(index),
        (None, None) => {
            return Err(api_error(
                "Select",
                Error::BadRequest("either 'title' or 'index' is required".to_string()),
            ))
        }
    };
    debug!("Select: {:?}", target);

    let track = ctx
        .session
        .play(Some(target))
        .await
        .map_err(|e| api_error("Select", e))?;

    Ok(Json(SelectResponse {
        status: "ok".to_string(),
        track,
    }))
}

/// GET /state
pub async fn state(State(ctx): State<AppContext>) -> Json<SessionStatus> {
    Json(ctx.session.status().await)
}

// ============================================================================
// Playlist and Catalog Endpoints
// ============================================================================

/// GET /album - active playlist in playback order
pub async fn album(State(ctx): State<AppContext>) -> Json<Vec<String>> {
    Json(ctx.session.album().await)
}

/// GET /library - full catalog (path -> tags)
pub async fn library(State(ctx): State<AppContext>) -> Json<BTreeMap<String, Vec<String>>> {
    let entries: BTreeMap<String, Vec<String>> = ctx.library.read(|catalog| {
        catalog
            .iter()
            .map(|(path, tags)| (path.clone(), tags.iter().cloned().collect()))
            .collect()
    });
    Json(entries)
}

/// POST /tags - add or remove one tag
///
/// Unknown tracks are ignored and answered with an empty tag list.
pub async fn edit_tags(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<TagEditRequest>,
) -> Result<Json<TagEditResponse>, ApiError> {
    let tag = req.tag.trim();
    if tag.is_empty() {
        return Err(api_error(
            "Tag edit",
            Error::BadRequest("tag must not be empty".to_string()),
        ));
    }

    let changed = if req.add {
        ctx.library.add_tag(&req.track, tag)
    } else {
        ctx.library.remove_tag(&req.track, tag)
    };

    if changed {
        info!(
            "{} tag '{}' on {}",
            if req.add { "Added" } else { "Removed" },
            tag,
            req.track
        );
        if let Err(e) = ctx.library.persist().await {
            warn!("Tag edit kept in memory, persist failed: {}", e);
        }
    }

    Ok(Json(TagEditResponse {
        tags: ctx.library.tags(&req.track),
        track: req.track,
    }))
}

/// POST /filter - replace the tag filter
pub async fn set_filter(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<FilterRequest>,
) -> Result<Json<FilterResponse>, ApiError> {
    let album = ctx
        .session
        .set_tag_filter(req.tags)
        .await
        .map_err(|e| api_error("Filter", e))?;

    Ok(Json(FilterResponse {
        status: "ok".to_string(),
        album,
    }))
}

/// POST /rescan - pick up new files from the music folder
pub async fn rescan(State(ctx): State<AppContext>) -> Result<Json<RescanResponse>, ApiError> {
    let added = ctx
        .session
        .rescan()
        .await
        .map_err(|e| api_error("Rescan", e))?;

    Ok(Json(RescanResponse {
        added,
        tracks: ctx.library.read(|c| c.len()),
    }))
}
