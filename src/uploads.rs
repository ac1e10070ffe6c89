use std::{path::Path, sync::Arc};

use axum::{
    debug_handler,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{fs::File, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{config::Config, AppError, AppResult, AppState};

pub fn router(config: &Config) -> Router<AppState> {
    let limit = match config.upload_limit {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };
    Router::new().route("/api/upload", post(upload).layer(limit))
}

/// Creates the upload directory. Failure only disables uploads.
pub async fn prepare_dir(dir: &Path) {
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!(dir = %dir.display(), error = %err, "could not create upload directory");
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::validation(err.body_text())
    }
}

/// Streams the `file` field to disk under a generated name and returns that name.
#[debug_handler(state = AppState)]
pub(crate) async fn upload(
    State(config): State<Arc<Config>>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = Uuid::now_v7().simple().to_string();
        let path = config.upload_dir.join(&filename);
        let mut file = File::create(&path).await.map_err(anyhow::Error::from)?;

        let mut bytes = 0usize;
        let written = async {
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                file.write_all(&chunk).await.map_err(anyhow::Error::from)?;
                bytes += chunk.len();
            }
            file.flush().await.map_err(anyhow::Error::from)?;
            Ok::<(), AppError>(())
        }
        .await;

        if let Err(err) = written {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                tracing::warn!(%filename, error = %rm, "could not remove partial upload");
            }
            return Err(err);
        }

        tracing::info!(%filename, bytes, "stored upload");
        return Ok(Json(json!({ "filename": filename })));
    }

    Err(AppError::validation("no file"))
}
