//! HTTP handlers for uploads, downloads, folder creation and listing.
//! Downloads are streamed from disk; everything touching paths is delegated
//! to `StorageService`.

use crate::{
    errors::AppError,
    models::entry::ListEntry,
    services::storage_service::{ObjectHandle, StorageService},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use chrono::{DateTime, Local};
use httpdate::fmt_http_date;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Envelope for successful JSON responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    fn with_message(message: &'static str, data: T) -> Self {
        Self {
            success: true,
            message: Some(message),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub filename: String,
    pub path: String,
    pub url: String,
    pub size: u64,
    pub upload_time: DateTime<Local>,
}

/// Request body for `POST /create-folder`.
#[derive(Debug, Deserialize)]
pub struct CreateFolderReq {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateFolderData {
    pub path: String,
    pub full_path: String,
    pub created_time: DateTime<Local>,
}

#[derive(Debug, Serialize)]
pub struct ListData {
    pub path: String,
    pub items: Vec<ListEntry>,
    pub count: usize,
}

/// Fields collected from an upload form.
#[derive(Default)]
struct UploadForm {
    file: Option<(String, Bytes)>,
    path: String,
    filename: String,
}

/// POST `/upload` — multipart form with `file`, optional `path` and `filename`.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UploadData>>, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        AppError::bad_request("NO_FILE", format!("no file found: {}", rejection.body_text()))
    })?;

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            // The first `file` part wins; later ones are drained and dropped.
            "file" if form.file.is_none() => {
                let original = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                form.file = Some((original, data));
            }
            "path" => form.path = field.text().await.map_err(multipart_error)?,
            "filename" => form.filename = field.text().await.map_err(multipart_error)?,
            _ => {}
        }
    }

    let (original, content) = form
        .file
        .ok_or_else(|| AppError::bad_request("NO_FILE", "no file found in request"))?;
    if original.is_empty() {
        return Err(AppError::bad_request(
            "EMPTY_FILENAME",
            "file name cannot be empty",
        ));
    }

    let stored = state
        .storage
        .store_upload(&form.path, &original, Some(form.filename.trim()), &content)
        .await
        .map_err(|err| AppError::from_storage(err, "UPLOAD_ERROR", "upload failed"))?;

    let url = state.download_url(&headers, &stored.relative_path);
    debug!("wrote {}", stored.path.display());
    info!(
        path = %stored.relative_path,
        size = stored.size,
        "stored upload `{}`",
        original
    );

    Ok(Json(ApiResponse::with_message(
        "file uploaded",
        UploadData {
            filename: stored.filename,
            path: stored.relative_path,
            url,
            size: stored.size,
            upload_time: Local::now(),
        },
    )))
}

/// GET `/files/{*path}` — stream a stored file.
pub async fn get_file(
    State(storage): State<StorageService>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let handle = storage
        .open(&path)
        .await
        .map_err(|err| AppError::from_storage(err, "ACCESS_ERROR", "file access failed"))?;

    let mut response = Response::new(Body::empty());
    set_file_headers(response.headers_mut(), &handle);
    *response.body_mut() = Body::from_stream(ReaderStream::new(handle.file));
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

/// POST `/create-folder` — body `{"path": "a/b/c"}`.
pub async fn create_folder(
    State(storage): State<StorageService>,
    payload: Result<Json<CreateFolderReq>, JsonRejection>,
) -> Result<Json<ApiResponse<CreateFolderData>>, AppError> {
    let requested = payload
        .ok()
        .and_then(|Json(req)| req.path)
        .ok_or_else(|| AppError::bad_request("MISSING_PATH", "missing `path` parameter"))?;

    let (path, full_path) = storage.create_folder(&requested).await.map_err(|err| {
        AppError::from_storage(err, "CREATE_FOLDER_ERROR", "create folder failed")
    })?;
    info!("created folder `{}`", path);

    Ok(Json(ApiResponse::with_message(
        "folder created",
        CreateFolderData {
            path,
            full_path: full_path.display().to_string(),
            created_time: Local::now(),
        },
    )))
}

/// GET `/list` — list the storage root.
pub async fn list_root(
    State(storage): State<StorageService>,
) -> Result<Json<ApiResponse<ListData>>, AppError> {
    list_folder(&storage, String::new()).await
}

/// GET `/list/{*path}` — list a folder beneath the root.
pub async fn list_path(
    State(storage): State<StorageService>,
    Path(path): Path<String>,
) -> Result<Json<ApiResponse<ListData>>, AppError> {
    list_folder(&storage, path).await
}

async fn list_folder(
    storage: &StorageService,
    path: String,
) -> Result<Json<ApiResponse<ListData>>, AppError> {
    let items = storage
        .list(&path)
        .await
        .map_err(|err| AppError::from_storage(err, "LIST_ERROR", "listing failed"))?;

    Ok(Json(ApiResponse::ok(ListData {
        path,
        count: items.len(),
        items,
    })))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(
        err.status(),
        "UPLOAD_ERROR",
        format!("upload failed: {}", err.body_text()),
    )
}

fn set_file_headers(headers: &mut HeaderMap, handle: &ObjectHandle) {
    let content_type = mime_guess::from_path(&handle.path).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(handle.metadata.len()),
    );

    if let Ok(modified) = handle.metadata.modified() {
        if let Ok(value) = HeaderValue::from_str(&fmt_http_date(modified)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}
