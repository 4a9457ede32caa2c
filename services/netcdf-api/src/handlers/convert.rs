//! Conversion handlers.
//!
//! NetCDF reading is blocking (libnetcdf/HDF5), so every conversion runs on
//! tokio's blocking pool. The grid-chunk handler streams: the blocking task
//! pushes one record at a time into a channel of capacity 1 and the response
//! body drains it, so at most one record is in flight. If the client goes
//! away the next send fails and the producer stops.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Extension, Multipart},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use grid_json::{ConversionResult, GridRecordStream, Selection};
use netcdf_parser::{NetCdfDataset, ReadOptions};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::form::{GridChunkForm, UploadForm};
use crate::metrics::Endpoint;
use crate::state::AppState;

type RecordSender = mpsc::Sender<Result<Bytes, io::Error>>;

/// POST /api/convert-netcdf-to-json/metadata
pub async fn metadata_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    convert_document(state, Endpoint::Metadata, multipart, |dataset| {
        grid_json::metadata_document(dataset)
    })
    .await
}

/// POST /api/convert-netcdf-to-json/data
pub async fn data_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    convert_document(state, Endpoint::Data, multipart, |dataset| {
        grid_json::data_document(dataset)
    })
    .await
}

/// POST /api/convert-netcdf-to-json/cerv2-data-chunks
///
/// Selection failures (unknown layout, unsupported type, unreadable file)
/// are reported as a 500 before any record is sent. A failure after the
/// first record can only truncate the body.
pub async fn grid_chunks_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let endpoint = Endpoint::GridChunks;
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    state.metrics.record_request(endpoint);

    let form = match GridChunkForm::from_multipart(multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Rejected grid chunk request");
            return Err(e);
        }
    };

    let selection = form.selection();
    info!(
        request_id = %request_id,
        file_name = ?form.file_name,
        bytes = form.file.len(),
        variables = ?selection.variables,
        x_range = ?selection.x_range,
        y_range = ?selection.y_range,
        stride = selection.stride.get(),
        "Streaming grid records"
    );

    let (ready_tx, ready_rx) = oneshot::channel();
    let (record_tx, record_rx) = mpsc::channel(1);

    let producer_state = Arc::clone(&state);
    let temp_dir = state.config.temp_dir();
    let options = state.config.read_options();
    let file = form.file;

    tokio::task::spawn_blocking(move || {
        let records = match open_grid(&file, &temp_dir, options, &selection) {
            Ok(records) => records,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        drop(file);

        if ready_tx.send(Ok(records.grid_shape())).is_err() {
            return;
        }
        produce_records(records, record_tx, &producer_state, request_id, started);
    });

    let (width, height) = match ready_rx.await {
        Ok(Ok(shape)) => shape,
        Ok(Err(e)) => return Err(fail(&state, endpoint, request_id, e)),
        Err(_) => {
            let e = ApiError::Internal("conversion task ended before selecting".to_string());
            return Err(fail(&state, endpoint, request_id, e));
        }
    };
    debug!(request_id = %request_id, width, height, "Grid selected");

    let body = Body::from_stream(futures::stream::unfold(record_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }));
    Ok(json_response(body))
}

async fn convert_document<F>(
    state: Arc<AppState>,
    endpoint: Endpoint,
    multipart: Multipart,
    convert: F,
) -> Result<Response, ApiError>
where
    F: FnOnce(&NetCdfDataset) -> ConversionResult<Vec<u8>> + Send + 'static,
{
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    state.metrics.record_request(endpoint);

    let upload = match UploadForm::from_multipart(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            warn!(request_id = %request_id, endpoint = endpoint.as_str(), error = %e, "Rejected upload");
            return Err(e);
        }
    };
    info!(
        request_id = %request_id,
        endpoint = endpoint.as_str(),
        file_name = ?upload.file_name,
        bytes = upload.file.len(),
        "Converting upload"
    );

    let temp_dir = state.config.temp_dir();
    let options = state.config.read_options();
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let dataset = NetCdfDataset::from_bytes(&upload.file, &temp_dir, options)?;
        Ok(convert(&dataset)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("conversion task failed: {}", e)))
    .and_then(|result| result);

    match result {
        Ok(document) => {
            let elapsed = started.elapsed();
            state.metrics.record_duration(endpoint, elapsed);
            info!(
                request_id = %request_id,
                endpoint = endpoint.as_str(),
                bytes = document.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Conversion complete"
            );
            Ok(json_response(Body::from(document)))
        }
        Err(e) => Err(fail(&state, endpoint, request_id, e)),
    }
}

/// Open the upload and select the grid. The dataset and its temp file are
/// released on return; the stream owns the selected data.
fn open_grid(
    file: &[u8],
    temp_dir: &Path,
    options: ReadOptions,
    selection: &Selection,
) -> Result<GridRecordStream, ApiError> {
    let dataset = NetCdfDataset::from_bytes(file, temp_dir, options)?;
    Ok(grid_json::grid_records(&dataset, selection)?)
}

fn produce_records(
    records: GridRecordStream,
    tx: RecordSender,
    state: &AppState,
    request_id: Uuid,
    started: Instant,
) {
    let endpoint = Endpoint::GridChunks;
    let total = records.record_count();
    let mut sent: u64 = 0;

    for record in records {
        match record {
            Ok(record) => {
                if tx.blocking_send(Ok(Bytes::from(record))).is_err() {
                    info!(request_id = %request_id, sent, total, "Client disconnected, stopping stream");
                    state.metrics.record_streamed(sent);
                    return;
                }
                sent += 1;
            }
            Err(e) => {
                // Records already sent cannot be retracted; the body ends here.
                error!(request_id = %request_id, error = %e, sent, total, "Grid stream failed");
                state.metrics.record_failure(endpoint);
                state.metrics.record_streamed(sent);
                let _ = tx.blocking_send(Err(io::Error::new(io::ErrorKind::Other, e)));
                return;
            }
        }
    }

    let elapsed = started.elapsed();
    state.metrics.record_streamed(sent);
    state.metrics.record_duration(endpoint, elapsed);
    info!(
        request_id = %request_id,
        records = sent,
        elapsed_ms = elapsed.as_millis() as u64,
        "Grid stream complete"
    );
}

fn fail(state: &AppState, endpoint: Endpoint, request_id: Uuid, e: ApiError) -> ApiError {
    error!(
        request_id = %request_id,
        endpoint = endpoint.as_str(),
        error = %e,
        "Conversion failed"
    );
    state.metrics.record_failure(endpoint);
    e
}

fn json_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
