use actix_files::Files;
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use serde::Serialize;
use shared::{DiseaseClass, UploadResponse};
use std::path::PathBuf;

use crate::error::DiagnosisError;
use crate::service::{DiagnosisService, UploadedImage};

const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: String,
    classes: Vec<&'static str>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, upload_dir: PathBuf) {
    cfg.service(web::resource("/upload").route(web::post().to(handle_upload)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(Files::new("/static/uploads", upload_dir));
}

async fn handle_upload(
    req: HttpRequest,
    service: web::Data<DiagnosisService>,
    payload: Multipart,
) -> Result<HttpResponse, DiagnosisError> {
    if !is_multipart(&req) {
        return Err(DiagnosisError::MissingFilePart);
    }

    let upload = read_file_part(payload).await?;
    log::info!(
        "Received {} ({} bytes)",
        upload.file_name,
        upload.data.len()
    );

    let response = service.into_inner().diagnose(upload).await?;
    Ok(HttpResponse::Ok().json(UploadResponse::Success(response)))
}

async fn health(service: web::Data<DiagnosisService>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        backend: service.engine().backend_name().to_string(),
        classes: DiseaseClass::labels(),
    })
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Reads the first part named `file` that carries a filename. Parts without
/// a filename are ordinary form fields and are skipped.
async fn read_file_part(mut payload: Multipart) -> Result<UploadedImage, DiagnosisError> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned)
        else {
            continue;
        };
        if file_name.is_empty() {
            return Err(DiagnosisError::NoFileSelected);
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            data.extend_from_slice(&chunk);
        }
        return Ok(UploadedImage { file_name, data });
    }
    Err(DiagnosisError::MissingFilePart)
}

fn multipart_error(err: MultipartError) -> DiagnosisError {
    DiagnosisError::Multipart(err.to_string())
}
