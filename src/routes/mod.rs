use actix_web::http::{StatusCode, header};
use actix_web::middleware::DefaultHeaders;
use actix_web::{HttpResponse, ResponseError, guard, web};

use crate::services::ServiceError;

pub mod main;

/// Register every API endpoint.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(main::drives)
        .service(main::files)
        .service(main::download)
        .service(main::upload)
        .service(
            web::resource("/{tail:.*}")
                .guard(guard::Options())
                .to(main::preflight),
        );
}

/// Permissive cross-origin headers attached to every response.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
}

fn text_response(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/plain; charset=utf-8")
        .body(body.into())
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DirectoryNotFound | ServiceError::FileNotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidUploadPath | ServiceError::InvalidTargetPath => {
                StatusCode::FORBIDDEN
            }
            ServiceError::InvalidFileName | ServiceError::Decode(_) => StatusCode::BAD_REQUEST,
            ServiceError::ListEntries(err)
            | ServiceError::ReadFile(err)
            | ServiceError::SaveFile(err)
                if err.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                StatusCode::FORBIDDEN
            }
            ServiceError::ListEntries(_)
            | ServiceError::ReadFile(_)
            | ServiceError::SaveFile(_)
            | ServiceError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status == StatusCode::FORBIDDEN && self.io_error().is_some() {
            return text_response(status, "Access denied");
        }
        if status.is_server_error() {
            match self.io_error() {
                Some(err) => log::error!("{self}: {err}"),
                None => log::error!("{self}"),
            }
            return text_response(status, "Internal server error");
        }
        text_response(status, self.to_string())
    }
}
