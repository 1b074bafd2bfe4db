use actix_files::NamedFile;
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, Responder, get, mime, post, web};
use serde::Deserialize;

use crate::multipart;
use crate::routes::text_response;
use crate::services::files::FileService;
use crate::services::{ServiceError, ServiceResult};

#[derive(Deserialize)]
pub struct PathQueryParams {
    path: Option<String>,
}

impl PathQueryParams {
    fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }
}

#[get("/drives")]
pub async fn drives(service: web::Data<FileService>) -> impl Responder {
    HttpResponse::Ok().json(service.list_drives())
}

#[get("/files")]
pub async fn files(
    params: web::Query<PathQueryParams>,
    service: web::Data<FileService>,
) -> ServiceResult<HttpResponse> {
    let path = params.path().to_string();
    let entries = web::block(move || service.list_entries(&path)).await??;

    Ok(HttpResponse::Ok().json(entries))
}

#[get("/download")]
pub async fn download(
    params: web::Query<PathQueryParams>,
    service: web::Data<FileService>,
) -> ServiceResult<NamedFile> {
    let path = params.path().to_string();
    let target = web::block(move || service.download_target(&path)).await??;
    let file_name = target.file_name().unwrap_or_default();

    let file = NamedFile::open_async(target.as_path())
        .await
        .map_err(ServiceError::ReadFile)?;

    Ok(file
        .set_content_type(mime::APPLICATION_OCTET_STREAM)
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        }))
}

#[post("/upload")]
pub async fn upload(
    req: HttpRequest,
    body: web::Bytes,
    service: web::Data<FileService>,
) -> ServiceResult<HttpResponse> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let boundary = multipart::boundary(content_type)?;
    let intent = multipart::decode(&body, boundary.as_bytes())?;

    let written = web::block(move || service.persist_upload(intent)).await??;
    log::info!("Uploaded {}", written.display());

    Ok(text_response(
        actix_web::http::StatusCode::OK,
        "File uploaded successfully",
    ))
}

/// Answers CORS pre-flight requests for any path.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use tempfile::tempdir;

    use super::*;
    use crate::dto::FileEntryDto;
    use crate::platform::{ConfiguredRoots, SystemAttributes};
    use crate::routes::{configure, cors_headers};
    use crate::services::validator::PathValidator;

    const BOUNDARY: &str = "XyZboundary42";

    fn service_for(root: &Path) -> web::Data<FileService> {
        let validator = PathValidator::new(
            Arc::new(ConfiguredRoots::new([root.to_path_buf()])),
            root.to_path_buf(),
        );
        web::Data::new(FileService::new(validator, Arc::new(SystemAttributes)))
    }

    fn query(path: &Path) -> String {
        urlencoding::encode(&path.to_string_lossy()).into_owned()
    }

    fn upload_body(folder: Option<&str>, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(folder) = folder {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\n\
                     Content-Disposition: form-data; name=\"path\"\r\n\r\n{folder}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    macro_rules! app {
        ($root:expr) => {
            test::init_service(
                App::new()
                    .app_data(service_for($root))
                    .wrap(cors_headers())
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn drives_lists_roots() {
        let dir = tempdir().unwrap();
        let app = app!(dir.path());

        let req = test::TestRequest::get().uri("/drives").to_request();
        let listed: Vec<String> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(listed, vec![dir.path().to_string_lossy().into_owned()]);
    }

    #[cfg(not(windows))]
    #[actix_web::test]
    async fn files_lists_directories_before_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".hidden"), b"secret").unwrap();
        fs::write(dir.path().join("b.txt"), b"four").unwrap();
        fs::create_dir(dir.path().join("A")).unwrap();
        let app = app!(dir.path());

        let req = test::TestRequest::get()
            .uri(&format!("/files?path={}", query(dir.path())))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );

        let entries: Vec<FileEntryDto> = test::read_body_json(res).await;
        assert_eq!(
            entries,
            vec![
                FileEntryDto {
                    name: "A".into(),
                    is_dir: true,
                    size: 0
                },
                FileEntryDto {
                    name: "b.txt".into(),
                    is_dir: false,
                    size: 4
                },
            ]
        );
    }

    #[actix_web::test]
    async fn files_outside_roots_is_not_found() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        let app = app!(&root);

        let req = test::TestRequest::get()
            .uri(&format!("/files?path={}", query(&root.join(".."))))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );

        let req = test::TestRequest::get().uri("/files").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn download_returns_attachment() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, b"hello bytes").unwrap();
        let app = app!(dir.path());

        let req = test::TestRequest::get()
            .uri(&format!("/download?path={}", query(&file)))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let disposition = res
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("note.txt"));
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );

        let body = test::read_body(res).await;
        assert_eq!(body, "hello bytes");
    }

    #[actix_web::test]
    async fn download_empty_path_is_not_found() {
        let dir = tempdir().unwrap();
        let app = app!(dir.path());

        for uri in ["/download?path=", "/download"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        let req = test::TestRequest::get()
            .uri(&format!("/download?path={}", query(dir.path())))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn upload_writes_file() {
        let dir = tempdir().unwrap();
        let app = app!(dir.path());
        let folder = dir.path().to_string_lossy().into_owned();

        let req = upload_request(upload_body(
            Some(&folder),
            "data.bin",
            b"\x00\x01--\r\n",
        ))
        .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
        let body = test::read_body(res).await;
        assert_eq!(body, "File uploaded successfully");

        assert_eq!(
            fs::read(dir.path().join("data.bin")).unwrap(),
            b"\x00\x01--\r\n"
        );
    }

    #[actix_web::test]
    async fn upload_empty_file_creates_empty_target() {
        let dir = tempdir().unwrap();
        let app = app!(dir.path());
        let folder = dir.path().to_string_lossy().into_owned();

        let req = upload_request(upload_body(Some(&folder), "empty.txt", b"")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let written = dir.path().join("empty.txt");
        assert!(written.is_file());
        assert_eq!(fs::metadata(written).unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn upload_strips_traversal_from_file_name() {
        let dir = tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        let app = app!(dir.path());
        let folder = inbox.to_string_lossy().into_owned();

        let req = upload_request(upload_body(Some(&folder), "../../evil.txt", b"x")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        assert!(inbox.join("evil.txt").is_file());
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[actix_web::test]
    async fn upload_rejects_malformed_requests() {
        let dir = tempdir().unwrap();
        let app = app!(dir.path());

        let req = upload_request(upload_body(None, "a.txt", b"x")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/upload")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{}")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn upload_outside_roots_is_forbidden() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        let app = app!(&root);
        let folder = dir.path().to_string_lossy().into_owned();

        let req = upload_request(upload_body(Some(&folder), "a.txt", b"x")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[actix_web::test]
    async fn options_is_empty_ok() {
        let dir = tempdir().unwrap();
        let app = app!(dir.path());

        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/upload")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_METHODS)
                .unwrap(),
            "GET, POST, OPTIONS"
        );
        let body = test::read_body(res).await;
        assert!(body.is_empty());
    }
}
