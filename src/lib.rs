use std::path::PathBuf;
use std::sync::Arc;

use actix_files::Files;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};

use crate::models::config::ServerConfig;
use crate::platform::{
    ConfiguredRoots, DriveSource, EntryAttributes, SystemAttributes, SystemDrives,
};
use crate::services::files::FileService;
use crate::services::validator::PathValidator;

pub mod domain;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod multipart;
pub mod platform;
pub mod routes;
pub mod services;

/// Build the shared file service described by `server_config`.
pub fn build_service(server_config: &ServerConfig) -> FileService {
    let static_dir = PathBuf::from(&server_config.static_dir);
    let base_dir = std::path::absolute(&static_dir).unwrap_or(static_dir);

    let drives: Arc<dyn DriveSource> = if server_config.roots.is_empty() {
        Arc::new(SystemDrives)
    } else {
        Arc::new(ConfiguredRoots::new(server_config.roots.iter()))
    };
    let attributes: Arc<dyn EntryAttributes> = Arc::new(SystemAttributes);

    FileService::new(PathValidator::new(drives, base_dir), attributes)
}

pub async fn run(server_config: ServerConfig) -> std::io::Result<()> {
    let service = web::Data::new(build_service(&server_config));
    let static_dir = PathBuf::from(&server_config.static_dir);
    let serve_static = static_dir.is_dir();
    if !serve_static {
        log::warn!(
            "Static directory {} not found, static files disabled",
            static_dir.display()
        );
    }

    log::info!(
        "File browser listening on http://{}:{}",
        server_config.address,
        server_config.port
    );
    log::info!("Allowed roots: {:?}", service.list_drives());

    let upload_limit = server_config.upload_limit;
    HttpServer::new(move || {
        let app = App::new()
            .app_data(service.clone())
            .app_data(web::PayloadConfig::new(upload_limit))
            .wrap(middleware::CatchPanic)
            .wrap(routes::cors_headers())
            .wrap(Logger::default())
            .configure(routes::configure);

        if serve_static {
            app.service(Files::new("/", &static_dir).index_file("index.html"))
        } else {
            app
        }
    })
    .bind((server_config.address.as_str(), server_config.port))?
    .run()
    .await
}
