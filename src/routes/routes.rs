use actix_web::{web, Route};

use crate::handlers::archive_handler::{
    archive_event, cleanup_demo, delete_all_photos, delete_archived_event,
    delete_single_archived_photo, get_archived_photos,
};
use crate::handlers::photo_handler::{
    approve_photo, get_approved_photos, get_demo_photos, get_photos, reject_photo,
};
use crate::handlers::share_handler::{
    download_all_photos, get_event_photos_urls, health, method_not_allowed, serve_media,
    social_share,
};
use crate::handlers::upload_handler::{upload, upload_base64};

/// A path that answers 405 for every method without a route.
fn resource(path: &str, routes: Vec<Route>) -> actix_web::Resource {
    routes
        .into_iter()
        .fold(web::resource(path), |resource, route| resource.route(route))
        .default_service(web::to(method_not_allowed))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/upload", vec![web::post().to(upload)]))
        .service(resource("/upload-base64", vec![web::post().to(upload_base64)]))
        .service(resource("/get-photos", vec![web::get().to(get_photos)]))
        .service(resource("/get-approved-photos", vec![web::get().to(get_approved_photos)]))
        .service(resource("/get-demo-photos", vec![web::get().to(get_demo_photos)]))
        .service(resource("/approve-photo", vec![web::post().to(approve_photo)]))
        .service(resource("/reject-photo", vec![web::post().to(reject_photo)]))
        .service(resource(
            "/archive-event",
            vec![web::get().to(archive_event), web::post().to(archive_event)],
        ))
        .service(resource("/get-archived-photos", vec![web::get().to(get_archived_photos)]))
        .service(resource(
            "/delete-single-archived-photo",
            vec![web::post().to(delete_single_archived_photo)],
        ))
        .service(resource("/delete-archived-event", vec![web::post().to(delete_archived_event)]))
        .service(resource("/delete-all-photos", vec![web::post().to(delete_all_photos)]))
        .service(resource("/cleanup-demo", vec![web::post().to(cleanup_demo)]))
        .service(resource("/get-event-photos-urls", vec![web::get().to(get_event_photos_urls)]))
        .service(resource("/download-all-photos", vec![web::get().to(download_all_photos)]))
        .service(resource("/social-share", vec![web::get().to(social_share)]))
        .service(resource("/health", vec![web::get().to(health)]))
        .service(resource("/media/{public_id:.*}", vec![web::get().to(serve_media)]));
}

/// Every route at the root and again under `/api`.
pub fn config_with_api_prefix(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(config)).configure(config);
}
