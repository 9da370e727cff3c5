use actix_web::http::{header, StatusCode};
use actix_web::test;
use serde_json::{json, Value};

use super::{multipart_body, multipart_content_type, test_app, test_state, API_KEY};
use crate::handlers::auth_handler::API_KEY_HEADER;

macro_rules! upload {
    ($app:expr, $event:expr) => {{
        let req = test::TestRequest::post()
            .uri("/upload")
            .insert_header((API_KEY_HEADER, API_KEY))
            .insert_header((header::CONTENT_TYPE, multipart_content_type()))
            .set_payload(multipart_body(
                &[("eventId", $event)],
                Some(("foto.jpg", "image/jpeg", b"\xFF\xD8\xFF\xD9".as_slice())),
            ))
            .to_request();
        let uploaded: Value = test::call_and_read_body_json(&$app, req).await;
        uploaded["public_id"].as_str().unwrap().to_string()
    }};
}

macro_rules! send {
    ($app:expr, $req:expr) => {{
        let req = $req.insert_header((API_KEY_HEADER, API_KEY)).to_request();
        test::call_service(&$app, req).await
    }};
}

#[actix_web::test]
async fn test_archive_event_flow() {
    let (state, _) = test_state();
    let app = test_app!(state);

    let public_id = upload!(app, "E1");
    let resp = send!(
        app,
        test::TestRequest::post()
            .uri("/approve-photo")
            .set_json(json!({ "public_id": public_id, "eventId": "E1" }))
    );
    assert_eq!(resp.status(), StatusCode::OK);
    upload!(app, "E1");

    let resp = send!(app, test::TestRequest::get().uri("/archive-event"));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send!(app, test::TestRequest::post().uri("/archive-event?eventId=E1"));
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["eventId"], json!("E1"));
    assert_eq!(report["total"], json!(2));
    assert_eq!(report["succeeded"], json!(2));

    let resp = send!(app, test::TestRequest::get().uri("/get-archived-photos"));
    let archived: Value = test::read_body_json(resp).await;
    assert_eq!(archived["total"], json!(2));
    for photo in archived["photos"].as_array().unwrap() {
        assert!(photo["public_id"].as_str().unwrap().starts_with("archived/"));
        assert_eq!(photo["tags"], json!([]));
        assert_eq!(photo["status"], json!("archived"));
    }

    let resp = send!(app, test::TestRequest::get().uri("/get-photos?eventId=E1"));
    let pending: Value = test::read_body_json(resp).await;
    assert_eq!(pending, json!([]));

    // Archived photos can no longer be moderated.
    let archived_id = archived["photos"][0]["public_id"].as_str().unwrap().to_string();
    let resp = send!(
        app,
        test::TestRequest::post()
            .uri("/approve-photo")
            .set_json(json!({ "public_id": archived_id }))
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_delete_single_archived_photo() {
    let (state, _) = test_state();
    let app = test_app!(state);

    let public_id = upload!(app, "E1");

    let resp = send!(
        app,
        test::TestRequest::post()
            .uri("/delete-single-archived-photo")
            .set_json(json!({ "public_id": public_id }))
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    send!(app, test::TestRequest::get().uri("/archive-event?eventId=E1"));
    let archived_id = format!("archived/{}", public_id.rsplit('/').next().unwrap());

    let resp = send!(
        app,
        test::TestRequest::post()
            .uri("/api/delete-single-archived-photo")
            .set_json(json!({ "public_id": archived_id }))
    );
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send!(app, test::TestRequest::get().uri("/get-archived-photos"));
    let archived: Value = test::read_body_json(resp).await;
    assert_eq!(archived["total"], json!(0));

    let resp = send!(
        app,
        test::TestRequest::post()
            .uri("/delete-single-archived-photo")
            .set_json(json!({ "public_id": archived_id }))
    );
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_cleanup_demo() {
    let (state, _) = test_state();
    let app = test_app!(state);

    let demo = upload!(app, "DEMO_X");
    let regular = upload!(app, "boda");
    send!(
        app,
        test::TestRequest::post()
            .uri("/approve-photo")
            .set_json(json!({ "public_id": demo, "eventId": "DEMO_X" }))
    );

    let resp = send!(app, test::TestRequest::post().uri("/cleanup-demo"));
    assert_eq!(resp.status(), StatusCode::OK);
    let cleanup: Value = test::read_body_json(resp).await;
    assert_eq!(cleanup["totalCleanedPhotos"], json!(1));
    assert_eq!(cleanup["cleanedEvents"][0]["eventId"], json!("DEMO_X"));

    let resp = send!(app, test::TestRequest::get().uri("/get-demo-photos?eventId=DEMO_X"));
    let photos: Value = test::read_body_json(resp).await;
    assert_eq!(photos, json!([]));

    let resp = send!(app, test::TestRequest::get().uri("/get-demo-photos?eventId=boda"));
    let photos: Value = test::read_body_json(resp).await;
    assert_eq!(photos[0]["public_id"], json!(regular));

    let resp = send!(app, test::TestRequest::post().uri("/cleanup-demo"));
    let cleanup: Value = test::read_body_json(resp).await;
    assert_eq!(cleanup["totalCleanedEvents"], json!(0));
}

#[actix_web::test]
async fn test_delete_archived_event_and_all_photos() {
    let (state, _) = test_state();
    let app = test_app!(state);

    upload!(app, "E1");
    upload!(app, "E1");
    upload!(app, "E2");

    let resp = send!(app, test::TestRequest::post().uri("/delete-archived-event"));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send!(
        app,
        test::TestRequest::post()
            .uri("/delete-archived-event")
            .set_json(json!({ "eventId": "E1" }))
    );
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["succeeded"], json!(2));

    let resp = send!(app, test::TestRequest::post().uri("/delete-all-photos"));
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["total"], json!(1));
    assert_eq!(report["failed"], json!(0));
}

#[actix_web::test]
async fn test_event_photo_downloads() {
    let (state, _) = test_state();
    let app = test_app!(state);

    let resp = send!(app, test::TestRequest::get().uri("/get-event-photos-urls"));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send!(app, test::TestRequest::get().uri("/get-event-photos-urls?eventId=E1"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let public_id = upload!(app, "E1");
    send!(
        app,
        test::TestRequest::post()
            .uri("/approve-photo")
            .set_json(json!({ "public_id": public_id, "eventId": "E1" }))
    );

    let resp = send!(app, test::TestRequest::get().uri("/get-event-photos-urls?eventId=E1"));
    assert_eq!(resp.status(), StatusCode::OK);
    let downloads: Value = test::read_body_json(resp).await;
    assert_eq!(downloads["totalPhotos"], json!(1));

    let filename = downloads["photos"][0]["filename"].as_str().unwrap();
    assert!(filename.starts_with("foto_1_"));
    assert!(filename.ends_with(".jpeg"));
}

#[actix_web::test]
async fn test_download_all_photos() {
    let (state, _) = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/download-all-photos").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send!(app, test::TestRequest::get().uri("/download-all-photos"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/upload")
        .insert_header((API_KEY_HEADER, API_KEY))
        .insert_header((header::CONTENT_TYPE, multipart_content_type()))
        .set_payload(multipart_body(
            &[("eventId", "E1"), ("message", "Feliz día")],
            Some(("foto.jpg", "image/jpeg", b"\xFF\xD8\xFF\xD9".as_slice())),
        ))
        .to_request();
    let captioned: Value = test::call_and_read_body_json(&app, req).await;
    upload!(app, "E2");

    let resp = send!(app, test::TestRequest::get().uri("/api/download-all-photos"));
    assert_eq!(resp.status(), StatusCode::OK);
    let downloads: Value = test::read_body_json(resp).await;
    assert_eq!(downloads["totalPhotos"], json!(2));

    let photos = downloads["photos"].as_array().unwrap();
    let entry = photos
        .iter()
        .find(|photo| photo["id"] == captioned["public_id"])
        .unwrap();
    assert_eq!(entry["message"], json!("Feliz día"));
    assert!(entry["filename"].as_str().unwrap().ends_with("_Feliz_d_a.jpeg"));
    assert!(photos.iter().any(|photo| photo.get("message").is_none()));
}
