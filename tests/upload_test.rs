mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use image::GenericImageView;
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn test_upload_stores_original_and_derivatives() {
    let t = common::setup().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;
    let original = common::png(40, 20);

    let (status, json) = t
        .upload("alice", Some(&alice), "Penny Black.png", &original, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    let file = &json["data"];

    assert_eq!(file["user_id"], alice_id.as_str());
    assert_eq!(file["public"], true);
    assert_eq!(file["content_type"], "image/png");
    assert_eq!(file["size"], original.len() as u64);
    assert_eq!(file["width"], 40);
    assert_eq!(file["height"], 20);

    let url = file["url"].as_str().unwrap();
    let prefix = format!("/uploads/{}/", alice_id);
    assert!(url.starts_with(&prefix), "{}", url);
    let stored_name = &url[prefix.len()..];
    assert_eq!(stored_name.len(), 10 + 1 + "Penny_Black.png".len());
    assert!(stored_name.ends_with("-Penny_Black.png"));
    assert_eq!(file["name"], "Penny_Black.png");
    assert!(file["path"].as_str().unwrap().ends_with(stored_name));

    let mut expected = vec![
        format!("{}/{}", alice_id, stored_name),
        format!("{}/full/{}", alice_id, stored_name.replace(".png", ".jpg")),
        format!("{}/thumb/{}", alice_id, stored_name.replace(".png", ".jpg")),
    ];
    expected.sort();
    assert_eq!(t.storage.keys(), expected);

    // Original comes back byte for byte
    let (status, content_type, body) = t.fetch(url, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/png");
    assert_eq!(body, original);

    // Derivatives are JPEG and bounded
    let (status, content_type, body) = t
        .fetch(file["thumbnail_url"].as_str().unwrap(), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(image::load_from_memory(&body).unwrap().dimensions(), (16, 8));

    let (_, _, body) = t.fetch(file["full_url"].as_str().unwrap(), None).await;
    assert_eq!(image::load_from_memory(&body).unwrap().dimensions(), (40, 20));
}

#[tokio::test]
async fn test_large_images_are_downscaled() {
    let t = common::setup().await;
    let (alice, _) = t.register("alice@post.test", "alice").await;

    let (status, json) = t
        .upload("alice", Some(&alice), "sheet.png", &common::png(256, 128), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, full) = t
        .fetch(json["data"]["full_url"].as_str().unwrap(), None)
        .await;
    assert_eq!(image::load_from_memory(&full).unwrap().dimensions(), (64, 32));
}

#[tokio::test]
async fn test_upload_rejects_bad_payloads() {
    let t = common::setup().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;

    let (status, json) = t
        .upload(&alice_id, Some(&alice), "notes.txt", b"just some text", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], false);

    // PNG signature with a corrupt body
    let mut broken = common::png(8, 8);
    broken.truncate(40);
    let (status, _) = t
        .upload(&alice_id, Some(&alice), "broken.png", &broken, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .upload(&alice_id, Some(&alice), "empty.png", b"", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(t.storage.keys().is_empty());
}

#[tokio::test]
async fn test_truncated_form_field_is_reported() {
    let t = common::setup().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;

    // The stream ends inside the `public` field
    let body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"public\"\r\n\r\ntru",
        common::BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/user/{}/file", alice_id))
        .header("Authorization", format!("Bearer {}", alice))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", common::BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], false);
    let error = json["error"].as_str().unwrap();
    assert!(!error.contains("Invalid value for public"), "{}", error);
    assert!(t.storage.keys().is_empty());
}

#[tokio::test]
async fn test_upload_permissions() {
    let t = common::setup().await;
    let (admin, _) = t.admin().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;
    let (bob, _) = t.register("bob@post.test", "bob").await;
    let data = common::png(8, 8);

    let (status, _) = t.upload(&alice_id, None, "a.png", &data, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.upload(&alice_id, Some(&bob), "a.png", &data, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.upload("nobody", Some(&admin), "a.png", &data, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = t
        .upload(&alice_id, Some(&admin), "a.png", &data, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_id"], alice_id.as_str());

    let (status, _) = t.upload(&alice_id, Some(&alice), "b.png", &data, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_private_files_are_hidden() {
    let t = common::setup().await;
    let (admin, _) = t.admin().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;
    let (bob, _) = t.register("bob@post.test", "bob").await;

    let (status, json) = t
        .upload(&alice_id, Some(&alice), "secret.png", &common::png(8, 8), Some(false))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["public"], false);
    let id = json["data"]["id"].as_str().unwrap().to_string();
    let url = json["data"]["url"].as_str().unwrap().to_string();
    t.upload(&alice_id, Some(&alice), "open.png", &common::png(8, 8), Some(true))
        .await;

    for token in [None, Some(bob.as_str())] {
        let (status, _) = t.send("GET", &format!("/file/{}", id), token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = t.fetch(&url, token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, json) = t
            .send("GET", &format!("/user/{}/file", alice_id), token, None)
            .await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        let (_, json) = t.send("GET", "/file", token, None).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
    }

    for token in [alice.as_str(), admin.as_str()] {
        let (status, _) = t
            .send("GET", &format!("/file/{}", id), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = t.fetch(&url, Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, json) = t
            .send("GET", "/user/alice/file", Some(token), None)
            .await;
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_patch_file() {
    let t = common::setup().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;
    let (bob, _) = t.register("bob@post.test", "bob").await;
    let id = t.upload_png(&alice_id, &alice, "draft.png").await;

    let (status, _) = t
        .send(
            "PATCH",
            &format!("/file/{}", id),
            Some(&bob),
            Some(json!({ "public": false })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = t
        .send(
            "PATCH",
            &format!("/file/{}", id),
            Some(&alice),
            Some(json!({ "name": "final.png", "public": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "final.png");
    assert_eq!(json["data"]["public"], false);
}

#[tokio::test]
async fn test_delete_file_cleans_up() {
    let t = common::setup().await;
    let (alice, alice_id) = t.register("alice@post.test", "alice").await;
    let (bob, _) = t.register("bob@post.test", "bob").await;
    let keep = t.upload_png(&alice_id, &alice, "keep.png").await;
    let dropped = t.upload_png(&alice_id, &alice, "drop.png").await;

    let (_, json) = t
        .send(
            "POST",
            "/u/alice/collectible",
            Some(&alice),
            Some(json!({ "name": "Pair", "public": true, "file_ids": [dropped, keep] })),
        )
        .await;
    let collectible = json["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = t
        .send("DELETE", &format!("/file/{}", dropped), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t
        .send("DELETE", &format!("/file/{}", dropped), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = t
        .send("DELETE", &format!("/file/{}", dropped), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": true }));
    assert_eq!(t.storage.keys().len(), 3);

    let (status, _) = t
        .send("GET", &format!("/file/{}", dropped), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = t
        .send("GET", &format!("/collectible/{}", collectible), None, None)
        .await;
    assert_eq!(json["data"]["file_ids"], json!([keep]));
    assert_eq!(json["data"]["files"].as_array().unwrap().len(), 1);

    let (status, _) = t
        .send("DELETE", &format!("/file/{}", dropped), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
