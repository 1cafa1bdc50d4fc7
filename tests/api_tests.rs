use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use delivery_notes::{
    routes::build_router,
    services::{LocalUploadService, MockEmailService},
    test_utils::{png_signature, test_config, test_helpers},
    AppState,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----delivery-notes-test-boundary";

struct TestApp {
    router: Router,
    temp_dir: PathBuf,
    _dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    fn message(&self) -> String {
        self.json()["message"].as_str().unwrap_or_default().to_string()
    }
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let temp_dir = config.temp_dir.clone();
    let pool = test_helpers::create_test_db().await.unwrap();
    let uploader = Arc::new(LocalUploadService::new(
        config.upload_dir.clone(),
        config.public_base_url.clone(),
    ));

    let state = AppState::new(pool, config, Arc::new(MockEmailService::new()), uploader);

    TestApp {
        router: build_router(state),
        temp_dir,
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn sign(&self, note_id: i64, token: &str, signature: Option<&[u8]>) -> TestResponse {
        let mut body = Vec::new();
        match signature {
            Some(bytes) => {
                body.extend_from_slice(
                    format!(
                        "--{}\r\nContent-Disposition: form-data; name=\"signature\"; filename=\"signature.png\"\r\nContent-Type: image/png\r\n\r\n",
                        BOUNDARY
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!(
                        "--{}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nno image\r\n",
                        BOUNDARY
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(format!("/deliverynote/sign/{}", note_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn register(&self, email: &str) -> String {
        let response = self
            .json(
                "POST",
                "/user/register",
                None,
                json!({ "email": email, "password": "password123" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["token"].as_str().unwrap().to_string()
    }

    /// Registers the company `cif` for the user and returns the re-issued token.
    async fn join_company(&self, token: &str, cif: &str) -> String {
        let response = self
            .json(
                "PATCH",
                "/user/company",
                Some(token),
                json!({
                    "company": {
                        "companyName": "Acme Builders",
                        "companyCif": cif,
                        "companyAddress": "Calle Mayor 1, Madrid",
                        "companyStreet": "Calle Mayor",
                        "companyNumber": 1,
                        "companyPostal": 28001,
                        "companyCity": "Madrid",
                        "companyProvince": "Madrid"
                    }
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        response.json()["token"].as_str().unwrap().to_string()
    }

    async fn create_client(&self, token: &str, name: &str) -> i64 {
        let response = self
            .json("POST", "/client", Some(token), json!({ "name": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["id"].as_i64().unwrap()
    }

    /// Creates a client, a project and a simple note; returns the note id.
    async fn create_note(&self, token: &str, prefix: &str) -> i64 {
        let client_id = self.create_client(token, &format!("{} client", prefix)).await;
        let project = self
            .json(
                "POST",
                "/project",
                Some(token),
                json!({ "name": format!("{} project", prefix), "client": client_id }),
            )
            .await;
        assert_eq!(project.status, StatusCode::CREATED);
        let project_id = project.json()["id"].as_i64().unwrap();

        let note = self
            .json(
                "POST",
                "/deliverynote",
                Some(token),
                json!({
                    "project": project_id,
                    "client": client_id,
                    "type": "simple",
                    "data": [{ "name": "Service X", "quantity": 3 }]
                }),
            )
            .await;
        assert_eq!(note.status, StatusCode::CREATED);
        note.json()["id"].as_i64().unwrap()
    }

    fn temp_files(&self) -> usize {
        std::fs::read_dir(&self.temp_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let app = spawn_app().await;

    let request = Request::builder().uri("/client").body(Body::empty()).unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Access denied. Token not found.");

    let response = app.get("/client", "not-a-token").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Invalid token");
}

#[tokio::test]
async fn test_register_verify_and_login() {
    let app = spawn_app().await;

    let response = app
        .json(
            "POST",
            "/user/register",
            None,
            json!({ "email": "Owner@Example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["email"], "owner@example.com");
    let code = body["verificationCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let again = app
        .json(
            "POST",
            "/user/register",
            None,
            json!({ "email": "owner@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.message(), "Email is already registered");

    let wrong = app
        .json(
            "PUT",
            "/user/validation",
            None,
            json!({ "email": "owner@example.com", "code": "000000x" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::NOT_FOUND);
    assert_eq!(wrong.message(), "Invalid verification code");

    let verified = app
        .json(
            "PUT",
            "/user/validation",
            None,
            json!({ "email": "owner@example.com", "code": code }),
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK);

    let bad_password = app
        .json(
            "POST",
            "/user/login",
            None,
            json!({ "email": "owner@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(bad_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad_password.message(), "Incorrect password");

    let unknown = app
        .json(
            "POST",
            "/user/login",
            None,
            json!({ "email": "nobody@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let login = app
        .json(
            "POST",
            "/user/login",
            None,
            json!({ "email": "owner@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let login = login.json();
    assert_eq!(login["isVerified"], true);

    let me = app.get("/user/me", login["token"].as_str().unwrap()).await;
    assert_eq!(me.status, StatusCode::OK);
    let me = me.json();
    assert_eq!(me["email"], "owner@example.com");
    assert_eq!(me["status"], "active");
    assert!(me.get("passwordHash").is_none());
    assert!(me.get("verificationCode").is_none());
}

#[tokio::test]
async fn test_password_recovery() {
    let app = spawn_app().await;
    app.register("forgetful@example.com").await;

    let recover = app
        .json(
            "POST",
            "/user/recover",
            None,
            json!({ "email": "forgetful@example.com" }),
        )
        .await;
    assert_eq!(recover.status, StatusCode::OK);
    let code = recover.json()["code"].as_str().unwrap().to_string();

    let wrong = app
        .json(
            "POST",
            "/user/reset-password",
            None,
            json!({ "email": "forgetful@example.com", "code": "nope", "newPassword": "brand-new-pass" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.message(), "Incorrect code or invalid user");

    let reset = app
        .json(
            "POST",
            "/user/reset-password",
            None,
            json!({ "email": "forgetful@example.com", "code": code, "newPassword": "brand-new-pass" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);

    let login = app
        .json(
            "POST",
            "/user/login",
            None,
            json!({ "email": "forgetful@example.com", "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn test_soft_deleted_account_cannot_log_in() {
    let app = spawn_app().await;
    let token = app.register("leaving@example.com").await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/user/delete")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), "User deactivated");

    let login = app
        .json(
            "POST",
            "/user/login",
            None,
            json!({ "email": "leaving@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(login.message(), "Account is inactive");
}

#[tokio::test]
async fn test_client_names_are_unique_per_creator() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    app.create_client(&alice, "Acme").await;

    let duplicate = app
        .json("POST", "/client", Some(&alice), json!({ "name": "Acme" }))
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.message(), "Client already created by this user");

    let other_user = app
        .json("POST", "/client", Some(&bob), json!({ "name": "Acme" }))
        .await;
    assert_eq!(other_user.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let app = spawn_app().await;
    let token = app.register("alice@example.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/client")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(!response.message().is_empty());
}

#[tokio::test]
async fn test_records_are_isolated_between_companies() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let alice = app.join_company(&alice, "B12345678").await;
    let colleague = app.register("colleague@example.com").await;
    let colleague = app.join_company(&colleague, "B12345678").await;
    let outsider = app.register("outsider@example.com").await;

    let client_id = app.create_client(&alice, "Shared client").await;

    let hidden = app.get(&format!("/client/{}", client_id), &outsider).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/client", &outsider).await.json(), json!([]));

    let shared = app.get(&format!("/client/{}", client_id), &colleague).await;
    assert_eq!(shared.status, StatusCode::OK);
    assert_eq!(shared.json()["company"], "B12345678");
    assert_eq!(app.get("/client", &colleague).await.json().as_array().unwrap().len(), 1);

    // Mutations stay with the creator
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/client/{}", client_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", colleague))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_archive_and_restore_client() {
    let app = spawn_app().await;
    let token = app.register("alice@example.com").await;
    let client_id = app.create_client(&token, "Acme").await;

    let archive_uri = format!("/client/archive/{}", client_id);
    let archived = app.json("PATCH", &archive_uri, Some(&token), json!({})).await;
    assert_eq!(archived.status, StatusCode::OK);
    assert_eq!(archived.json()["client"]["archived"], true);

    assert_eq!(app.get("/client", &token).await.json(), json!([]));
    let direct = app.get(&format!("/client/{}", client_id), &token).await;
    assert_eq!(direct.status, StatusCode::OK);

    let twice = app.json("PATCH", &archive_uri, Some(&token), json!({})).await;
    assert_eq!(twice.status, StatusCode::NOT_FOUND);
    assert_eq!(twice.message(), "Client not found or already archived");

    let restored = app
        .json(
            "PATCH",
            &format!("/client/restore/{}", client_id),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(restored.status, StatusCode::OK);
    assert_eq!(app.get("/client", &token).await.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_note_creation_requires_visible_references() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let client_id = app.create_client(&alice, "Acme").await;

    let response = app
        .json(
            "POST",
            "/deliverynote",
            Some(&bob),
            json!({ "project": 1, "client": client_id, "type": "simple", "data": [] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let bad_type = app
        .json(
            "POST",
            "/deliverynote",
            Some(&alice),
            json!({ "project": 1, "client": client_id, "type": "weekly", "data": [] }),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signing_flow() {
    let app = spawn_app().await;
    let token = app.register("signer@example.com").await;
    let note_id = app.create_note(&token, "Kitchen").await;
    let pdf_uri = format!("/deliverynote/pdf/{}", note_id);

    // Unsigned notes are rendered on demand, identically each time
    let first = app.get(&pdf_uri, &token).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        first.headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"delivery-note-{}.pdf\"", note_id).as_str()
    );
    assert!(first.body.starts_with(b"%PDF-"));
    let second = app.get(&pdf_uri, &token).await;
    assert_eq!(first.body, second.body);

    let signed = app.sign(note_id, &token, Some(&png_signature(120, 60))).await;
    assert_eq!(signed.status, StatusCode::OK);
    assert_eq!(signed.message(), "Delivery note signed successfully");
    let note = signed.json()["note"].clone();
    assert_eq!(note["signed"], true);
    let pdf_url = note["pdfUrl"].as_str().unwrap().to_string();
    assert!(pdf_url.starts_with("http://localhost:3000/files/"));
    assert_eq!(note["signatureUrl"], pdf_url.as_str());

    // The stored artifact is served back as uploaded
    let stored_path = pdf_url.trim_start_matches("http://localhost:3000");
    let stored = app.get(stored_path, &token).await;
    assert_eq!(stored.status, StatusCode::OK);
    assert!(stored.body.starts_with(b"%PDF-"));

    let redirect = app.get(&pdf_uri, &token).await;
    assert_eq!(redirect.status, StatusCode::FOUND);
    assert_eq!(redirect.headers[header::LOCATION], pdf_url.as_str());

    let again = app.sign(note_id, &token, Some(&png_signature(80, 80))).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.message(), "The delivery note is already signed");
    let unchanged = app.get(&format!("/deliverynote/{}", note_id), &token).await;
    assert_eq!(unchanged.json()["pdfUrl"], pdf_url.as_str());
    assert_eq!(unchanged.json()["projectName"], "Kitchen project");

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/deliverynote/{}", note_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let locked = app.send(request).await;
    assert_eq!(locked.status, StatusCode::BAD_REQUEST);
    assert_eq!(locked.message(), "Cannot delete a signed delivery note");

    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_signing_without_image_leaves_note_unsigned() {
    let app = spawn_app().await;
    let token = app.register("signer@example.com").await;
    let note_id = app.create_note(&token, "Bathroom").await;

    let no_field = app.sign(note_id, &token, None).await;
    assert_eq!(no_field.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_field.message(), "No signature attached");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/deliverynote/sign/{}", note_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let no_body = app.send(request).await;
    assert_eq!(no_body.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_body.message(), "No signature attached");

    let garbage = app.sign(note_id, &token, Some(b"definitely not an image")).await;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);
    assert_eq!(garbage.message(), "Invalid signature image");

    let note = app.get(&format!("/deliverynote/{}", note_id), &token).await;
    assert_eq!(note.json()["signed"], false);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/deliverynote/{}", note_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let deleted = app.send(request).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.message(), "Delivery note deleted successfully");

    let gone = app.get(&format!("/deliverynote/{}", note_id), &token).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_other_users_cannot_sign() {
    let app = spawn_app().await;
    let owner = app.register("owner@example.com").await;
    let stranger = app.register("stranger@example.com").await;
    let note_id = app.create_note(&owner, "Garage").await;

    let response = app.sign(note_id, &stranger, Some(&png_signature(40, 20))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.message(), "Delivery note not found");
}

#[tokio::test]
async fn test_concurrent_signing_has_one_winner() {
    let app = spawn_app().await;
    let token = app.register("signer@example.com").await;
    let note_id = app.create_note(&token, "Roof").await;

    let signature = png_signature(60, 30);
    let (first, second) = tokio::join!(
        app.sign(note_id, &token, Some(&signature)),
        app.sign(note_id, &token, Some(&signature)),
    );

    let mut statuses = vec![first.status, second.status];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::BAD_REQUEST]);

    let loser = if first.status == StatusCode::OK { second } else { first };
    assert_eq!(loser.message(), "The delivery note is already signed");
    assert_eq!(app.temp_files(), 0);
}
