use delivery_notes::config::PinataConfig;
use delivery_notes::services::remote_asset::{FetchError, RemoteAssetClient};
use delivery_notes::services::upload_service::{PinataUploadService, UploadError, UploadService};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pinata(server: &MockServer) -> PinataUploadService {
    PinataUploadService::new(
        PinataConfig {
            jwt: "test-jwt".to_string(),
            api_url: server.uri(),
            gateway_url: "https://gateway.test/ipfs/".to_string(),
        },
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_pinata_upload_returns_gateway_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .and(header("authorization", "Bearer test-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "IpfsHash": "QmSignedNote",
            "PinSize": 1234,
            "Timestamp": "2025-03-07T10:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uploaded = pinata(&server)
        .upload(b"%PDF-1.5 signed".to_vec(), "12.pdf")
        .await
        .unwrap();

    assert_eq!(uploaded.url, "https://gateway.test/ipfs/QmSignedNote");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"12.pdf\""));
    assert!(body.contains("%PDF-1.5 signed"));
}

#[tokio::test]
async fn test_pinata_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid jwt"))
        .mount(&server)
        .await;

    let result = pinata(&server).upload(vec![1, 2, 3], "1.pdf").await;

    match result {
        Err(UploadError::Rejected { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid jwt");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pinata_response_without_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "PinSize": 3 })))
        .mount(&server)
        .await;

    let result = pinata(&server).upload(vec![1, 2, 3], "1.pdf").await;
    assert!(matches!(result, Err(UploadError::MissingHash)));
}

#[tokio::test]
async fn test_pinata_timeout_is_a_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "IpfsHash": "QmLate" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let service = PinataUploadService::new(
        PinataConfig {
            jwt: "test-jwt".to_string(),
            api_url: server.uri(),
            gateway_url: "https://gateway.test/ipfs/".to_string(),
        },
        Duration::from_millis(200),
    );

    let result = service.upload(vec![1, 2, 3], "1.pdf").await;
    assert!(matches!(result, Err(UploadError::Request(_))));
}

#[tokio::test]
async fn test_remote_asset_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmSignature"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![137, 80, 78, 71]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmMissing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = RemoteAssetClient::new(Duration::from_secs(5), 1024);

    let bytes = client
        .fetch(&format!("{}/ipfs/QmSignature", server.uri()))
        .await
        .unwrap();
    assert_eq!(bytes, vec![137, 80, 78, 71]);

    let missing = client.fetch(&format!("{}/ipfs/QmMissing", server.uri())).await;
    assert!(matches!(missing, Err(FetchError::Status(404))));
}

#[tokio::test]
async fn test_remote_asset_size_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmLarge"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmSmall"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
        .mount(&server)
        .await;

    let client = RemoteAssetClient::new(Duration::from_secs(5), 1024);

    let large = client.fetch(&format!("{}/ipfs/QmLarge", server.uri())).await;
    assert!(matches!(large, Err(FetchError::TooLarge(1024))));

    let small = client
        .fetch(&format!("{}/ipfs/QmSmall", server.uri()))
        .await
        .unwrap();
    assert_eq!(small.len(), 64);
}
