//! API surface tests driven through the router, with a live transport
//! bound to loopback.

#![allow(clippy::unwrap_used)]

use std::net::IpAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lightboard_common::devices::{DevicePatch, MacAddress};
use lightboard_common::lights::HSBK;
use lightboard_common::websocket::PushEvent;
use lightboard_tokio::catalog::{Catalog, MemoryCatalog};
use lightboard_tokio::effects::{EffectRunner, LightSink};
use lightboard_tokio::lifx::discovery::{self, DiscoveryConfig};
use lightboard_tokio::lifx::transport::{Transport, TransportConfig};
use lightboard_tokio::lifx::wire::RawFrame;
use lightboard_tokio::pipes::stateless;
use lightboard_tokio::registry::DeviceRegistry;
use lightboard_tokio::services::audio::AudioStore;
use lightboard_tokio::services::http::{self, HttpState};
use tokio::net::UdpSocket;
use tower::util::ServiceExt;

struct Bench {
    router: Router,
    registry: Arc<DeviceRegistry>,
    catalog: Arc<dyn Catalog>,
    /// Receives whatever the transport broadcasts.
    lan: UdpSocket,
}

async fn bench() -> Bench {
    let lan = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let broadcast_address = lan.local_addr().unwrap().to_string();

    let (transport, lifx_events) = Transport::connect(TransportConfig {
        bind_address: "127.0.0.1:0".to_string(),
        broadcast_address,
        ..TransportConfig::default()
    })
    .await
    .unwrap();

    let (registry, _registry_rx) = DeviceRegistry::new();
    let registry = Arc::new(registry);
    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::with_defaults());
    let (push_tx, push_rx) = stateless::create_pipe::<PushEvent>("push-test");

    let sink: Arc<dyn LightSink> = transport.clone();
    let runner = EffectRunner::new(sink, registry.clone(), push_tx.clone());

    let discovery = discovery::run(
        transport.clone(),
        registry.clone(),
        runner.sessions(),
        lifx_events,
        DiscoveryConfig::default(),
    );

    let dir = std::env::temp_dir().join(format!(
        "lightboard-http-test-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
    ));
    let audio = Arc::new(AudioStore::open(dir).await.unwrap());

    let state = HttpState {
        registry: registry.clone(),
        catalog: catalog.clone(),
        runner,
        audio,
        transport,
        discovery,
        push_tx,
        push_rx,
    };

    Bench {
        router: http::router(state),
        registry,
        catalog,
        lan,
    }
}

fn mac() -> MacAddress {
    "d073d500aa11".parse().unwrap()
}

fn ip() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

fn add_device(bench: &Bench) {
    bench.registry.observe_label(mac(), ip(), "Kitchen");
    bench
        .registry
        .observe_state(mac(), ip(), Some(true), Some(HSBK::white(50, 3500)));
    bench
        .registry
        .mutate(
            1,
            &DevicePatch {
                label: None,
                is_adopted: Some(true),
            },
        )
        .unwrap();
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_device_list() {
    let bench = bench().await;
    add_device(&bench);

    let response = bench
        .router
        .clone()
        .oneshot(Request::get("/api/devices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json[0]["mac"], "d073d500aa11");
    assert_eq!(json[0]["isOnline"], true);
    assert_eq!(json[0]["brightness"], 50);
}

#[test_log::test(tokio::test)]
async fn test_discover_broadcasts_one_tagged_frame() {
    let bench = bench().await;

    // Drain the broadcast the discovery job sends at startup.
    let mut buf = [0u8; 1024];
    let _ = bench.lan.recv_from(&mut buf).await.unwrap();

    let response = bench
        .router
        .clone()
        .oneshot(
            Request::post("/api/devices/discover")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (len, _) = bench.lan.recv_from(&mut buf).await.unwrap();
    assert_eq!(len, 36);
    let raw = RawFrame::unpack(&buf[..len]).unwrap();
    assert!(raw.frame.tagged);
    assert_eq!(raw.frame_addr.target, 0);
    assert_eq!(raw.protocol_header.typ, 2);

    // Discovery alone changes no state.
    assert!(bench.registry.list().is_empty());
}

#[tokio::test]
async fn test_unknown_device_is_404() {
    let bench = bench().await;
    let response = bench
        .router
        .clone()
        .oneshot(
            Request::post("/api/devices/42/power")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"power":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_step_duration_is_rejected() {
    let bench = bench().await;
    let body = serde_json::json!({
        "name": "Too Fast",
        "type": "custom",
        "duration": 99,
        "script": {
            "steps": [{ "brightness": 100, "temperature": 3500, "duration": 99 }]
        }
    });

    let response = bench
        .router
        .clone()
        .oneshot(
            Request::post("/api/light-effects")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    let errors = json["errors"].as_array().unwrap();
    assert!(
        errors
            .iter()
            .any(|e| e.as_str().unwrap().contains("at least 100 ms")),
        "{json}"
    );
}

#[tokio::test]
async fn test_scene_apply_without_targets_is_400() {
    let bench = bench().await;
    let response = bench
        .router
        .clone()
        .oneshot(
            Request::post("/api/scenes/1/apply")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scene_apply_reaches_adopted_device() {
    let bench = bench().await;
    add_device(&bench);

    let response = bench
        .router
        .clone()
        .oneshot(
            Request::post("/api/scenes/1/apply")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("applied to 1 devices"));
}

#[tokio::test]
async fn test_sound_button_upload_and_audio_round_trip() {
    let bench = bench().await;
    let audio_bytes: Vec<u8> = (0..3072u32).map(|i| u8::try_from(i % 251).unwrap()).collect();

    let boundary = "lightboardtestboundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n\
             {{\"name\":\"Horn\",\"volume\":80}}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"audioFile\"; \
             filename=\"horn.mp3\"\r\nContent-Type: audio/mpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&audio_bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = bench
        .router
        .clone()
        .oneshot(
            Request::post("/api/sound-buttons")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["name"], "Horn");
    assert_eq!(json["volume"], 80);
    assert_eq!(json["lightEffect"], "none");
    let blob_name = json["audioFile"].as_str().unwrap().to_string();
    assert!(blob_name.ends_with(".mp3"));

    // The stored bytes come back exactly.
    let response = bench
        .router
        .clone()
        .oneshot(
            Request::get(format!("/api/audio/{blob_name}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "audio/mpeg"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), audio_bytes.as_slice());

    // Deleting the button deletes the blob with it.
    let response = bench
        .router
        .clone()
        .oneshot(
            Request::delete("/api/sound-buttons/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(bench.catalog.sound_button(1).is_none());

    let response = bench
        .router
        .clone()
        .oneshot(
            Request::get(format!("/api/audio/{blob_name}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_default_catalog_is_listed() {
    let bench = bench().await;

    let response = bench
        .router
        .clone()
        .oneshot(Request::get("/api/light-effects").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 5);
    assert_eq!(json[0]["name"], "Flash");
    assert_eq!(json[0]["type"], "preset");

    let response = bench
        .router
        .clone()
        .oneshot(Request::get("/api/scenes").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 4);
}
