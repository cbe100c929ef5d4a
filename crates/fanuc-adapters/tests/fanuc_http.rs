//! Exercises the control-API client against a scripted local HTTP server.

use std::time::Duration;

use chrono::Utc;
use fanuc_adapters::{AdapterError, FanucHttpClient, MachineControl};
use fanuc_models::{ConnectionRequest, FanucService, MachineId, MachineStatus, ServiceId, UserId};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serves one canned response per connection and reports each raw request.
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            tx.send(String::from_utf8_lossy(&buf).into_owned()).unwrap();

            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });

    (addr.to_string(), rx)
}

fn service(base_url: String) -> FanucService {
    FanucService {
        id: ServiceId(1),
        user_id: UserId(1),
        name: "Plant A".into(),
        base_url,
        api_key: "s3cret".into(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_create_machine_posts_body_with_api_key() {
    let (addr, mut requests) = serve(vec![(
        201,
        r#"{"id":"m1","endpoint":"10.0.0.9:8193","timeout":5000,"model":"Unknown","series":"0i","status":"connected","mode":"static"}"#,
    )])
    .await;

    let client = FanucHttpClient::new(Duration::from_secs(5)).unwrap();
    let machine = client
        .create_machine(
            &service(addr),
            &ConnectionRequest {
                endpoint: "10.0.0.9:8193".into(),
                timeout: 5000,
                model: "Unknown".into(),
                series: "0i".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(machine.id, MachineId::new("m1"));
    assert_eq!(machine.status, MachineStatus::Connected);

    let raw = requests.recv().await.unwrap();
    assert!(raw.starts_with("POST /api/v1/machines HTTP/1.1"));
    assert!(raw.to_ascii_lowercase().contains("x-api-key: s3cret"));
    assert!(raw.contains("\"endpoint\":\"10.0.0.9:8193\""));
}

#[tokio::test]
async fn test_start_polling_sends_interval() {
    let (addr, mut requests) = serve(vec![(200, "{}")]).await;

    let client = FanucHttpClient::new(Duration::from_secs(5)).unwrap();
    client
        .start_polling(&service(addr), &MachineId::new("m1"), 250)
        .await
        .unwrap();

    let raw = requests.recv().await.unwrap();
    assert!(raw.starts_with("POST /api/v1/machines/m1/polling/start HTTP/1.1"));
    assert!(raw.contains("\"interval_ms\":250"));
}

#[tokio::test]
async fn test_status_mapping() {
    let (addr, _requests) = serve(vec![(404, "{}"), (500, "boom")]).await;

    let client = FanucHttpClient::new(Duration::from_secs(5)).unwrap();
    let svc = service(addr);

    let err = client.get_machine(&svc, &MachineId::new("gone")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.list_machines(&svc).await.unwrap_err();
    match err {
        AdapterError::Unavailable(msg) => assert!(msg.contains("500")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    // bind and drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };

    let client = FanucHttpClient::new(Duration::from_secs(2)).unwrap();
    let err = client.list_machines(&service(addr)).await.unwrap_err();
    assert!(matches!(err, AdapterError::Unavailable(_)));
}
