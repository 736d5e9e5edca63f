//! `SheetsClient` against a throwaway HTTP listener.

use std::net::SocketAddr;

use chrono::NaiveDate;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use trackfit::code::{CodeRenderer, QrRenderer};
use trackfit::submit::{Dispatcher, RecordSink, SheetsClient, SubmitError, SubmitFormat, Submission};
use trackfit::{Category, Notice, Notifier, Record, Status};

struct Captured {
    head: String,
    body: String,
}

/// Accepts one request, answers with `status` and hands back what was sent.
async fn fake_endpoint(status: &'static str) -> (SocketAddr, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string();

        let response =
            format!("HTTP/1.1 {status}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok");
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(Captured { head, body });
    });

    (addr, rx)
}

fn record() -> Record {
    let date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
    Record {
        identifier: "RC0001".into(),
        category: Category::RailClips,
        vendor: "Acme".into(),
        batch: "B-42".into(),
        supply_date: date,
        warranty_years: 3,
        status: Status::Valid,
        timestamp: date.and_hms_opt(10, 15, 0).unwrap(),
    }
}

#[test_log::test(tokio::test)]
async fn json_submission_posts_record() {
    let (addr, captured) = fake_endpoint("200 OK").await;
    let client = SheetsClient::new(format!("http://{addr}/exec"), SubmitFormat::Json).unwrap();

    let body = client
        .submit(Submission {
            record: record(),
            image: None,
        })
        .await
        .unwrap();

    assert_eq!(body, "ok");
    let captured = captured.await.unwrap();
    assert!(captured.head.starts_with("POST /exec HTTP/1.1"));
    assert!(captured
        .head
        .to_ascii_lowercase()
        .contains("content-type: application/json"));
    let json: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(json["QR_ID"], "RC0001");
    assert_eq!(json["Type"], "Rail clips");
    assert_eq!(json["Warranty"], "3 Years");
    assert_eq!(json["Supply_Date"], "2024-11-02");
}

#[test_log::test(tokio::test)]
async fn form_submission_carries_image() {
    let (addr, captured) = fake_endpoint("200 OK").await;
    let client = SheetsClient::new(format!("http://{addr}/exec"), SubmitFormat::Form).unwrap();
    let image = QrRenderer.render("RC0001", 200).unwrap();

    client
        .submit(Submission {
            record: record(),
            image: Some(image),
        })
        .await
        .unwrap();

    let captured = captured.await.unwrap();
    assert!(captured
        .head
        .to_ascii_lowercase()
        .contains("content-type: application/x-www-form-urlencoded"));
    assert!(captured.body.contains("QR_ID=RC0001"));
    assert!(captured.body.contains("Type=Rail+clips"));
    assert!(captured
        .body
        .contains("Image=data%3Aimage%2Fsvg%2Bxml%3Bbase64%2C"));
}

#[test_log::test(tokio::test)]
async fn http_error_status_still_counts_as_delivered() {
    let (addr, _captured) = fake_endpoint("500 Internal Server Error").await;
    let client = SheetsClient::new(format!("http://{addr}/exec"), SubmitFormat::Json).unwrap();
    let (notifier, mut rx) = Notifier::channel();
    let dispatcher = Dispatcher::new(client, notifier);

    dispatcher.dispatch(Submission {
        record: record(),
        image: None,
    });
    dispatcher.drain().await;

    assert_eq!(
        rx.try_recv().unwrap(),
        Notice::Sent {
            identifier: "RC0001".into()
        }
    );
}

#[test_log::test(tokio::test)]
async fn unreachable_endpoint_reports_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = SheetsClient::new(format!("http://{addr}/exec"), SubmitFormat::Json).unwrap();
    let (notifier, mut rx) = Notifier::channel();
    let dispatcher = Dispatcher::new(client, notifier);

    dispatcher.dispatch(Submission {
        record: record(),
        image: None,
    });
    assert_eq!(dispatcher.pending(), 1);
    dispatcher.drain().await;

    assert_eq!(dispatcher.pending(), 0);
    assert!(matches!(
        rx.try_recv().unwrap(),
        Notice::SendFailed { identifier, .. } if identifier == "RC0001"
    ));
}

#[test]
fn blank_endpoint_is_rejected() {
    assert!(matches!(
        SheetsClient::new("  ", SubmitFormat::Json),
        Err(SubmitError::NoEndpoint)
    ));
}
