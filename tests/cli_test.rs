use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn backend(script_status: u16, verification_status: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sdk.js"))
        .respond_with(ResponseTemplate::new(script_status).set_body_string("window.Checkout = {};"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/verification"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": verification_status })),
        )
        .mount(&server)
        .await;
    server
}

fn checkout(server: &MockServer) -> Command {
    let mut cmd = Command::new(cargo_bin!("checkout-orchestrator"));
    cmd.arg("--payment-url")
        .arg("https://pay.example/session/abc")
        .arg("--payment-id")
        .arg("pay_123")
        .arg("--amount")
        .arg("25.00")
        .arg("--script-url")
        .arg(format!("{}/sdk.js", server.uri()))
        .arg("--verification-url")
        .arg(server.uri())
        .arg("--poll-interval-ms")
        .arg("50")
        .arg("--display-delay-ms")
        .arg("0");
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_confirmed_payment() {
    let server = backend(200, "confirmed").await;

    checkout(&server)
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: success"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_user_cancel() {
    let server = backend(200, "confirmed").await;

    checkout(&server)
        .arg("--signal")
        .arg("cancel")
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: failed (Payment was cancelled.)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_script_unavailable() {
    let server = backend(404, "confirmed").await;

    checkout(&server)
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: failed"))
        .stdout(predicate::str::contains("Payment provider unavailable"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_pending_times_out() {
    let server = backend(200, "pending").await;

    checkout(&server)
        .arg("--poll-timeout-ms")
        .arg("300")
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: timed out"))
        .stdout(predicate::str::contains("check back later"));
}

#[test]
fn test_cli_rejects_non_positive_amount() {
    let mut cmd = Command::new(cargo_bin!("checkout-orchestrator"));
    cmd.args([
        "--payment-url",
        "https://pay.example/session/abc",
        "--payment-id",
        "pay_123",
        "--amount",
        "0",
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Amount must be positive"));
}

#[test]
fn test_cli_reads_config_file() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, r#"{{"poll_interval_ms": 0}}"#).unwrap();

    let mut cmd = Command::new(cargo_bin!("checkout-orchestrator"));
    cmd.args([
        "--payment-url",
        "https://pay.example/session/abc",
        "--payment-id",
        "pay_123",
        "--amount",
        "10",
    ])
    .arg("--config")
    .arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("poll_interval_ms must be greater than zero"));
}
