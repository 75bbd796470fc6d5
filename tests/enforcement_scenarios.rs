//! End-to-end enforcement through the forward-auth endpoint.
//!
//! Each test runs its own mock LAPI and agent. `127.0.0.1` resolves to
//! country `US` and AS 12300.

mod common;

use common::TestGate;

#[tokio::test]
async fn test_ip_ban_then_unban() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;
    gate.wait_for_status("127.0.0.1", 200).await?;

    gate.lapi.insert_ban_with_id("1", "ip", "127.0.0.1", "1h");
    gate.wait_for_status("127.0.0.1", 403).await?;

    assert_eq!(gate.lapi.delete_decisions_by_ip("127.0.0.1"), 1);
    gate.wait_for_status("127.0.0.1", 200).await?;
    Ok(())
}

#[tokio::test]
async fn test_range_ban() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    gate.lapi.insert_ban_with_id("1", "range", "127.0.0.0/24", "1h");
    gate.wait_for_status("127.0.0.1", 403).await?;

    let outside = gate.check("127.0.1.1").await?;
    assert_eq!(outside.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_country_ban() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    gate.lapi.insert_ban_with_id("1", "country", "US", "1h");
    gate.wait_for_status("127.0.0.1", 403).await?;

    // Not in the country table.
    assert_eq!(gate.check("127.0.0.2").await?.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_as_ban() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    gate.lapi.insert_ban_with_id("1", "AS", "12300", "1h");
    gate.wait_for_status("127.0.0.1", 403).await?;

    assert_eq!(gate.check("127.0.0.2").await?.status(), 200);
    Ok(())
}

#[tokio::test]
async fn test_no_decisions_allows() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    let response = gate.check("127.0.0.1").await?;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("x-remediation").and_then(|v| v.to_str().ok()),
        Some("pass")
    );
    Ok(())
}

#[tokio::test]
async fn test_ban_page_and_remediation_header() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    gate.lapi.insert_decisions("ip", "192.0.2.10", "1h");
    gate.wait_for_status("192.0.2.10", 403).await?;

    let response = gate.check("192.0.2.10").await?;
    assert_eq!(
        response.headers().get("x-remediation").and_then(|v| v.to_str().ok()),
        Some("ban")
    );
    assert!(response.text().await?.contains("Access denied"));
    Ok(())
}

#[tokio::test]
async fn test_captcha_decision() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    gate.lapi.insert_decision("ip", "192.0.2.20", "1h", "captcha");
    gate.wait_for_status("192.0.2.20", 401).await?;

    let response = gate.check("192.0.2.20").await?;
    assert_eq!(
        response.headers().get("x-remediation").and_then(|v| v.to_str().ok()),
        Some("captcha")
    );
    Ok(())
}

#[tokio::test]
async fn test_decision_expires() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;

    gate.lapi.insert_decisions("ip", "192.0.2.30", "1s");
    gate.wait_for_status("192.0.2.30", 403).await?;
    // No deletion is streamed; the TTL alone lifts the ban.
    gate.wait_for_status("192.0.2.30", 200).await?;
    Ok(())
}

#[tokio::test]
async fn test_malformed_client_address() -> anyhow::Result<()> {
    let gate = TestGate::start().await?;
    assert_eq!(gate.check("not-an-address").await?.status(), 400);
    Ok(())
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() -> anyhow::Result<()> {
    let mut gate = TestGate::start().await?;
    gate.lapi.insert_decisions("range", "10.0.0.0/8", "1h");
    gate.wait_for_status("10.1.2.3", 403).await?;
    gate.wait_for_state(|s| matches!(s, lapi_gate::sync::SyncState::Streaming))
        .await?;

    let client = reqwest::Client::new();
    let health: serde_json::Value = client.get(gate.url("/healthz")).send().await?.json().await?;
    assert_eq!(health["sync"], "streaming");
    assert_eq!(health["decisions"]["range"], 1);

    let metrics = client.get(gate.url("/metrics")).send().await?.text().await?;
    assert!(metrics.contains("lapi_gate_verdicts_total"));
    assert!(metrics.contains("lapi_gate_sync_polls_total"));
    Ok(())
}
