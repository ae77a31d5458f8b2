//! Message Integration Tests
//!
//! Tests for JSON request dispatch and the JSON-lines loop.

mod common;

use serde_json::{json, Value};

use common::{harness, ScriptedAgent};
use transcript_archiver::cli::serve::serve_lines;
use transcript_archiver::core::dispatch_json;

const PAGE: &str = "https://tenant.sharepoint.com/meetings/42";

#[tokio::test]
async fn test_add_and_status_messages() {
    let h = harness(ScriptedAgent::new());

    let added = dispatch_json(
        &h.processor,
        &json!({"type": "ADD_URLS", "requestId": 1, "urls": [PAGE, "https://example.org/x"]})
            .to_string(),
    )
    .await;
    assert_eq!(
        added,
        json!({
            "ok": true,
            "accepted": [PAGE],
            "rejected": ["https://example.org/x"],
            "requestId": 1
        })
    );

    let status = dispatch_json(&h.processor, r#"{"type":"GET_STATUS"}"#).await;
    assert_eq!(status["ok"], true);
    assert_eq!(status["queueSize"], 1);
    assert_eq!(status["historyCount"], 0);
    assert_eq!(status["queue"][0]["url"], PAGE);
    assert_eq!(status["queue"][0]["status"], "pending");
    assert_eq!(status["settings"]["enabled"], true);
    assert!(status.get("requestId").is_none());
}

#[tokio::test]
async fn test_run_and_retry_messages() {
    let h = harness(ScriptedAgent::new());
    dispatch_json(
        &h.processor,
        &json!({"type": "ADD_URLS", "urls": [PAGE]}).to_string(),
    )
    .await;

    let ran = dispatch_json(&h.processor, r#"{"type":"RUN_QUEUE","requestId":"r1"}"#).await;
    assert_eq!(ran["ok"], true);
    assert_eq!(ran["processed"], 1);
    assert_eq!(ran["succeeded"], 1);
    assert_eq!(ran["requestId"], "r1");
    assert!(ran.get("skipped").is_none());

    let status = dispatch_json(&h.processor, r#"{"type":"GET_STATUS"}"#).await;
    let id = status["queue"][0]["id"].as_str().unwrap().to_string();

    let retried = dispatch_json(
        &h.processor,
        &json!({"type": "RETRY_ITEM", "id": id}).to_string(),
    )
    .await;
    assert_eq!(retried, json!({"ok": true}));

    let missing = dispatch_json(&h.processor, r#"{"type":"RETRY_ITEM","id":"hffffffff"}"#).await;
    assert_eq!(missing, json!({"ok": false}));
}

#[tokio::test]
async fn test_save_settings_overlays_defaults() {
    let h = harness(ScriptedAgent::new());

    let saved = dispatch_json(
        &h.processor,
        r#"{"type":"SAVE_SETTINGS","settings":{"enabled":false}}"#,
    )
    .await;
    assert_eq!(saved["ok"], true);
    assert_eq!(saved["settings"]["enabled"], false);
    // Absent fields take their defaults, not the stored values
    assert_eq!(saved["settings"]["throttleMs"], 2000);

    let saved = dispatch_json(
        &h.processor,
        r#"{"type":"SAVE_SETTINGS","settings":{"allowRedownload":true}}"#,
    )
    .await;
    assert_eq!(saved["settings"]["allowRedownload"], true);
    assert_eq!(saved["settings"]["enabled"], true);
    assert_eq!(saved["settings"]["throttleMs"], 2000);
    assert_eq!(saved["settings"]["closeTab"], true);

    let status = dispatch_json(&h.processor, r#"{"type":"GET_STATUS"}"#).await;
    assert_eq!(status["settings"], saved["settings"]);
}

#[tokio::test]
async fn test_download_message() {
    let h = harness(ScriptedAgent::new());

    let invalid = dispatch_json(
        &h.processor,
        r#"{"type":"PAGE_DOWNLOAD_REQUEST","url":"nope"}"#,
    )
    .await;
    assert_eq!(
        invalid,
        json!({"ok": false, "reason": "parse-failed: invalid URL"})
    );
}

#[tokio::test]
async fn test_unsupported_messages() {
    let h = harness(ScriptedAgent::new());

    for raw in [
        r#"{"type":"START_EXTRACT","requestId":9}"#,
        r#"{"requestId":9}"#,
        r#"{"type":"RETRY_ITEM","requestId":9}"#,
    ] {
        let answer = dispatch_json(&h.processor, raw).await;
        assert_eq!(
            answer,
            json!({"ok": false, "reason": "Unsupported message type", "requestId": 9}),
            "for {}",
            raw
        );
    }

    let answer = dispatch_json(&h.processor, "not json").await;
    assert_eq!(answer, json!({"ok": false, "reason": "Unsupported message type"}));
}

#[tokio::test]
async fn test_serve_lines_answers_every_request() {
    let h = harness(ScriptedAgent::new());
    let input = format!(
        "{}\n\n{}\n{}\n",
        json!({"type": "ADD_URLS", "requestId": "add", "urls": [PAGE]}),
        json!({"type": "BOGUS", "requestId": "bogus"}),
        json!({"type": "GET_STATUS", "requestId": "status"}),
    );

    let output = serve_lines(h.processor.clone(), input.as_bytes(), Vec::new())
        .await
        .unwrap();

    let answers: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(answers.len(), 3);

    let by_id = |id: &str| {
        answers
            .iter()
            .find(|a| a["requestId"] == id)
            .cloned()
            .unwrap()
    };
    assert_eq!(by_id("add")["ok"], true);
    assert_eq!(by_id("bogus")["reason"], "Unsupported message type");
    assert_eq!(by_id("status")["ok"], true);
}
