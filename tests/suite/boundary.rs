//! Setup and finalize on one side, the responsive phase on the other, with the
//! handoff crossing as JSON.

use std::sync::Arc;

use relay_adapters::ScriptedResponse;
use relay_executor::{HandoffExecutor, respond_phase};
use relay_runtime::Backchannel;
use relay_tools::guess_card;
use relay_types::{CallId, HandoffData, Limits, Outcome, RelayError, SetupOutcome};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::scripted;

#[tokio::test]
async fn handoff_survives_serialization() {
    let tool = guess_card::tool_with_draw(Arc::new(|_| 1));
    let adapter = scripted(vec![ScriptedResponse::accept(
        "choice",
        json!("King of Hearts"),
    )]);
    let backchannel: Arc<dyn Backchannel> = adapter.clone();
    let authority = HandoffExecutor::for_backchannel(backchannel.as_ref());
    let signal = CancellationToken::new();
    let call_id = CallId::new("wire-1");
    let params = json!({});

    let Outcome::Completed(SetupOutcome::Handoff { data }) = authority
        .run_setup(&tool, &call_id, params.clone(), &signal)
        .await
        .unwrap()
    else {
        panic!("expected a handoff");
    };
    assert_eq!(authority.phase(&call_id), Some("awaiting_response"));

    let wire = serde_json::to_string(&data).unwrap();
    let received: HandoffData = serde_json::from_str(&wire).unwrap();

    let response = respond_phase(
        &tool,
        &params,
        &received,
        backchannel,
        Limits::unbounded(),
        &signal,
    )
    .await
    .unwrap()
    .completed()
    .unwrap();
    let response: serde_json::Value = serde_json::from_str(&response.to_string()).unwrap();

    let result = authority
        .resume(&tool, &call_id, &params, &received, response.clone(), &signal)
        .await
        .unwrap();
    assert_eq!(result, Outcome::Completed(json!({ "correct": true })));
    assert_eq!(authority.phase(&call_id), Some("finished"));

    // Asking again replays the stored result.
    let replay = authority
        .resume(&tool, &call_id, &params, &received, response, &signal)
        .await
        .unwrap();
    assert_eq!(replay, result);
    assert_eq!(adapter.consumed(), 1);
}

#[tokio::test]
async fn a_tampered_snapshot_is_rejected() {
    let tool = guess_card::tool_with_draw(Arc::new(|_| 0));
    let authority = HandoffExecutor::new("remote", relay_types::CapabilitySet::all());
    let signal = CancellationToken::new();
    let call_id = CallId::new("wire-2");

    let Outcome::Completed(SetupOutcome::Handoff { mut data }) = authority
        .run_setup(&tool, &call_id, json!({}), &signal)
        .await
        .unwrap()
    else {
        panic!("expected a handoff");
    };
    data.payload["secret"] = json!("Jack of Clubs");

    let err = authority
        .resume(
            &tool,
            &call_id,
            &json!({}),
            &data,
            json!({ "status": "guessed", "guess": "Jack of Clubs" }),
            &signal,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RelayError::CallMismatch {
            field: "handoff",
            ..
        }
    ));
    assert_eq!(authority.phase(&call_id), Some("awaiting_response"));
}

#[tokio::test]
async fn setup_is_not_rerun_for_the_same_call() {
    let draws = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&draws);
    let tool = guess_card::tool_with_draw(Arc::new(move |_| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        0
    }));
    let authority = HandoffExecutor::new("remote", relay_types::CapabilitySet::all());
    let signal = CancellationToken::new();
    let call_id = CallId::new("wire-3");

    let first = authority
        .run_setup(&tool, &call_id, json!({}), &signal)
        .await
        .unwrap();
    let second = authority
        .run_setup(&tool, &call_id, json!({}), &signal)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(draws.load(std::sync::atomic::Ordering::SeqCst), 1);
}
