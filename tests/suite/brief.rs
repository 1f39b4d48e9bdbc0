//! `brief`: fan-out research branches over the scripted adapter.

use relay_adapters::{Recorded, ScriptedResponse};
use relay_types::{Outcome, RelayError, Role};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::{runner, scripted};

fn three_replies() -> Vec<ScriptedResponse> {
    vec![
        ScriptedResponse::completion("The moon pulls the water."),
        ScriptedResponse::completion("Wind piles it up."),
        ScriptedResponse::completion("Tides come from both."),
    ]
}

#[tokio::test]
async fn sections_come_back_in_angle_order() {
    let adapter = scripted(three_replies());
    let outcome = runner(&adapter)
        .run(
            "brief",
            json!({ "topic": "tides", "angles": ["moon", "wind"] }),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Completed(json!({
            "topic": "tides",
            "sections": [
                { "angle": "moon", "text": "The moon pulls the water." },
                { "angle": "wind", "text": "Wind piles it up." },
            ],
            "summary": "Tides come from both.",
        }))
    );
    assert_eq!(adapter.remaining(), 0);
}

#[tokio::test]
async fn angle_branches_are_isolated_children() {
    let adapter = scripted(three_replies());
    let outcome = runner(&adapter)
        .run(
            "brief",
            json!({ "topic": "tides", "angles": ["moon", "wind"] }),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));

    let requests = adapter.completion_requests();
    assert_eq!(requests.len(), 3);

    for (request, angle) in requests[..2].iter().zip(["moon", "wind"]) {
        assert_eq!(request.scope.depth, 1);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("tides"));
        assert!(request.messages[1].content.ends_with(angle));
    }
    assert_ne!(requests[0].scope.branch, requests[1].scope.branch);

    let synthesis = &requests[2];
    assert_eq!(synthesis.scope.depth, 0);
    assert_eq!(synthesis.messages.len(), 1);
    assert!(synthesis.messages[0].content.contains("## moon"));
    assert!(synthesis.messages[0].content.contains("Wind piles it up."));
}

#[tokio::test]
async fn progress_is_notified() {
    let adapter = scripted(three_replies());
    let outcome = runner(&adapter)
        .run(
            "brief",
            json!({ "topic": "tides", "angles": ["moon", "wind"] }),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Completed(_)));

    let updates: Vec<(String, Option<f32>)> = adapter
        .recorded()
        .into_iter()
        .filter_map(|r| match r {
            Recorded::Notify { notification, .. } => {
                Some((notification.message, notification.progress))
            }
            Recorded::Log { .. } => None,
        })
        .collect();
    assert_eq!(
        updates,
        vec![
            ("Researching 2 angles".to_string(), Some(0.0)),
            ("Synthesizing".to_string(), Some(0.5)),
            ("Done".to_string(), Some(1.0)),
        ]
    );
}

#[tokio::test]
async fn no_angles_never_reaches_the_adapter() {
    let adapter = scripted(Vec::new());
    let outcome = runner(&adapter)
        .run("brief", json!({ "topic": "tides" }), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Completed(json!({ "topic": "tides", "sections": [], "summary": null }))
    );
    assert!(adapter.completion_requests().is_empty());
}

#[tokio::test]
async fn per_angle_budget_fails_the_call_at_the_child() {
    let adapter = scripted(three_replies());
    let err = runner(&adapter)
        .run(
            "brief",
            json!({ "topic": "tides", "angles": ["moon", "wind"], "angle_tokens": 5 }),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let RelayError::TokenBudget { budget, depth, .. } = err else {
        panic!("expected a token budget error, got {err}");
    };
    assert_eq!(budget, 5);
    assert_eq!(depth, 1);
    // Both children ran; synthesis never did.
    assert_eq!(adapter.completion_requests().len(), 2);
}
