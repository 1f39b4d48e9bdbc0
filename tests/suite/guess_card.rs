//! `guess_card` end to end through the scripted adapter.

use relay_adapters::ScriptedResponse;
use relay_tools::guess_card::DEFAULT_CHOICES;
use relay_types::{Capability, CapabilitySet, Outcome, RelayError};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::common::{registry, runner, scripted};

#[tokio::test]
async fn correct_guess() {
    let adapter = scripted(vec![ScriptedResponse::accept(
        "choice",
        json!("Ace of Spades"),
    )]);
    let outcome = runner(&adapter)
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed(json!({ "correct": true })));
    assert_eq!(adapter.remaining(), 0);

    let asked = adapter.input_requests();
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].input_type, "choice");
    assert_eq!(asked[0].choices, DEFAULT_CHOICES.map(String::from).to_vec());
}

#[tokio::test]
async fn incorrect_guess_reveals_the_secret() {
    let adapter = scripted(vec![ScriptedResponse::accept(
        "choice",
        json!("Jack of Clubs"),
    )]);
    let outcome = runner(&adapter)
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Completed(json!({
            "correct": false,
            "guess": "Jack of Clubs",
            "secret": "Ace of Spades",
        }))
    );
}

#[tokio::test]
async fn declining_is_a_result_not_an_error() {
    let adapter = scripted(vec![ScriptedResponse::decline("choice")]);
    let outcome = runner(&adapter)
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Completed(json!({ "cancelled": true, "reason": "declined" }))
    );

    let adapter = scripted(vec![ScriptedResponse::cancel("choice")]);
    let outcome = runner(&adapter)
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Completed(json!({ "cancelled": true, "reason": "cancelled" }))
    );
}

#[tokio::test]
async fn custom_choices_and_prompt_reach_the_actor() {
    let adapter = scripted(vec![ScriptedResponse::accept("choice", json!("Red"))]);
    let outcome = runner(&adapter)
        .run(
            "guess_card",
            json!({ "choices": ["Red", "Black"], "prompt": "Colour?" }),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed(json!({ "correct": true })));
    let asked = adapter.input_requests();
    assert_eq!(asked[0].message, "Colour?");
    assert_eq!(asked[0].choices, vec!["Red", "Black"]);
}

#[tokio::test]
async fn unlisted_guess_fails_the_call() {
    let adapter = scripted(vec![ScriptedResponse::accept("choice", json!("Joker"))]);
    let err = runner(&adapter)
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Validation { .. }), "{err}");
}

#[tokio::test]
async fn an_empty_script_is_a_script_error() {
    let adapter = scripted(Vec::new());
    let err = runner(&adapter)
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Script { .. }), "{err}");
}

#[tokio::test]
async fn adapter_without_input_is_refused_before_setup() {
    let adapter = Arc::new(
        relay_adapters::ScriptedAdapter::new(Vec::new())
            .with_capabilities(CapabilitySet::from(Capability::Completion)),
    );
    let runner = relay_executor::ToolRunner::new(registry(), adapter.clone());
    let err = runner
        .run("guess_card", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RelayError::Capability {
            missing: Capability::Input,
            ..
        }
    ));
    assert!(adapter.input_requests().is_empty());
}

#[tokio::test]
async fn unknown_tool() {
    let adapter = scripted(Vec::new());
    let err = runner(&adapter)
        .run("draw_straws", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::UnknownTool { name } if name == "draw_straws"));
}
