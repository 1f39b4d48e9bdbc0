//! Runner-wide limits, deadlines and cancellation.

use std::sync::Arc;
use std::time::Duration;

use relay_adapters::ScriptedResponse;
use relay_executor::{FinalizeCtx, RespondCtx, SetupStep, ToolDefinition, ToolRegistry, ToolRunner};
use relay_runtime::{Backchannel, Branch, BranchOptions};
use relay_types::{CallId, Interrupt, Limits, Outcome, RelayError, TimeoutScope};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::common::{runner_with, scripted};

async fn echo_finalize(ctx: FinalizeCtx) -> Result<Value, Interrupt> {
    Ok(ctx.response)
}

fn nested() -> ToolDefinition {
    ToolDefinition::responsive(
        "nested",
        "Asks from a grandchild scope",
        json!({ "type": "object" }),
        |ctx: RespondCtx| async move {
            let text = ctx
                .branch
                .spawn(BranchOptions::default(), |child: Branch| async move {
                    child
                        .spawn(BranchOptions::default(), |mut grandchild: Branch| async move {
                            grandchild.complete("deep").await
                        })
                        .await
                })
                .await?;
            Ok(json!(text))
        },
        echo_finalize,
    )
}

fn stalled() -> ToolDefinition {
    ToolDefinition::responsive(
        "stalled",
        "Never answers",
        json!({ "type": "object" }),
        |_ctx: RespondCtx| async move {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        },
        echo_finalize,
    )
}

fn hanging_setup() -> ToolDefinition {
    ToolDefinition::new(
        "hanging",
        "Setup never returns",
        json!({ "type": "object" }),
        |_ctx| async {
            std::future::pending::<()>().await;
            Ok(SetupStep::Done(Value::Null))
        },
        |_ctx: RespondCtx| async { Ok(Value::Null) },
        echo_finalize,
    )
}

fn slow_both_ends() -> ToolDefinition {
    ToolDefinition::new(
        "slow_both_ends",
        "Spends most of the call in setup, then finalize",
        json!({ "type": "object" }),
        |_ctx| async {
            tokio::time::sleep(Duration::from_millis(700)).await;
            SetupStep::handoff(&json!({ "slept": 700 }))
        },
        |_ctx: RespondCtx| async { Ok(json!("ok")) },
        |_ctx: FinalizeCtx| async {
            tokio::time::sleep(Duration::from_millis(700)).await;
            Ok(json!("late"))
        },
    )
}

fn custom_runner(defaults: Limits, responses: Vec<ScriptedResponse>) -> ToolRunner {
    let mut registry = ToolRegistry::default();
    registry.register(nested()).unwrap();
    registry.register(stalled()).unwrap();
    registry.register(hanging_setup()).unwrap();
    registry.register(slow_both_ends()).unwrap();
    let backchannel: Arc<dyn Backchannel> = scripted(responses);
    ToolRunner::new(registry, backchannel).with_defaults(defaults)
}

#[tokio::test]
async fn depth_ceiling_applies_to_every_descendant() {
    let runner = custom_runner(
        Limits::unbounded().with_max_depth(1),
        vec![ScriptedResponse::completion("never")],
    );
    let err = runner
        .run("nested", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, RelayError::DepthLimit { depth: 2, limit: 1 }),
        "{err}"
    );
}

#[tokio::test]
async fn deep_enough_ceiling_lets_the_grandchild_answer() {
    let runner = custom_runner(
        Limits::unbounded().with_max_depth(2),
        vec![ScriptedResponse::completion("from below")],
    );
    let outcome = runner
        .run("nested", json!({}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed(json!("from below")));
}

#[tokio::test]
async fn call_budget_counts_every_branch() {
    let adapter = scripted(vec![
        ScriptedResponse::completion("The moon pulls the water."),
        ScriptedResponse::completion("Wind piles it up."),
        ScriptedResponse::completion("Tides come from both."),
    ]);
    let err = runner_with(&adapter, Limits::unbounded().with_max_tokens(10))
        .run(
            "brief",
            json!({ "topic": "tides", "angles": ["moon", "wind"] }),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let RelayError::TokenBudget {
        used,
        budget,
        depth,
    } = err
    else {
        panic!("expected a token budget error, got {err}");
    };
    assert_eq!((budget, depth), (10, 0));
    assert!(used > 10);
}

#[tokio::test(start_paused = true)]
async fn call_timeout_fails_the_responsive_phase() {
    let runner = custom_runner(
        Limits::unbounded().with_timeout(Duration::from_secs(1)),
        Vec::new(),
    );
    let err = runner
        .run("stalled", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            RelayError::Timeout {
                scope: TimeoutScope::Call,
                ..
            }
        ),
        "{err}"
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_an_outcome() {
    let runner = custom_runner(Limits::unbounded(), Vec::new());
    let signal = CancellationToken::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = runner.run("stalled", json!({}), &signal).await.unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
}

fn is_call_timeout(err: &RelayError) -> bool {
    matches!(
        err,
        RelayError::Timeout {
            scope: TimeoutScope::Call,
            ..
        }
    )
}

#[tokio::test(start_paused = true)]
async fn call_timeout_bounds_setup() {
    let runner = custom_runner(
        Limits::unbounded().with_timeout(Duration::from_secs(1)),
        Vec::new(),
    );
    let started = tokio::time::Instant::now();
    let err = runner
        .run("hanging", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(is_call_timeout(&err), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn setup_and_finalize_share_one_call_clock() {
    // Each phase fits in the limit on its own; together they do not.
    let runner = custom_runner(
        Limits::unbounded().with_timeout(Duration::from_secs(1)),
        Vec::new(),
    );
    let err = runner
        .run("slow_both_ends", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(is_call_timeout(&err), "{err}");
}

#[tokio::test(start_paused = true)]
async fn timed_out_respond_leaves_no_record_behind() {
    let runner = custom_runner(
        Limits::unbounded().with_timeout(Duration::from_secs(1)),
        Vec::new(),
    );
    let id = CallId::new("stuck");
    let err = runner
        .run_with_id("stalled", &id, json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(is_call_timeout(&err), "{err}");
    assert_eq!(runner.executor().phase(&id), None);

    // The id is free again.
    let err = runner
        .run_with_id("stalled", &id, json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(is_call_timeout(&err), "{err}");
}

#[tokio::test(start_paused = true)]
async fn cancelled_respond_leaves_no_record_behind() {
    let runner = custom_runner(Limits::unbounded(), Vec::new());
    let id = CallId::new("quit");
    let signal = CancellationToken::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = runner
        .run_with_id("stalled", &id, json!({}), &signal)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(runner.executor().phase(&id), None);
}

#[tokio::test]
async fn finished_call_leaves_no_record_behind() {
    let runner = custom_runner(
        Limits::unbounded(),
        vec![ScriptedResponse::completion("deep")],
    );
    let id = CallId::new("done");
    let outcome = runner
        .run_with_id("nested", &id, json!({}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed(json!("deep")));
    assert_eq!(runner.executor().phase(&id), None);
}
