//! `guess_card`: setup draws a secret card, the actor guesses, finalize scores it.
//!
//! The secret is drawn exactly once, in setup, and only ever read back from the
//! cached handoff snapshot.

use std::sync::Arc;

use relay_executor::{FinalizeCtx, RespondCtx, SetupCtx, SetupStep, ToolDefinition};
use relay_types::{ContextMode, InputOutcome, InputSpec, Interrupt, LogLevel, RelayError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const NAME: &str = "guess_card";

pub const DEFAULT_CHOICES: [&str; 4] = [
    "Ace of Spades",
    "King of Hearts",
    "Queen of Diamonds",
    "Jack of Clubs",
];

const DEFAULT_PROMPT: &str = "I'm thinking of a card. Which one is it?";

/// Picks an index in `0..len`.
pub type Draw = Arc<dyn Fn(usize) -> usize + Send + Sync>;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    choices: Option<Vec<String>>,
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    secret: String,
    choices: Vec<String>,
    prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Guess {
    Guessed { guess: String },
    Declined,
    Cancelled,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "choices": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 },
                "minItems": 2,
                "uniqueItems": true,
                "description": "Cards to choose from. Defaults to four face cards."
            },
            "prompt": {
                "type": "string",
                "description": "Question shown to the guesser"
            }
        },
        "additionalProperties": false
    })
}

/// The tool with a uniformly random draw.
#[must_use]
pub fn tool() -> ToolDefinition {
    tool_with_draw(Arc::new(random_index))
}

/// The tool with a caller-chosen draw, for deterministic runs.
#[must_use]
pub fn tool_with_draw(draw: Draw) -> ToolDefinition {
    ToolDefinition::new(
        NAME,
        "Guess which card was drawn",
        schema(),
        move |ctx| setup(ctx, Arc::clone(&draw)),
        respond,
        finalize,
    )
    .with_mode(ContextMode::Interactive)
}

fn random_index(len: usize) -> usize {
    let len = u64::try_from(len).unwrap_or(u64::MAX).max(1);
    usize::try_from(rand::random::<u64>() % len).unwrap_or(0)
}

async fn setup(ctx: SetupCtx, draw: Draw) -> Result<SetupStep, Interrupt> {
    let params: Params = ctx.params()?;
    let choices = params
        .choices
        .unwrap_or_else(|| DEFAULT_CHOICES.iter().map(|c| (*c).to_string()).collect());
    let index = draw(choices.len());
    let secret = choices
        .get(index)
        .cloned()
        .ok_or_else(|| {
            RelayError::tool(format!("draw returned {index} for {} cards", choices.len()))
        })?;

    tracing::debug!(call_id = %ctx.call_id, cards = choices.len(), "Secret card drawn");
    SetupStep::handoff(&Snapshot {
        secret,
        choices,
        prompt: params.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
    })
}

async fn respond(mut ctx: RespondCtx) -> Result<Value, Interrupt> {
    let snapshot: Snapshot = ctx.handoff()?;
    let branch = &mut ctx.branch;
    branch.log(LogLevel::Info, "Waiting for a guess");

    let spec = InputSpec::choice(snapshot.prompt, snapshot.choices.clone());
    let guess = match branch.request_input(spec).await? {
        InputOutcome::Accepted { data } => {
            let guess = data.as_str().map(str::to_string).ok_or_else(|| {
                RelayError::Validation {
                    message: format!("guess must be a string, got {data}"),
                }
            })?;
            if !snapshot.choices.contains(&guess) {
                return Err(RelayError::Validation {
                    message: format!("'{guess}' is not one of the offered cards"),
                }
                .into());
            }
            Guess::Guessed { guess }
        }
        InputOutcome::Declined => Guess::Declined,
        InputOutcome::Cancelled => Guess::Cancelled,
    };
    Ok(serde_json::to_value(guess)?)
}

async fn finalize(ctx: FinalizeCtx) -> Result<Value, Interrupt> {
    let snapshot: Snapshot = ctx.handoff()?;
    let result = match ctx.response::<Guess>()? {
        Guess::Guessed { guess } if guess == snapshot.secret => json!({ "correct": true }),
        Guess::Guessed { guess } => json!({
            "correct": false,
            "guess": guess,
            "secret": snapshot.secret,
        }),
        Guess::Declined => json!({ "cancelled": true, "reason": "declined" }),
        Guess::Cancelled => json!({ "cancelled": true, "reason": "cancelled" }),
    };
    Ok(result)
}
