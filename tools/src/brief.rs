//! `brief`: fans out one isolated branch per angle, then synthesizes a summary.

use std::fmt::Write as _;

use relay_executor::{FinalizeCtx, RespondCtx, SetupCtx, SetupStep, ToolDefinition};
use relay_runtime::{Branch, BranchOptions};
use relay_types::{ContextMode, Interrupt, Limits};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const NAME: &str = "brief";

#[derive(Debug, Serialize, Deserialize)]
struct Params {
    topic: String,
    #[serde(default)]
    angles: Vec<String>,
    /// Token ceiling for each angle's branch.
    #[serde(default)]
    angle_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Section {
    angle: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Response {
    sections: Vec<Section>,
    summary: String,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "topic": { "type": "string", "minLength": 1 },
            "angles": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 },
                "description": "One research branch is opened per angle"
            },
            "angle_tokens": { "type": "integer", "minimum": 1 }
        },
        "required": ["topic"],
        "additionalProperties": false
    })
}

#[must_use]
pub fn tool() -> ToolDefinition {
    ToolDefinition::new(
        NAME,
        "Research a topic from several angles and summarize",
        schema(),
        setup,
        respond,
        finalize,
    )
    .with_mode(ContextMode::Automated)
    .with_limits(Limits::unbounded().with_max_depth(1))
}

async fn setup(ctx: SetupCtx) -> Result<SetupStep, Interrupt> {
    let params: Params = ctx.params()?;
    if params.angles.is_empty() {
        return SetupStep::done(&json!({
            "topic": params.topic,
            "sections": [],
            "summary": null,
        }));
    }
    SetupStep::handoff(&params)
}

async fn respond(mut ctx: RespondCtx) -> Result<Value, Interrupt> {
    let params: Params = ctx.handoff()?;
    let branch = &mut ctx.branch;

    let mut options = BranchOptions::isolated()
        .with_directive(format!(
            "You are researching \"{}\". Answer in one short paragraph.",
            params.topic
        ))
        .with_label("angle");
    if let Some(tokens) = params.angle_tokens {
        options = options.with_max_tokens(tokens);
    }

    branch.notify(format!("Researching {} angles", params.angles.len()), Some(0.0));
    let sections = branch
        .fan_out(
            options,
            params.angles.iter().cloned().map(|angle| {
                move |child: Branch| research(child, angle)
            }),
        )
        .await?;
    branch.notify("Synthesizing", Some(0.5));

    let mut digest = String::new();
    for section in &sections {
        let _ = writeln!(digest, "## {}\n{}\n", section.angle, section.text);
    }
    let summary = branch
        .complete(format!(
            "Summarize these notes on \"{}\" in two sentences.\n\n{digest}",
            params.topic
        ))
        .await?;
    branch.notify("Done", Some(1.0));

    Ok(serde_json::to_value(Response { sections, summary })?)
}

async fn research(mut child: Branch, angle: String) -> Result<Section, Interrupt> {
    let text = child
        .complete(format!("Cover the topic from this angle: {angle}"))
        .await?;
    Ok(Section { angle, text })
}

async fn finalize(ctx: FinalizeCtx) -> Result<Value, Interrupt> {
    let params: Params = ctx.handoff()?;
    let response: Response = ctx.response()?;
    Ok(json!({
        "topic": params.topic,
        "sections": response.sections,
        "summary": response.summary,
    }))
}
