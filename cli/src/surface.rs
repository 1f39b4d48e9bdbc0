//! Terminal input surface: prompts on stderr, answers read from stdin.
//!
//! An empty line declines, `:q` cancels.

use std::io::{BufRead, Write};

use relay_adapters::{InputSurface, ProviderFut};
use relay_runtime::ScopeInfo;
use relay_types::{InputOutcome, InputSpec, Notification, RelayError};
use serde_json::Value;

const CANCEL: &str = ":q";

#[derive(Debug, Default, Clone, Copy)]
pub struct StdinSurface;

impl InputSurface for StdinSurface {
    fn present<'a>(
        &'a self,
        scope: ScopeInfo,
        spec: &'a InputSpec,
    ) -> ProviderFut<'a, InputOutcome> {
        Box::pin(async move {
            let prompt = render_prompt(scope, spec);
            let spec = spec.clone();
            tokio::task::spawn_blocking(move || ask(&prompt, &spec))
                .await
                .map_err(|e| RelayError::tool(format!("input task failed: {e}")))?
        })
    }

    fn show(&self, _scope: ScopeInfo, notification: &Notification) {
        match notification.progress {
            Some(p) => eprintln!("[{:>3.0}%] {}", p * 100.0, notification.message),
            None => eprintln!("[....] {}", notification.message),
        }
    }
}

fn render_prompt(scope: ScopeInfo, spec: &InputSpec) -> String {
    let mut prompt = String::new();
    if scope.depth > 0 {
        prompt.push_str(&format!("(branch {}) ", scope.branch));
    }
    prompt.push_str(&spec.message);
    prompt.push('\n');
    for (i, choice) in spec.choices.iter().enumerate() {
        prompt.push_str(&format!("  {}. {choice}\n", i + 1));
    }
    prompt.push_str("> ");
    prompt
}

fn ask(prompt: &str, spec: &InputSpec) -> Result<InputOutcome, RelayError> {
    let stdin = std::io::stdin();
    let mut stderr = std::io::stderr();
    loop {
        let _ = write!(stderr, "{prompt}");
        let _ = stderr.flush();

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| RelayError::tool(format!("failed to read stdin: {e}")))?;
        if read == 0 {
            return Ok(InputOutcome::Cancelled);
        }

        match interpret(spec, &line) {
            Ok(outcome) => return Ok(outcome),
            Err(hint) => {
                let _ = writeln!(stderr, "{hint}");
            }
        }
    }
}

/// Turn one line of input into an outcome, or a hint to ask again.
pub fn interpret(spec: &InputSpec, line: &str) -> Result<InputOutcome, String> {
    let answer = line.trim();
    if answer.is_empty() {
        return Ok(InputOutcome::Declined);
    }
    if answer == CANCEL {
        return Ok(InputOutcome::Cancelled);
    }

    let data = match spec.input_type.as_str() {
        "choice" => {
            if let Ok(n) = answer.parse::<usize>()
                && let Some(choice) = n.checked_sub(1).and_then(|i| spec.choices.get(i))
            {
                Value::String(choice.clone())
            } else if let Some(choice) = spec
                .choices
                .iter()
                .find(|c| c.eq_ignore_ascii_case(answer))
            {
                Value::String(choice.clone())
            } else {
                return Err(format!("Pick 1-{} or type a choice", spec.choices.len()));
            }
        }
        "confirm" => match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" => Value::Bool(true),
            "n" | "no" => Value::Bool(false),
            _ => return Err("Answer y or n".to_string()),
        },
        "number" => answer
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "Enter a number".to_string())?,
        _ => Value::String(answer.to_string()),
    };
    Ok(InputOutcome::Accepted { data })
}
