mod demo;

use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Instrument;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use action_binding::recognizer::{LuisRecognizer, Recognizer, ScriptedRecognizer};
use action_binding::{ActionModel, ActionRegistry, ActionStatus, LuisConfig, Resolver, ResolverConfig, TurnInput};

/// Offline mode: a JSON file of `utterance -> recognition` instead of a LUIS app.
const SCRIPT_FILE_ENV: &str = "ACTION_SCRIPT_FILE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = ResolverConfig::from_env()?;
    let registry = Arc::new(ActionRegistry::new(demo::actions())?);
    let recognizer = build_recognizer()?;

    tracing::info!(actions = registry.len(), policy = ?config.unconfirmed_switch, "action console starting");

    let resolver = Resolver::new(registry, recognizer).with_config(config);
    let session = Uuid::new_v4();

    run(resolver)
        .instrument(tracing::info_span!("session", %session))
        .await
}

fn build_recognizer() -> anyhow::Result<Arc<dyn Recognizer>> {
    if let Ok(path) = std::env::var(SCRIPT_FILE_ENV) {
        let raw = std::fs::read_to_string(&path).with_context(|| format!("reading recognizer script {path}"))?;
        let scripted = ScriptedRecognizer::from_json(&raw).with_context(|| format!("parsing recognizer script {path}"))?;
        tracing::info!(%path, "using scripted recognizer");
        return Ok(Arc::new(scripted));
    }

    let luis = LuisConfig::from_env()?;
    let recognizer = LuisRecognizer::new(&luis).with_context(|| {
        format!("set LUIS_APP_ID and LUIS_SUBSCRIPTION_KEY, or {SCRIPT_FILE_ENV} for offline use")
    })?;
    Ok(Arc::new(recognizer))
}

async fn run(resolver: Resolver) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut model = ActionModel::new();

    println!("What do you want to do? (e.g. 'find hotels in Madrid', 'what time is it in Paris')");

    while let Some(line) = lines.next_line().await? {
        let input = if model.status == ActionStatus::ContextSwitch {
            confirmation(&line)
        } else {
            TurnInput::from(line.as_str())
        };

        model = match resolver.evaluate(&model, input).await {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(error = %e, "turn failed");
                println!("Sorry, something went wrong: {e}");
                continue;
            }
        };

        render(&model);

        if model.status == ActionStatus::Fulfilled {
            model = ActionModel::new();
            println!();
            println!("What else can I do for you?");
        }
    }

    Ok(())
}

fn confirmation(line: &str) -> TurnInput {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => TurnInput::Confirm(true),
        "n" | "no" => TurnInput::Confirm(false),
        _ => TurnInput::from(line),
    }
}

fn render(model: &ActionModel) {
    if let Some(sub) = &model.subcontext_result {
        println!("{}", display(sub));
    }

    match model.status {
        ActionStatus::NoActionRecognized => println!("Sorry, I didn't get that."),
        ActionStatus::MissingParameters => {
            if let Some(prompt) = model.prompt() {
                println!("{prompt}");
            }
        }
        ActionStatus::ContextSwitch => {
            if let Some(prompt) = model.prompt() {
                println!("{prompt} (y/n)");
            }
        }
        ActionStatus::Fulfilled => {
            if let Some(result) = &model.result {
                println!("{}", display(result));
            }
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}
