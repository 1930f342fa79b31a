//! `factctx prompt`: Build a prompt with relevant facts injected.

use super::{load_config, open_store};
use factctx_context::{ContextPipeline, RequestContext};
use std::io::Read;
use std::path::Path;

pub async fn run(
    store: Option<&Path>,
    request_type: &str,
    input: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let pipeline = ContextPipeline::from_config(&config)?;
    let store = open_store(&config).await?;

    let input = match input {
        Some(input) => input,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let output = pipeline
        .run(store.as_ref(), &RequestContext::new(request_type), &input)
        .await?;

    if json {
        let report = serde_json::json!({
            "prompt": output.prompt,
            "conflicts": output.conflicts,
            "metadata": output.metadata,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", output.prompt);

    // Diagnostics go to stderr; stdout carries only the prompt
    if let Some(reason) = &output.metadata.degraded {
        eprintln!("⚠️  Store unavailable, no facts injected: {reason}");
    }
    for conflict in &output.conflicts {
        let others: Vec<String> = conflict
            .losers()
            .map(|c| format!("[{}] {}", c.scope, c.value.render()))
            .collect();
        eprintln!(
            "⚠️  Conflict on '{}': [{}] {} wins over {}{}",
            conflict.key,
            conflict.winner.scope,
            conflict.winner.value.render(),
            others.join(", "),
            if conflict.resolved { " (others dropped)" } else { "" }
        );
    }

    Ok(())
}
