//! `factctx fact`: Fact management commands.

use super::{load_config, open_store};
use factctx_core::{Fact, FactDraft, FactFilter, FactId, FactStore, FactUpdate, FactValue, Scope};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Turn a command-line value into a [`FactValue`].
///
/// Plain values are stored as text. With `json`, the raw string must be a
/// JSON string, number, bool or object.
pub fn parse_value(raw: &str, json: bool) -> Result<FactValue, Box<dyn std::error::Error>> {
    if !json {
        return Ok(FactValue::from(raw));
    }
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| format!("Invalid JSON value: {e}"))?;
    Ok(from_json_value(parsed)?)
}

fn from_json_value(value: Value) -> Result<FactValue, String> {
    match value {
        Value::String(s) => Ok(FactValue::Text(s)),
        Value::Bool(b) => Ok(FactValue::Bool(b)),
        Value::Number(n) => n
            .as_f64()
            .map(FactValue::Number)
            .ok_or_else(|| format!("Unsupported number: {n}")),
        Value::Object(fields) => fields
            .into_iter()
            .map(|(k, v)| Ok((k, from_json_value(v)?)))
            .collect::<Result<BTreeMap<_, _>, String>>()
            .map(FactValue::Map),
        Value::Null => Err("null is not a fact value".into()),
        Value::Array(_) => Err("arrays are not fact values; use an object".into()),
    }
}

pub async fn add(
    store: Option<&Path>,
    scope: Scope,
    category: String,
    key: String,
    value: FactValue,
    confidence: f64,
    source: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let store = open_store(&config).await?;

    let draft = FactDraft::new(scope, category, key, value)
        .with_confidence(confidence)
        .with_source(source);
    let fact = store.add(draft).await?;

    println!("✅ Added fact {}", fact.id);
    print_fact(&fact);
    Ok(())
}

pub async fn update(
    store: Option<&Path>,
    scope: Scope,
    key: &str,
    value: FactValue,
    confidence: f64,
    source: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let store = open_store(&config).await?;

    let fact = store
        .update(scope, key, FactUpdate::new(value, confidence, source))
        .await?;

    println!("✅ Updated fact {}", fact.id);
    print_fact(&fact);
    Ok(())
}

pub async fn get(store: Option<&Path>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let store = open_store(&config).await?;

    let fact = store.get(&FactId::from(id)).await?;
    print_fact(&fact);
    Ok(())
}

pub async fn list(
    store: Option<&Path>,
    scope: Option<Scope>,
    category: Option<String>,
    min_confidence: Option<f64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let store = open_store(&config).await?;

    let mut filter = FactFilter::all();
    if let Some(scope) = scope {
        filter = filter.scope(scope);
    }
    if let Some(category) = category {
        filter = filter.category(category);
    }
    if let Some(min) = min_confidence {
        filter = filter.min_confidence(min);
    }

    let facts = store.query(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }

    if facts.is_empty() {
        println!("   No facts found.");
        return Ok(());
    }

    println!("📚 {} fact(s) in {}", facts.len(), store.location().display());
    println!();
    for (i, fact) in facts.iter().enumerate() {
        println!(
            "  {:>3}. [{}] {}/{} = {} (confidence {:.2})",
            i + 1,
            fact.scope,
            fact.category,
            fact.key,
            fact.value.render(),
            fact.confidence
        );
        println!("       id: {}", fact.id);
    }
    Ok(())
}

pub async fn delete(store: Option<&Path>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let store = open_store(&config).await?;

    store.delete(&FactId::from(id)).await?;
    println!("🗑️  Deleted fact {id}");
    Ok(())
}

fn print_fact(fact: &Fact) {
    println!("  Id:          {}", fact.id);
    println!("  Scope:       {}", fact.scope);
    println!("  Category:    {}", fact.category);
    println!("  Key:         {}", fact.key);
    println!("  Value:       {} ({})", fact.value.render(), fact.value.kind());
    println!("  Confidence:  {:.2}", fact.confidence);
    println!("  Source:      {}", fact.source);
    println!("  Created:     {}", fact.created_at.to_rfc3339());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_are_text() {
        assert_eq!(
            parse_value("42", false).unwrap(),
            FactValue::Text("42".into())
        );
    }

    #[test]
    fn json_scalars() {
        assert_eq!(parse_value("42", true).unwrap(), FactValue::Number(42.0));
        assert_eq!(parse_value("true", true).unwrap(), FactValue::Bool(true));
        assert_eq!(
            parse_value(r#""postgres""#, true).unwrap(),
            FactValue::Text("postgres".into())
        );
    }

    #[test]
    fn json_object_becomes_map() {
        let value = parse_value(r#"{"host": "db", "port": 5432, "tls": {"on": true}}"#, true)
            .unwrap();
        let FactValue::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["host"], FactValue::Text("db".into()));
        assert_eq!(map["port"], FactValue::Number(5432.0));
        assert!(matches!(map["tls"], FactValue::Map(_)));
    }

    #[test]
    fn unsupported_json_is_rejected() {
        assert!(parse_value("null", true).is_err());
        assert!(parse_value("[1, 2]", true).is_err());
        assert!(parse_value("{not json", true).is_err());
    }
}
