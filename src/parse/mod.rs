//! Turns free-text model replies into typed drafts.
//!
//! Strategies run in order: the whole reply as JSON, the first fenced (or
//! brace-balanced) JSON block, then markdown section splitting. If none
//! yields a structure the reply comes back inside `FlaviaError::Parse`.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::FlaviaError;
use crate::model::Recipe;
use crate::wire::{DraftDinner, WirePlanDoc, WireRecipeDoc};

mod markdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    StrictJson,
    FencedJson,
    Markdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub strategy: Strategy,
}

pub type ParseResult<T> = Result<Parsed<T>, FlaviaError>;

fn parse_failure(raw: &str, reason: &str) -> FlaviaError {
    FlaviaError::Parse { reason: reason.to_string(), raw: raw.to_string() }
}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Option<(T, Strategy)> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<T>(trimmed) {
        return Some((v, Strategy::StrictJson));
    }
    let block = extract_fenced_block(raw).or_else(|| extract_first_json_object(raw))?;
    serde_json::from_str::<T>(&block).ok().map(|v| (v, Strategy::FencedJson))
}

pub fn parse_recipe(raw: &str) -> ParseResult<Recipe> {
    if let Some((doc, strategy)) = decode_json::<WireRecipeDoc>(raw) {
        if let Some(value) = doc.into_recipe() {
            debug!(?strategy, "parsed recipe");
            return Ok(Parsed { value, strategy });
        }
    }
    match markdown::recipe(raw) {
        Some(value) => {
            debug!(strategy = ?Strategy::Markdown, "parsed recipe");
            Ok(Parsed { value, strategy: Strategy::Markdown })
        }
        None => Err(parse_failure(raw, "no JSON object and no recognizable recipe sections")),
    }
}

pub fn parse_plan(raw: &str) -> ParseResult<Vec<DraftDinner>> {
    if let Some((doc, strategy)) = decode_json::<WirePlanDoc>(raw) {
        let value = doc.into_drafts();
        debug!(?strategy, dinners = value.len(), "parsed plan");
        return Ok(Parsed { value, strategy });
    }
    match markdown::plan(raw) {
        Some(value) => {
            debug!(strategy = ?Strategy::Markdown, dinners = value.len(), "parsed plan");
            Ok(Parsed { value, strategy: Strategy::Markdown })
        }
        None => Err(parse_failure(raw, "no JSON plan and no `Day N` sections")),
    }
}

/// Body of the first ``` fence that is labelled json or looks like JSON.
pub fn extract_fenced_block(s: &str) -> Option<String> {
    let mut rest = s;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let line_end = after.find('\n')?;
        let label = after[..line_end].trim().to_lowercase();
        let body_start = &after[line_end + 1..];
        let close = body_start.find("```")?;
        let body = body_start[..close].trim();
        if label == "json" || body.starts_with('{') || body.starts_with('[') {
            return Some(body.to_string());
        }
        rest = &body_start[close + 3..];
    }
    None
}

/// Extracts the first top-level JSON object substring from a string.
/// Braces inside string literals are ignored; returns None if unbalanced.
pub fn extract_first_json_object(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if start.is_some() => in_string = true,
            b'{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(st) = start {
                        return Some(s[st..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE_JSON: &str = r#"{"name":"Chicken and cabbage stir-fry","description":"Quick",
        "ingredients":["200g chicken thigh","1/4 cabbage","1 tbsp soy sauce"],
        "instructions":["Slice chicken","Stir-fry with cabbage","Season"],
        "prep_time":10,"cook_time":15,"servings":2,"difficulty":"easy"}"#;

    #[test]
    fn strict_json_round_trips() {
        let parsed = parse_recipe(RECIPE_JSON).unwrap();
        assert_eq!(parsed.strategy, Strategy::StrictJson);
        let r = parsed.value;
        assert_eq!(r.name, "Chicken and cabbage stir-fry");
        assert_eq!(r.ingredients, vec!["200g chicken thigh", "1/4 cabbage", "1 tbsp soy sauce"]);
        assert_eq!(r.instructions, vec!["Slice chicken", "Stir-fry with cabbage", "Season"]);
        assert_eq!(r.servings, Some(2));
    }

    #[test]
    fn fenced_json_inside_chatter() {
        let raw = format!("Sure! Here is your recipe:\n\n```json\n{RECIPE_JSON}\n```\nEnjoy!");
        let parsed = parse_recipe(&raw).unwrap();
        assert_eq!(parsed.strategy, Strategy::FencedJson);
        assert_eq!(parsed.value.ingredients.len(), 3);
    }

    #[test]
    fn unfenced_object_inside_chatter() {
        let raw = format!("Here you go {RECIPE_JSON} -- let me know {{if}} you need more");
        let parsed = parse_recipe(&raw).unwrap();
        assert_eq!(parsed.strategy, Strategy::FencedJson);
    }

    #[test]
    fn prose_is_a_parse_error() {
        let raw = "I think a nice chicken dish with some cabbage would be lovely tonight. \
                   Just fry everything together and serve it warm.";
        let err = parse_recipe(raw).unwrap_err();
        assert!(matches!(err, FlaviaError::Parse { .. }));
        assert_eq!(err.raw_text(), Some(raw));
        assert!(matches!(parse_plan(raw), Err(FlaviaError::Parse { .. })));
    }

    #[test]
    fn brace_scan_ignores_braces_in_strings() {
        let s = r#"noise {"a":"}{","b":{"c":1}} tail}"#;
        assert_eq!(extract_first_json_object(s).unwrap(), r#"{"a":"}{","b":{"c":1}}"#);
        assert_eq!(extract_first_json_object("{ never closed"), None);
    }

    #[test]
    fn fence_skips_non_json_blocks() {
        let s = "```text\nhello\n```\n```\n[1,2]\n```";
        assert_eq!(extract_fenced_block(s).unwrap(), "[1,2]");
    }

    #[test]
    fn plan_json_in_fence() {
        let raw = "```json\n{\"days\":[{\"day\":1,\"recipe\":{\"name\":\"A\",\"ingredients\":[\"x\"],\"instructions\":[\"y\"]}}]}\n```";
        let parsed = parse_plan(raw).unwrap();
        assert_eq!(parsed.strategy, Strategy::FencedJson);
        assert_eq!(parsed.value[0].recipe.name, "A");
    }

    #[test]
    fn zero_servings_is_treated_as_unknown() {
        let raw = r#"{"name":"A","ingredients":["1 onion"],"instructions":["cook"],"servings":0}"#;
        let r = parse_recipe(raw).unwrap().value;
        assert_eq!(r.servings, None);
    }
}
