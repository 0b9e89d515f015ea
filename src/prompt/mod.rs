use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::context::ContextBlock;
use crate::errors::FlaviaError;

/// What gets sent to the provider: a system part and a user part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Both parts as one text, the way `flavia prompt` prints it.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }

    pub fn len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}

pub const DIVERSITY_RULE: &str =
    "Never plan more than two consecutive days of the same cuisine category.";

fn recipe_schema() -> &'static str {
r#"{
  "name": "Chicken and cabbage miso stir-fry",
  "description": "One short sentence.",
  "ingredients": ["200 g chicken thigh", "1/4 cabbage", "1 tbsp miso"],
  "instructions": ["Cut the chicken into bite-size pieces.", "Stir-fry with the cabbage.", "Season with miso."],
  "prep_time": 10,
  "cook_time": 15,
  "servings": 2,
  "difficulty": "easy",
  "nutrition": "approx. 520 kcal, 35 g protein",
  "notes": "Optional tips."
}"#
}

fn plan_schema() -> &'static str {
r#"{
  "days": [
    {
      "day": 1,
      "date": "Monday",
      "cuisine": "japanese",
      "estimated_cost": 800,
      "recipe": {
        "name": "string",
        "description": "string",
        "ingredients": ["quantity unit ingredient"],
        "instructions": ["step"],
        "prep_time": 10,
        "cook_time": 20,
        "servings": 2,
        "difficulty": "easy | medium | hard",
        "nutrition": "string",
        "notes": "string"
      }
    }
  ]
}"#
}

fn output_rules() -> &'static str {
r#"Output rules:
- Return EXACTLY ONE JSON object matching the schema. No markdown, no prose, no code fences.
- Every ingredient line starts with its quantity and unit when one applies ("2 tbsp soy sauce").
- Times are whole minutes. Servings is a positive whole number. Costs are whole currency units.
- Use only ingredients a home cook can buy in an ordinary supermarket."#
}

/// Terms the request itself asks to leave out: `no X`, `without X and Y`,
/// `avoid X, Y or Z`, `X-free`.
pub fn extract_request_avoids(request: &str) -> Vec<String> {
    static NEGATION: OnceLock<Regex> = OnceLock::new();
    static STOP: OnceLock<Regex> = OnceLock::new();
    static FREE: OnceLock<Regex> = OnceLock::new();
    let negation =
        NEGATION.get_or_init(|| Regex::new(r"(?i)\b(?:no|without|avoid)\s+").expect("valid regex"));
    let stop = STOP.get_or_init(|| Regex::new(r"(?i)[.;!?。]|\bplease\b").expect("valid regex"));
    let free = FREE.get_or_init(|| Regex::new(r"(?i)\b([\p{L}]+)-free\b").expect("valid regex"));

    let mut out = Vec::new();
    let starts: Vec<_> = negation.find_iter(request).collect();
    for (i, m) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(request.len(), |next| next.start());
        let mut span = &request[m.end()..end];
        if let Some(cut) = stop.find(span) {
            span = &span[..cut.start()];
        }
        for term in negated_list(span) {
            push_unique(&mut out, &term);
        }
    }
    for c in free.captures_iter(request) {
        if let Some(t) = c.get(1) {
            push_unique(&mut out, &t.as_str().to_lowercase());
        }
    }
    out
}

/// Items of the list following a negation. `and`/`or` continue it; a comma
/// continues it only when the chain closes with `or`/`nor` ("nuts, dairy or
/// eggs"), so "no nuts, chicken and cabbage" keeps just "nuts".
fn negated_list(span: &str) -> Vec<String> {
    static SEP: OnceLock<Regex> = OnceLock::new();
    let sep = SEP.get_or_init(|| {
        Regex::new(r"(?i)\s*[,、]\s*|\s+(and|or|nor)\s+").expect("valid regex")
    });

    let mut items = Vec::new();
    // `None` marks a comma.
    let mut joins: Vec<Option<String>> = Vec::new();
    let mut last = 0;
    for c in sep.captures_iter(span) {
        let Some(whole) = c.get(0) else { continue };
        items.push(&span[last..whole.start()]);
        joins.push(c.get(1).map(|m| m.as_str().to_lowercase()));
        last = whole.end();
    }
    items.push(&span[last..]);

    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 && joins[i - 1].is_none() {
            let closing = joins[i..].iter().flatten().next();
            if !matches!(closing.map(String::as_str), Some("or" | "nor")) {
                break;
            }
        }
        let term = item.trim().to_lowercase();
        if !is_avoid_term(&term) {
            break;
        }
        out.push(term);
    }
    out
}

fn is_avoid_term(term: &str) -> bool {
    let mut words = term.split_whitespace();
    let Some(first) = words.next() else { return false };
    first.starts_with(char::is_alphabetic)
        && !term.ends_with("-free")
        && words.count() < 3
        && !matches!(
            first,
            "more" | "less" | "longer" | "than" | "need" | "time" | "make" | "extra" | "too"
        )
}

fn push_unique(out: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() && !out.iter().any(|o| o.to_lowercase() == item.to_lowercase()) {
        out.push(item.to_string());
    }
}

/// Context hard constraints first, then whatever the request adds.
pub fn merged_avoids(request: &str, ctx: &ContextBlock) -> Vec<String> {
    let mut out = Vec::new();
    for item in ctx.must_avoid.iter().cloned().chain(extract_request_avoids(request)) {
        push_unique(&mut out, &item);
    }
    out
}

fn avoid_block(avoid: &[String]) -> String {
    if avoid.is_empty() {
        return "Hard constraints: none recorded.".to_string();
    }
    let mut s = String::from("Hard constraints (allergies and dislikes, never violate):\n");
    for a in avoid {
        s.push_str("- MUST avoid ");
        s.push_str(a);
        s.push('\n');
    }
    s.push_str("Do not list any of these, or anything made from them, as an ingredient.");
    s
}

fn context_block(ctx: &ContextBlock) -> String {
    if ctx.is_empty() {
        "Personal context: none on file.".to_string()
    } else {
        format!("Personal context:\n{}", ctx.text)
    }
}

pub const SALE_HINT: &str =
    "Build around the on-sale items above where they suit the request; hard constraints still come first.";

fn sale_hint(ctx: &ContextBlock) -> String {
    if ctx.has_sales() {
        format!("\n{SALE_HINT}\n")
    } else {
        String::new()
    }
}

fn checked_request(request: &str) -> Result<&str, FlaviaError> {
    let r = request.trim();
    if r.is_empty() {
        return Err(FlaviaError::InvalidRequest("request text is empty".into()));
    }
    Ok(r)
}

pub fn system_prompt_recipe() -> String {
    format!(
r#"You are Flavia, a careful home-cooking assistant.
You design one dinner recipe that fits the person's constraints and preferences.

Return EXACTLY ONE JSON object with this shape:

{schema}

{rules}"#,
        schema = recipe_schema(),
        rules = output_rules()
    )
}

pub fn system_prompt_plan() -> String {
    format!(
r#"You are Flavia, a careful home-cooking assistant.
You plan consecutive dinners that fit the person's constraints and preferences.

Return EXACTLY ONE JSON object with this shape:

{schema}

{rules}
- The "days" array has exactly one entry per requested day, numbered from 1 in order.
- Diversity: {diversity}
- Reuse ingredients across days where it keeps the shopping list short."#,
        schema = plan_schema(),
        rules = output_rules(),
        diversity = DIVERSITY_RULE
    )
}

pub fn build_recipe_prompt(request: &str, ctx: &ContextBlock) -> Result<Prompt, FlaviaError> {
    let request = checked_request(request)?;
    let avoid = merged_avoids(request, ctx);
    let user = format!(
"Request:
{request}

{avoid}

{context}
{sales}
Write one recipe for this request as the JSON object described above.",
        request = request,
        avoid = avoid_block(&avoid),
        context = context_block(ctx),
        sales = sale_hint(ctx)
    );
    Ok(Prompt { system: system_prompt_recipe(), user })
}

pub fn build_plan_prompt(
    request: &str,
    days: u32,
    ctx: &ContextBlock,
    max_days: u32,
) -> Result<Prompt, FlaviaError> {
    let request = checked_request(request)?;
    if days == 0 || days > max_days {
        return Err(FlaviaError::InvalidRequest(format!(
            "days must be between 1 and {max_days}, got {days}"
        )));
    }
    let avoid = merged_avoids(request, ctx);
    let user = format!(
"Request:
{request}

Plan exactly {days} dinner(s), days 1 to {days}.
{diversity}

{avoid}

{context}
{sales}
Return the plan as the JSON object described above.",
        request = request,
        days = days,
        diversity = DIVERSITY_RULE,
        avoid = avoid_block(&avoid),
        context = context_block(ctx),
        sales = sale_hint(ctx)
    );
    Ok(Prompt { system: system_prompt_plan(), user })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(avoid: &[&str]) -> ContextBlock {
        ContextBlock {
            text: "## Hard constraints (never violate)\n- Allergies: peanuts".into(),
            must_avoid: avoid.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn plan_prompt_carries_schema_constraints_and_diversity() {
        let p = build_plan_prompt("3 days, chicken and cabbage, no nuts", 3, &ctx(&["peanuts"]), 14)
            .unwrap();
        assert!(p.system.contains("\"days\""));
        assert!(p.system.contains("\"ingredients\""));
        assert!(p.render().contains(DIVERSITY_RULE));
        assert!(p.user.contains("- MUST avoid peanuts"));
        assert!(p.user.contains("- MUST avoid nuts"));
        assert!(p.user.contains("Plan exactly 3 dinner(s)"));
        assert!(p.user.contains("Allergies: peanuts"));
    }

    #[test]
    fn days_out_of_range_are_rejected() {
        for days in [0, 15, 100] {
            let err = build_plan_prompt("dinners", days, &ContextBlock::default(), 14).unwrap_err();
            assert!(matches!(err, FlaviaError::InvalidRequest(_)), "days {days}");
        }
        assert!(build_plan_prompt("dinners", 14, &ContextBlock::default(), 14).is_ok());
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(
            build_recipe_prompt("   ", &ContextBlock::default()),
            Err(FlaviaError::InvalidRequest(_))
        ));
    }

    #[test]
    fn prompts_are_deterministic() {
        let c = ctx(&["celery"]);
        assert_eq!(
            build_plan_prompt("two days of fish", 2, &c, 14).unwrap(),
            build_plan_prompt("two days of fish", 2, &c, 14).unwrap()
        );
    }

    #[test]
    fn request_avoids() {
        assert_eq!(extract_request_avoids("chicken, no nuts"), vec!["nuts"]);
        assert_eq!(
            extract_request_avoids("pasta without mushrooms and gluten-free please"),
            vec!["mushrooms", "gluten"]
        );
        assert!(extract_request_avoids("no more than 30 minutes").is_empty());
        assert_eq!(extract_request_avoids("3 days, no nuts or dairy"), vec!["nuts", "dairy"]);
        assert_eq!(extract_request_avoids("pasta without onions and garlic"), vec!["onions", "garlic"]);
        assert_eq!(extract_request_avoids("avoid nuts, dairy or eggs"), vec!["nuts", "dairy", "eggs"]);
        assert_eq!(extract_request_avoids("no nuts, chicken and cabbage"), vec!["nuts"]);
        assert_eq!(extract_request_avoids("3 days, chicken and cabbage, no nuts"), vec!["nuts"]);
    }

    #[test]
    fn sale_hint_only_with_sale_section() {
        let plain = build_plan_prompt("dinners", 2, &ctx(&[]), 14).unwrap();
        assert!(!plain.user.contains(SALE_HINT));

        let mut with_sales = ctx(&[]);
        with_sales.text.push_str("\n\n## On sale this week\n- Items: cabbage ¥98");
        with_sales.included.push(crate::context::SALE_SECTION);
        let p = build_plan_prompt("dinners", 2, &with_sales, 14).unwrap();
        assert!(p.user.contains(SALE_HINT));
        assert!(p.user.find("cabbage ¥98").unwrap() < p.user.find(SALE_HINT).unwrap());
    }

    #[test]
    fn every_listed_avoid_gets_a_must_line() {
        let p = build_recipe_prompt("stir-fry, no nuts or dairy", &ctx(&[])).unwrap();
        assert!(p.user.contains("- MUST avoid nuts"));
        assert!(p.user.contains("- MUST avoid dairy"));
    }

    #[test]
    fn avoids_are_deduplicated_case_insensitively() {
        let merged = merged_avoids("no Peanuts", &ctx(&["peanuts"]));
        assert_eq!(merged, vec!["peanuts"]);
    }

    #[test]
    fn empty_context_says_so() {
        let p = build_recipe_prompt("miso soup", &ContextBlock::default()).unwrap();
        assert!(p.user.contains("Personal context: none on file."));
        assert!(p.user.contains("Hard constraints: none recorded."));
    }
}
