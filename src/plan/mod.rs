use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::errors::FlaviaError;
use crate::model::{DinnerPlan, PantryItem, Recipe, WeeklyPlan};
use crate::shopping::{build_shopping_list, singularize};
use crate::wire::DraftDinner;

fn tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(singularize)
        .collect()
}

/// Case- and plural-insensitive mention of `term` in `text`, on word
/// boundaries. Non-ASCII terms match as substrings.
pub fn mentions(text: &str, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return false;
    }
    if !term.is_ascii() {
        return text.to_lowercase().contains(&term.to_lowercase());
    }
    let needle = tokens(term);
    if needle.is_empty() {
        return false;
    }
    let hay = tokens(text);
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Every reason `recipe` is unusable; empty when it passes.
pub fn recipe_problems(recipe: &Recipe, must_avoid: &[String]) -> Vec<String> {
    let mut reasons = Vec::new();
    let label = if recipe.name.trim().is_empty() {
        reasons.push("recipe has no name".to_string());
        "recipe".to_string()
    } else {
        format!("\"{}\"", recipe.name.trim())
    };
    if recipe.ingredients.iter().all(|i| i.trim().is_empty()) {
        reasons.push(format!("{label} has no ingredients"));
    }
    if recipe.instructions.iter().all(|i| i.trim().is_empty()) {
        reasons.push(format!("{label} has no instructions"));
    }
    for term in must_avoid {
        if mentions(&recipe.name, term) {
            reasons.push(format!("{label} names avoided item \"{term}\""));
        }
        for ing in &recipe.ingredients {
            if mentions(ing, term) {
                reasons.push(format!("{label} uses avoided item \"{term}\" (ingredient \"{ing}\")"));
            }
        }
    }
    reasons
}

pub fn validate_recipe(recipe: &Recipe, must_avoid: &[String]) -> Result<(), FlaviaError> {
    let reasons = recipe_problems(recipe, must_avoid);
    if reasons.is_empty() {
        return Ok(());
    }
    warn!(recipe = %recipe.name, rejected = reasons.len(), "recipe failed validation");
    Err(FlaviaError::Validation { reasons, raw: None })
}

/// Checks day numbering and every recipe, then derives the shopping list.
/// All problems are reported together.
pub fn assemble_plan(
    drafts: Vec<DraftDinner>,
    days: u32,
    must_avoid: &[String],
    pantry: &[PantryItem],
) -> Result<WeeklyPlan, FlaviaError> {
    let mut reasons = Vec::new();
    if drafts.len() != days as usize {
        reasons.push(format!("expected {days} dinner(s), model returned {}", drafts.len()));
    }

    // Missing day numbers take the lowest numbers no other dinner claims.
    let claimed: BTreeSet<u32> = drafts.iter().filter_map(|d| d.day).collect();
    let mut free = (1u32..).filter(|n| !claimed.contains(n));
    let mut dinners: Vec<DinnerPlan> = drafts
        .into_iter()
        .map(|d| DinnerPlan {
            day: d.day.or_else(|| free.next()).unwrap_or_default(),
            date: d.date,
            cuisine: d.cuisine,
            recipe: d.recipe,
            estimated_cost: d.estimated_cost,
        })
        .collect();

    let mut seen = BTreeSet::new();
    for d in &dinners {
        if !seen.insert(d.day) {
            reasons.push(format!("day {} appears more than once", d.day));
        }
    }
    let expected: BTreeSet<u32> = (1..=days).collect();
    if reasons.is_empty() && seen != expected {
        let got: Vec<String> = seen.iter().map(u32::to_string).collect();
        reasons.push(format!("days must be exactly 1..={days}, got [{}]", got.join(", ")));
    }

    dinners.sort_by_key(|d| d.day);
    for d in &dinners {
        reasons.extend(
            recipe_problems(&d.recipe, must_avoid)
                .into_iter()
                .map(|r| format!("day {}: {r}", d.day)),
        );
    }

    let total_estimated_cost = dinners
        .iter()
        .try_fold(0u32, |acc, d| acc.checked_add(d.estimated_cost));
    if total_estimated_cost.is_none() {
        reasons.push("estimated cost out of range".to_string());
    }

    if !reasons.is_empty() {
        warn!(rejected = reasons.len(), "plan failed validation");
        return Err(FlaviaError::Validation { reasons, raw: None });
    }

    let shopping_list = build_shopping_list(
        dinners.iter().flat_map(|d| d.recipe.ingredients.iter().map(String::as_str)),
        pantry,
    );
    let total_estimated_cost = total_estimated_cost.unwrap_or_default();
    debug!(days, items = shopping_list.items.len(), total_estimated_cost, "assembled plan");
    Ok(WeeklyPlan { dinners, shopping_list, total_estimated_cost })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str, ingredients: &[&str]) -> Recipe {
        Recipe {
            name: name.into(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: vec!["Cook.".into()],
            ..Default::default()
        }
    }

    fn draft(day: Option<u32>, r: Recipe) -> DraftDinner {
        DraftDinner { day, date: None, cuisine: None, estimated_cost: 5, recipe: r }
    }

    #[test]
    fn avoided_terms_match_plurals_and_case() {
        assert!(mentions("2 tbsp Peanut butter", "peanuts"));
        assert!(mentions("a handful of peanuts", "Peanut"));
        assert!(!mentions("1 tsp nutmeg", "nuts"));
        assert!(mentions("パクチー 少々", "パクチー"));
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let r = Recipe { name: String::new(), ..Default::default() };
        let reasons = recipe_problems(&r, &[]);
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn peanut_recipe_is_rejected() {
        let r = recipe("Satay chicken", &["200 g chicken", "3 tbsp peanut butter"]);
        let err = validate_recipe(&r, &["peanuts".into()]).unwrap_err();
        match err {
            FlaviaError::Validation { reasons, .. } => assert!(reasons[0].contains("peanut")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn days_are_assigned_and_ordered() {
        let drafts = vec![
            draft(Some(2), recipe("B", &["1 onion"])),
            draft(Some(1), recipe("A", &["2 onions"])),
            draft(None, recipe("C", &["salt"])),
        ];
        let plan = assemble_plan(drafts, 3, &[], &[]).unwrap();
        let days: Vec<u32> = plan.dinners.iter().map(|d| d.day).collect();
        assert_eq!(days, vec![1, 2, 3]);
        assert_eq!(plan.dinners[0].recipe.name, "A");
        assert_eq!(plan.total_estimated_cost, 15);
        assert_eq!(plan.shopping_list.get("onion").unwrap().quantity, Some(3.0));
    }

    #[test]
    fn wrong_count_and_gaps_are_rejected() {
        let drafts = vec![draft(Some(1), recipe("A", &["x"])), draft(Some(3), recipe("B", &["y"]))];
        assert!(matches!(assemble_plan(drafts, 2, &[], &[]), Err(FlaviaError::Validation { .. })));

        let drafts = vec![draft(Some(1), recipe("A", &["x"]))];
        assert!(matches!(assemble_plan(drafts, 2, &[], &[]), Err(FlaviaError::Validation { .. })));

        let drafts = vec![draft(Some(1), recipe("A", &["x"])), draft(Some(1), recipe("B", &["y"]))];
        assert!(matches!(assemble_plan(drafts, 2, &[], &[]), Err(FlaviaError::Validation { .. })));
    }

    #[test]
    fn unnumbered_dinner_takes_the_free_day() {
        let drafts = vec![draft(None, recipe("A", &["x"])), draft(Some(1), recipe("B", &["y"]))];
        let plan = assemble_plan(drafts, 2, &[], &[]).unwrap();
        let names: Vec<&str> = plan.dinners.iter().map(|d| d.recipe.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(plan.dinners[1].day, 2);
    }

    #[test]
    fn overflowing_cost_is_a_validation_error() {
        let mut a = draft(Some(1), recipe("A", &["x"]));
        let mut b = draft(Some(2), recipe("B", &["y"]));
        a.estimated_cost = 4_000_000_000;
        b.estimated_cost = 4_000_000_000;
        match assemble_plan(vec![a, b], 2, &[], &[]) {
            Err(FlaviaError::Validation { reasons, .. }) => {
                assert_eq!(reasons, vec!["estimated cost out of range".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
