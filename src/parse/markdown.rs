//! Last-resort reading of markdown-ish replies.
//!
//! Only fields that are actually present are filled. A recipe with no
//! ingredients comes back with an empty list, never a placeholder.

use regex::Regex;
use std::sync::OnceLock;

use crate::model::Recipe;
use crate::wire::DraftDinner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Ingredients,
    Instructions,
    Notes,
    Nutrition,
}

fn label_of(text: &str) -> Option<Label> {
    let t = text
        .trim()
        .trim_matches(|c: char| c == '*' || c == ':' || c == '：' || c.is_whitespace())
        .to_lowercase();
    match t.as_str() {
        "ingredients" | "ingredient list" | "what you need" | "材料" => Some(Label::Ingredients),
        "instructions" | "steps" | "method" | "directions" | "preparation" | "how to make"
        | "作り方" | "手順" => Some(Label::Instructions),
        "notes" | "tips" | "note" | "メモ" | "ポイント" => Some(Label::Notes),
        "nutrition" | "栄養" => Some(Label::Nutrition),
        _ => None,
    }
}

fn heading_text(line: &str) -> Option<&str> {
    let t = line.trim();
    if t.starts_with('#') {
        return Some(t.trim_start_matches('#').trim());
    }
    if t.len() > 4 && t.starts_with("**") && t.ends_with("**") {
        return Some(t.trim_matches('*').trim());
    }
    None
}

fn list_item(line: &str) -> Option<&str> {
    static NUMBERED: OnceLock<Regex> = OnceLock::new();
    let numbered = NUMBERED.get_or_init(|| Regex::new(r"^\d+\s*[.)、]\s*").expect("valid regex"));
    let t = line.trim();
    for b in ["- ", "* ", "• ", "・"] {
        if let Some(rest) = t.strip_prefix(b) {
            return Some(rest.trim());
        }
    }
    numbered.find(t).map(|m| t[m.end()..].trim())
}

/// `30 min`, `1 hour 15 minutes`, `30分`, bare `25`.
fn minutes(value: &str) -> Option<u32> {
    static HOURS: OnceLock<Regex> = OnceLock::new();
    static MINS: OnceLock<Regex> = OnceLock::new();
    let hours = HOURS.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:h\b|hrs?\b|hours?\b|時間)").expect("valid regex")
    });
    let mins = MINS.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(?:m\b|mins?\b|minutes?\b|分)").expect("valid regex")
    });
    let h = hours.captures(value).and_then(|c| c[1].parse::<u32>().ok());
    let m = mins.captures(value).and_then(|c| c[1].parse::<u32>().ok());
    match (h, m) {
        (None, None) => {
            let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        (h, m) => h.unwrap_or(0).checked_mul(60)?.checked_add(m.unwrap_or(0)),
    }
}

fn first_number(value: &str) -> Option<u32> {
    let start = value.find(|c: char| c.is_ascii_digit())?;
    value[start..].chars().take_while(|c| c.is_ascii_digit()).collect::<String>().parse().ok()
}

#[derive(Default)]
struct Inline {
    prep: Option<u32>,
    cook: Option<u32>,
    total: Option<u32>,
    servings: Option<u32>,
    cost: Option<u32>,
    cuisine: Option<String>,
    difficulty: Option<String>,
}

/// `Key: value` lines that carry scalar fields wherever they appear.
fn inline_field(line: &str, out: &mut Inline) -> bool {
    let t = line.trim().trim_start_matches(['-', '*', '•']).trim().replace("**", "");
    let Some((k, v)) = t.split_once([':', '：']) else {
        return false;
    };
    let k = k.trim().to_lowercase();
    let v = v.trim();
    match k.as_str() {
        "prep time" | "preparation time" | "下ごしらえ時間" => out.prep = minutes(v),
        "cook time" | "cooking time" | "調理時間" => out.cook = minutes(v),
        "time" | "total time" | "所要時間" => out.total = minutes(v),
        "servings" | "serves" | "yield" | "人数" => out.servings = first_number(v),
        "cost" | "estimated cost" | "price" | "費用" | "価格" => out.cost = first_number(v),
        "cuisine" | "cuisine category" | "ジャンル" => {
            out.cuisine = Some(v.to_string()).filter(|s| !s.is_empty())
        }
        "difficulty" | "難易度" => out.difficulty = Some(v.to_string()).filter(|s| !s.is_empty()),
        _ => return false,
    }
    true
}

struct Chunk {
    recipe: Recipe,
    inline: Inline,
    sections_found: bool,
}

fn read_chunk(text: &str, name_hint: Option<&str>) -> Chunk {
    let mut recipe = Recipe::default();
    let mut inline = Inline::default();
    let mut current: Option<Label> = None;
    let mut sections_found = false;
    let mut notes: Vec<String> = Vec::new();
    let mut nutrition: Vec<String> = Vec::new();
    let mut description: Vec<String> = Vec::new();

    if let Some(n) = name_hint.map(str::trim).filter(|n| !n.is_empty()) {
        recipe.name = n.to_string();
    }

    for line in text.lines() {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        let heading = heading_text(t);
        let bare_label = if heading.is_none() && t.chars().count() <= 24 { label_of(t) } else { None };
        if let Some(label) = heading.and_then(label_of).or(bare_label) {
            current = Some(label);
            sections_found = true;
            continue;
        }
        if let Some(h) = heading {
            if recipe.name.is_empty() {
                recipe.name = strip_name_prefix(h).to_string();
            }
            current = None;
            continue;
        }
        if inline_field(t, &mut inline) {
            continue;
        }
        match current {
            Some(Label::Ingredients) => {
                if let Some(item) = list_item(t).filter(|s| !s.is_empty()) {
                    recipe.ingredients.push(item.to_string());
                }
            }
            Some(Label::Instructions) => {
                let step = list_item(t).unwrap_or(t);
                if !step.is_empty() {
                    recipe.instructions.push(step.to_string());
                }
            }
            Some(Label::Notes) => notes.push(list_item(t).unwrap_or(t).to_string()),
            Some(Label::Nutrition) => nutrition.push(list_item(t).unwrap_or(t).to_string()),
            None => {
                if !recipe.name.is_empty() && !sections_found {
                    description.push(t.to_string());
                }
            }
        }
    }

    recipe.description = description.join(" ");
    recipe.notes = Some(notes.join(" ")).filter(|s| !s.is_empty());
    recipe.nutrition = Some(nutrition.join("; ")).filter(|s| !s.is_empty());
    recipe.prep_minutes = inline.prep;
    recipe.cook_minutes = inline.cook.or(if inline.prep.is_none() { inline.total } else { None });
    recipe.servings = inline.servings.filter(|s| *s > 0);
    recipe.difficulty = inline.difficulty.clone();
    Chunk { recipe, inline, sections_found }
}

fn strip_name_prefix(h: &str) -> &str {
    let lower = h.to_lowercase();
    for p in ["recipe:", "recipe -", "dinner:", "レシピ:"] {
        if lower.starts_with(p) {
            return h[p.len()..].trim();
        }
    }
    h
}

pub fn recipe(raw: &str) -> Option<Recipe> {
    let chunk = read_chunk(raw, None);
    chunk.sections_found.then_some(chunk.recipe)
}

fn day_heading(line: &str) -> Option<(u32, String)> {
    static DAY: OnceLock<Regex> = OnceLock::new();
    let re = DAY.get_or_init(|| {
        Regex::new(r"(?i)^(?:#{1,4}\s*|\*\*)\s*(?:day\s*(\d+)|(\d+)\s*日目)\s*[:：\-–—.]?\s*(.*?)\**\s*$")
            .expect("valid regex")
    });
    let c = re.captures(line.trim())?;
    let n = c.get(1).or_else(|| c.get(2))?.as_str().parse().ok()?;
    Some((n, c.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default()))
}

pub fn plan(raw: &str) -> Option<Vec<DraftDinner>> {
    let mut blocks: Vec<(u32, String, String)> = Vec::new();
    for line in raw.lines() {
        if let Some((day, title)) = day_heading(line) {
            blocks.push((day, title, String::new()));
        } else if let Some((_, _, body)) = blocks.last_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    if blocks.is_empty() {
        return None;
    }
    Some(
        blocks
            .into_iter()
            .map(|(day, title, body)| {
                let chunk = read_chunk(&body, Some(strip_name_prefix(&title)));
                DraftDinner {
                    day: Some(day),
                    date: None,
                    cuisine: chunk.inline.cuisine,
                    estimated_cost: chunk.inline.cost.unwrap_or(0),
                    recipe: chunk.recipe,
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_recipe_sections() {
        let raw = "## Chicken and Cabbage Stir-fry\nA weeknight staple.\n\n### Ingredients\n- 200g chicken thigh\n- 1/4 cabbage\n\n### Instructions\n1. Slice the chicken.\n2. Stir-fry everything.\n\nCook time: 20 min\nServings: 2\n";
        let r = recipe(raw).unwrap();
        assert_eq!(r.name, "Chicken and Cabbage Stir-fry");
        assert_eq!(r.description, "A weeknight staple.");
        assert_eq!(r.ingredients, vec!["200g chicken thigh", "1/4 cabbage"]);
        assert_eq!(r.instructions, vec!["Slice the chicken.", "Stir-fry everything."]);
        assert_eq!(r.cook_minutes, Some(20));
        assert_eq!(r.servings, Some(2));
    }

    #[test]
    fn japanese_labels() {
        let raw = "## 鶏の照り焼き丼\n### 材料\n- 鶏もも肉 200g\n### 作り方\n1. 鶏肉を切る\n調理時間: 30分\n";
        let r = recipe(raw).unwrap();
        assert_eq!(r.ingredients, vec!["鶏もも肉 200g"]);
        assert_eq!(r.instructions, vec!["鶏肉を切る"]);
        assert_eq!(r.cook_minutes, Some(30));
    }

    #[test]
    fn missing_sections_stay_missing() {
        let raw = "## Mystery dish\n### Instructions\n1. Cook it.\n";
        let r = recipe(raw).unwrap();
        assert!(r.ingredients.is_empty());
        assert_eq!(r.prep_minutes, None);
        assert_eq!(r.servings, None);
    }

    #[test]
    fn headings_without_labels_are_not_a_recipe() {
        assert!(recipe("# Thoughts\nSomething warm tonight.\n").is_none());
    }

    #[test]
    fn plan_split_on_day_headings() {
        let raw = "# Your plan\n## Day 1: Ginger pork\nCuisine: Japanese\nCost: 12\n### Ingredients\n- 200g pork\n### Steps\n1. Fry\n## Day 2 - Cabbage soup\n### Ingredients\n- 1 cabbage\n### Steps\n- Boil\n";
        let days = plan(raw).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day, Some(1));
        assert_eq!(days[0].recipe.name, "Ginger pork");
        assert_eq!(days[0].cuisine.as_deref(), Some("Japanese"));
        assert_eq!(days[0].estimated_cost, 12);
        assert_eq!(days[1].recipe.name, "Cabbage soup");
        assert_eq!(days[1].recipe.instructions, vec!["Boil"]);
    }

    #[test]
    fn durations() {
        assert_eq!(minutes("1 hour 15 minutes"), Some(75));
        assert_eq!(minutes("about 25"), None);
        assert_eq!(minutes("25"), Some(25));
        assert_eq!(minutes("45分"), Some(45));
        assert_eq!(minutes("99999999 hours"), None);
    }

    #[test]
    fn absurd_time_is_left_out() {
        let raw = "## Stew\n### Ingredients\n- 1 onion\n### Steps\n1. Simmer\nTime: 99999999 hours\n";
        let r = recipe(raw).unwrap();
        assert_eq!(r.ingredients, vec!["1 onion"]);
        assert_eq!(r.cook_minutes, None);
    }
}
