//! Assembles the bounded personal context block injected into prompts.

use serde::Serialize;
use tracing::debug;

use crate::model::{Category, PersonalData, SaleItem};
use crate::plan::mentions;
use crate::shopping::categorize;

pub const SALE_SECTION: &str = "On sale this week";
const MAX_SALE_ITEMS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    RecipeGeneration,
    ShoppingList,
}

/// Lower sorts first; the budget drops sections from the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Critical,
    Strong,
    Environment,
    Soft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub priority: Priority,
    pub title: &'static str,
    pub lines: Vec<String>,
}

impl Section {
    fn new(priority: Priority, title: &'static str) -> Self {
        Self { priority, title, lines: Vec::new() }
    }

    fn push_list<'a, I>(&mut self, label: &str, items: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let joined = items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        if !joined.is_empty() {
            self.lines.push(format!("{label}: {joined}"));
        }
    }

    fn push_opt(&mut self, label: &str, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.lines.push(format!("{label}: {v}"));
        }
    }

    fn heading(&self) -> String {
        format!("## {}", self.title)
    }

    fn render(&self) -> String {
        let mut s = self.heading();
        for l in &self.lines {
            s.push_str("\n- ");
            s.push_str(l);
        }
        s
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBlock {
    pub text: String,
    /// Allergies and disliked foods: always handed to the prompt and validation,
    /// even when the budget cut them from `text`.
    pub must_avoid: Vec<String>,
    pub included: Vec<&'static str>,
    pub truncated: bool,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_sales(&self) -> bool {
        self.included.contains(&SALE_SECTION)
    }
}

pub fn must_avoid(data: &PersonalData) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in data.profile.allergies.iter().chain(data.preferences.disliked.iter()) {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
            out.push(item.to_string());
        }
    }
    out
}

fn favoured_categories(data: &PersonalData) -> Vec<Category> {
    let mut out = Vec::new();
    for (cuisine, _) in data.preferences.cuisine_ratings.iter().filter(|(_, r)| **r >= 4) {
        let c = cuisine.to_lowercase();
        let cats: &[Category] = if c.contains("和食") || c.contains("japanese") {
            &[Category::Protein, Category::Produce, Category::Condiments]
        } else if c.contains("中華") || c.contains("chinese") {
            &[Category::Protein, Category::Produce]
        } else if c.contains("洋食") || c.contains("イタリアン") || c.contains("italian") || c.contains("western") {
            &[Category::Protein, Category::Dairy]
        } else {
            &[]
        };
        for cat in cats {
            if !out.contains(cat) {
                out.push(*cat);
            }
        }
    }
    out
}

/// Sale items worth suggesting, best first: nothing on the must-avoid
/// list, staples and cheap items ahead, favoured cuisines' staples nudged up.
pub fn recommended_sales(data: &PersonalData) -> Vec<&SaleItem> {
    let avoid = must_avoid(data);
    let favoured = favoured_categories(data);
    let mut items: Vec<(u32, &SaleItem)> = data
        .sales
        .items
        .iter()
        .filter(|item| !item.name.trim().is_empty())
        .filter(|item| !avoid.iter().any(|a| mentions(&item.name, a)))
        .map(|item| {
            let category = categorize(&item.name.to_lowercase());
            let mut score = 0;
            if matches!(category, Category::Protein | Category::Produce) {
                score += 10;
            }
            if favoured.contains(&category) {
                score += 2;
            }
            score += match item.price_value() {
                Some(p) if p < 200 => 5,
                Some(p) if p < 500 => 3,
                _ => 0,
            };
            (score, item)
        })
        .collect();
    items.sort_by(|a, b| b.0.cmp(&a.0));
    items.into_iter().take(MAX_SALE_ITEMS).map(|(_, item)| item).collect()
}

fn sale_line(item: &SaleItem) -> String {
    let mut line = item.name.trim().to_string();
    if !item.price.trim().is_empty() {
        line.push(' ');
        line.push_str(item.price.trim());
    }
    let was = item.original_price.as_deref().map(|p| format!("was {}", p.trim()));
    let off = item.discount_rate.as_deref().map(|d| format!("{} off", d.trim()));
    let extra: Vec<String> = was.into_iter().chain(off).collect();
    if !extra.is_empty() {
        line.push_str(&format!(" ({})", extra.join(", ")));
    }
    line
}

/// All non-empty sections for `use_case`, sorted by priority.
pub fn collect_sections(data: &PersonalData, use_case: UseCase) -> Vec<Section> {
    let mut hard = Section::new(Priority::Critical, "Hard constraints (never violate)");
    hard.push_list("Allergies", &data.profile.allergies);
    hard.push_list("Health conditions", &data.profile.health_conditions);
    hard.push_list("Dietary restrictions", &data.health.dietary_restrictions);
    hard.push_list("Disliked foods", &data.preferences.disliked);

    let mut strong = Section::new(Priority::Strong, "Strong preferences");
    let mut liked: Vec<_> = data.history.iter().filter(|h| h.rating >= 4).collect();
    liked.sort_by(|a, b| b.rating.cmp(&a.rating));
    let liked: Vec<String> = liked.iter().map(|h| format!("{} ({}/5)", h.recipe, h.rating)).collect();
    strong.push_list("Highly rated past dinners", &liked);
    strong.push_list("Loved foods", &data.preferences.loved);
    let mut rated: Vec<_> = data.preferences.cuisine_ratings.iter().filter(|(_, r)| **r >= 4).collect();
    rated.sort_by(|a, b| b.1.cmp(a.1));
    let mut cuisines: Vec<String> = rated.iter().map(|(c, _)| c.to_string()).collect();
    for c in &data.preferences.cuisines {
        if !cuisines.contains(c) {
            cuisines.push(c.clone());
        }
    }
    strong.push_list("Favourite cuisines", &cuisines);

    let mut env = Section::new(Priority::Environment, "Kitchen and skills");
    env.push_opt("Skill level", data.skills.level.as_deref());
    env.push_opt("Cooking time", data.profile.cooking_time.as_deref());
    env.push_list("Equipment available", &data.skills.equipment_available);
    env.push_list("Equipment NOT available", &data.skills.equipment_unavailable);
    env.push_list("Good at", &data.skills.strong_areas);

    let mut soft = Section::new(Priority::Soft, "Other preferences");
    let spice = data.preferences.spice_tolerance.map(|s| s.to_string());
    soft.push_opt("Spice tolerance", spice.as_deref());
    let textures: Vec<String> =
        data.preferences.textures.iter().map(|(f, t)| format!("{f} ({t})")).collect();
    soft.push_list("Textures", &textures);
    soft.push_list("Health goals", &data.health.goals);
    let disliked_history: Vec<String> = data
        .history
        .iter()
        .filter(|h| h.rating <= 2)
        .map(|h| format!("{} ({}/5)", h.recipe, h.rating))
        .collect();
    soft.push_list("Poorly rated past dinners", &disliked_history);
    soft.push_opt("Age", data.profile.age_range.as_deref());
    soft.push_opt("Activity level", data.profile.activity_level.as_deref());
    soft.push_opt("Household", data.profile.household.as_deref());

    let pantry_priority = match use_case {
        UseCase::ShoppingList => Priority::Strong,
        UseCase::RecipeGeneration => Priority::Soft,
    };
    let mut pantry = Section::new(pantry_priority, "Pantry staples on hand");
    let names: Vec<String> = data.pantry.iter().map(|p| p.name.clone()).collect();
    pantry.push_list("Items", &names);

    let sale_priority = match use_case {
        UseCase::ShoppingList => Priority::Strong,
        UseCase::RecipeGeneration => Priority::Environment,
    };
    let mut sales = Section::new(sale_priority, SALE_SECTION);
    sales.push_opt("Store", Some(data.sales.store_name.as_str()));
    sales.push_opt("Valid", Some(data.sales.date.as_str()));
    let items: Vec<String> = recommended_sales(data).into_iter().map(sale_line).collect();
    if items.is_empty() {
        sales.lines.clear();
    } else {
        sales.push_list("Items", &items);
    }

    let mut sections: Vec<Section> =
        [hard, strong, env, soft, pantry, sales].into_iter().filter(|s| !s.lines.is_empty()).collect();
    sections.sort_by_key(|s| s.priority);
    sections
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Never longer than `max_len` characters; empty when the store is empty.
pub fn build_context(data: &PersonalData, use_case: UseCase, max_len: usize) -> ContextBlock {
    let sections = collect_sections(data, use_case);
    let mut block = ContextBlock { must_avoid: must_avoid(data), ..Default::default() };
    let mut used = 0usize;

    for section in &sections {
        let sep = if block.text.is_empty() { 0 } else { 2 };
        let full = section.render();
        if used + sep + char_len(&full) <= max_len {
            if sep > 0 {
                block.text.push_str("\n\n");
            }
            block.text.push_str(&full);
            used += sep + char_len(&full);
            block.included.push(section.title);
            continue;
        }

        block.truncated = true;
        let mut partial = section.heading();
        let mut fitted = 0;
        for line in &section.lines {
            let candidate = format!("{partial}\n- {line}");
            if used + sep + char_len(&candidate) > max_len {
                break;
            }
            partial = candidate;
            fitted += 1;
        }
        if fitted > 0 {
            if sep > 0 {
                block.text.push_str("\n\n");
            }
            block.text.push_str(&partial);
            block.included.push(section.title);
        } else if block.text.is_empty() {
            block.text = full.chars().take(max_len).collect();
            block.included.push(section.title);
        }
        break;
    }

    debug!(
        chars = char_len(&block.text),
        budget = max_len,
        sections = block.included.len(),
        truncated = block.truncated,
        "built personal context"
    );
    block
}
