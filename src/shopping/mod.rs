//! Derives a merged, pantry-aware shopping list from ingredient lines.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use crate::model::{Category, PantryItem, ShoppingItem, ShoppingList};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIngredient {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

/// Canonical unit for a spelled-out or plural unit word.
fn canonical_unit(word: &str) -> Option<&'static str> {
    let w = word.trim_end_matches('.').to_lowercase();
    let unit = match w.as_str() {
        "g" | "gram" | "grams" | "gr" => "g",
        "kg" | "kilogram" | "kilograms" => "kg",
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => "ml",
        "l" | "liter" | "liters" | "litre" | "litres" => "l",
        "tbsp" | "tablespoon" | "tablespoons" | "tbs" => "tbsp",
        "tsp" | "teaspoon" | "teaspoons" => "tsp",
        "cup" | "cups" => "cup",
        "oz" | "ounce" | "ounces" => "oz",
        "lb" | "lbs" | "pound" | "pounds" => "lb",
        "piece" | "pieces" | "pc" | "pcs" => "piece",
        "clove" | "cloves" => "clove",
        "slice" | "slices" => "slice",
        "can" | "cans" | "tin" | "tins" => "can",
        "pack" | "packs" | "package" | "packages" | "packet" | "packets" => "pack",
        "bunch" | "bunches" => "bunch",
        "pinch" | "pinches" => "pinch",
        "個" => "個",
        "本" => "本",
        "枚" => "枚",
        "パック" => "パック",
        _ => return None,
    };
    Some(unit)
}

fn parse_quantity(s: &str) -> Option<f64> {
    let mut total = 0.0;
    for part in s.split_whitespace() {
        total += match part.split_once('/') {
            Some((n, d)) => {
                let d: f64 = d.parse().ok()?;
                if d == 0.0 {
                    return None;
                }
                n.parse::<f64>().ok()? / d
            }
            None => part.parse::<f64>().ok()?,
        };
    }
    Some(total)
}

/// Lowercased, singular, without parentheses or trailing preparation notes.
pub fn normalize_name(raw: &str) -> String {
    static PARENS: OnceLock<Regex> = OnceLock::new();
    let parens = PARENS.get_or_init(|| Regex::new(r"[(（][^)）]*[)）]").expect("valid regex"));
    let lower = raw.to_lowercase();
    let stripped = parens.replace_all(&lower, " ");
    let head = stripped.split([',', '、']).next().unwrap_or_default().trim();
    let head = head.strip_prefix("of ").unwrap_or(head);
    let mut words: Vec<String> = head.split_whitespace().map(str::to_string).collect();
    if let Some(last) = words.last_mut() {
        *last = singularize(last);
    }
    words.join(" ")
}

/// Simple English plural stripping; good enough for grocery nouns.
pub fn singularize(word: &str) -> String {
    let w = word;
    if !w.is_ascii() || w.len() <= 3 {
        return w.to_string();
    }
    if let Some(stem) = w.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = w.strip_suffix("oes") {
        return format!("{stem}o");
    }
    for suffix in ["ches", "shes", "sses", "xes"] {
        if w.ends_with(suffix) {
            return w[..w.len() - 2].to_string();
        }
    }
    if w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") && !w.ends_with("is") {
        return w[..w.len() - 1].to_string();
    }
    w.to_string()
}

pub fn parse_ingredient(line: &str) -> ParsedIngredient {
    static LEADING: OnceLock<Regex> = OnceLock::new();
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let leading = LEADING.get_or_init(|| {
        Regex::new(r"^\s*(\d+\s+\d+/\d+|\d+/\d+|\d+(?:\.\d+)?)\s*(.*)$").expect("valid regex")
    });
    let trailing = TRAILING.get_or_init(|| {
        Regex::new(r"^(.+?)\s*(\d+(?:\.\d+)?)\s*(g|kg|ml|l|個|本|枚|パック)$").expect("valid regex")
    });

    let line = line.trim().trim_start_matches(['-', '*', '•']).trim();

    if let Some(c) = leading.captures(line) {
        let quantity = parse_quantity(&c[1]);
        let rest = c[2].trim();
        let (unit, name) = match rest.split_once(char::is_whitespace) {
            Some((first, tail)) => match canonical_unit(first) {
                Some(u) => (Some(u.to_string()), tail),
                None => (None, rest),
            },
            None => (None, rest),
        };
        return ParsedIngredient { name: normalize_name(name), quantity, unit };
    }
    if let Some(c) = trailing.captures(line) {
        return ParsedIngredient {
            name: normalize_name(&c[1]),
            quantity: parse_quantity(&c[2]),
            unit: canonical_unit(&c[3]).map(str::to_string),
        };
    }
    ParsedIngredient { name: normalize_name(line), quantity: None, unit: None }
}

const PHRASES: &[(&str, Category)] = &[
    ("bell pepper", Category::Produce),
    ("green onion", Category::Produce),
    ("spring onion", Category::Produce),
    ("black pepper", Category::Condiments),
    ("peanut butter", Category::Condiments),
    ("coconut milk", Category::Other),
    ("soy sauce", Category::Condiments),
];

const PRODUCE: &[&str] = &[
    "onion", "cabbage", "carrot", "tomato", "potato", "garlic", "ginger", "lettuce", "spinach",
    "mushroom", "leek", "scallion", "cucumber", "broccoli", "eggplant", "zucchini", "apple",
    "lemon", "lime", "basil", "cilantro", "parsley", "daikon", "celery", "sprout", "corn",
    "pumpkin", "avocado", "okra", "pepper", "herb", "kale", "radish", "shallot", "banana",
];
const PROTEIN: &[&str] = &[
    "chicken", "pork", "beef", "fish", "salmon", "tuna", "shrimp", "prawn", "tofu", "egg",
    "lamb", "turkey", "bacon", "sausage", "ham", "cod", "mackerel", "bean", "lentil",
    "chickpea", "tempeh", "thigh", "breast", "mince",
];
const DAIRY: &[&str] = &[
    "milk", "cheese", "butter", "cream", "yogurt", "yoghurt", "parmesan", "mozzarella",
];
const CONDIMENTS: &[&str] = &[
    "salt", "sauce", "miso", "vinegar", "oil", "sugar", "mirin", "sake", "ketchup", "mayonnaise",
    "mustard", "honey", "dashi", "stock", "broth", "paste", "spice", "cumin", "paprika",
    "powder", "seasoning", "flake",
];
const JA: &[(&str, Category)] = &[
    ("牛乳", Category::Dairy),
    ("チーズ", Category::Dairy),
    ("バター", Category::Dairy),
    ("醤油", Category::Condiments),
    ("味噌", Category::Condiments),
    ("塩", Category::Condiments),
    ("砂糖", Category::Condiments),
    ("酢", Category::Condiments),
    ("みりん", Category::Condiments),
    ("油", Category::Condiments),
    ("肉", Category::Protein),
    ("鶏", Category::Protein),
    ("豚", Category::Protein),
    ("牛", Category::Protein),
    ("魚", Category::Protein),
    ("卵", Category::Protein),
    ("豆腐", Category::Protein),
    ("キャベツ", Category::Produce),
    ("玉ねぎ", Category::Produce),
    ("にんじん", Category::Produce),
    ("ねぎ", Category::Produce),
    ("野菜", Category::Produce),
];

fn word_category(word: &str) -> Option<Category> {
    [
        (PROTEIN, Category::Protein),
        (DAIRY, Category::Dairy),
        (CONDIMENTS, Category::Condiments),
        (PRODUCE, Category::Produce),
    ]
    .into_iter()
    .find(|(words, _)| words.contains(&word))
    .map(|(_, c)| c)
}

/// Keyword categorization; the head noun (last word) decides first.
pub fn categorize(name: &str) -> Category {
    if let Some((_, c)) = PHRASES.iter().find(|(p, _)| name.contains(p)) {
        return *c;
    }
    if !name.is_ascii() {
        if let Some((_, c)) = JA.iter().find(|(k, _)| name.contains(k)) {
            return *c;
        }
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    words
        .last()
        .and_then(|w| word_category(w))
        .or_else(|| words.iter().rev().find_map(|w| word_category(w)))
        .unwrap_or(Category::Other)
}

pub fn build_shopping_list<'a, I>(ingredients: I, pantry: &[PantryItem]) -> ShoppingList
where
    I: IntoIterator<Item = &'a str>,
{
    let staples: HashSet<String> = pantry.iter().map(|p| normalize_name(&p.name)).collect();
    let mut merged: BTreeMap<(String, Option<String>), Option<f64>> = BTreeMap::new();

    for line in ingredients {
        let parsed = parse_ingredient(line);
        if parsed.name.is_empty() || staples.contains(&parsed.name) {
            continue;
        }
        let qty = parsed.quantity.filter(|q| *q >= 0.0);
        let slot = merged.entry((parsed.name, parsed.unit)).or_insert(None);
        if let Some(q) = qty {
            *slot = Some(slot.unwrap_or(0.0) + q);
        }
    }

    let mut items: Vec<ShoppingItem> = merged
        .into_iter()
        .map(|((name, unit), quantity)| ShoppingItem {
            category: categorize(&name),
            name,
            quantity,
            unit,
        })
        .collect();
    items.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    ShoppingList { items }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pantry(names: &[&str]) -> Vec<PantryItem> {
        names.iter().map(|n| PantryItem { name: n.to_string(), category: "other".into() }).collect()
    }

    #[test]
    fn onions_merge_and_pantry_salt_is_excluded() {
        let list = build_shopping_list(["1 onion", "2 onions", "salt"], &pantry(&["salt"]));
        assert_eq!(list.items.len(), 1);
        let onion = list.get("onion").unwrap();
        assert_eq!(onion.quantity, Some(3.0));
        assert_eq!(onion.unit, None);
        assert!(list.get("salt").is_none());
    }

    #[test]
    fn quantities_and_units() {
        let p = parse_ingredient("1 1/2 cups rice");
        assert_eq!(p.quantity, Some(1.5));
        assert_eq!(p.unit.as_deref(), Some("cup"));
        assert_eq!(p.name, "rice");

        let p = parse_ingredient("200 g chicken thighs (boneless), cut into strips");
        assert_eq!(p.quantity, Some(200.0));
        assert_eq!(p.unit.as_deref(), Some("g"));
        assert_eq!(p.name, "chicken thigh");

        let p = parse_ingredient("1/4 cabbage");
        assert_eq!(p.quantity, Some(0.25));
        assert_eq!(p.name, "cabbage");

        let p = parse_ingredient("鶏もも肉 200g");
        assert_eq!(p.quantity, Some(200.0));
        assert_eq!(p.unit.as_deref(), Some("g"));
        assert_eq!(p.name, "鶏もも肉");
    }

    #[test]
    fn units_keep_entries_apart() {
        let list = build_shopping_list(["2 tbsp soy sauce", "1 tbsp soy sauce", "100 ml soy sauce"], &[]);
        assert_eq!(list.items.len(), 2);
        let tbsp = list.items.iter().find(|i| i.unit.as_deref() == Some("tbsp")).unwrap();
        assert_eq!(tbsp.quantity, Some(3.0));
    }

    #[test]
    fn unquantified_items_merge_without_quantity() {
        let list = build_shopping_list(["Fresh basil", "fresh basil"], &[]);
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].quantity, None);
    }

    #[test]
    fn grouped_in_category_order() {
        let list = build_shopping_list(
            ["1 tbsp miso", "100 ml milk", "200 g pork", "1 carrot", "1 pack noodles"],
            &[],
        );
        let cats: Vec<Category> = list.items.iter().map(|i| i.category).collect();
        assert_eq!(
            cats,
            vec![Category::Produce, Category::Protein, Category::Dairy, Category::Condiments, Category::Other]
        );
    }

    #[test]
    fn head_noun_wins() {
        assert_eq!(categorize("chicken stock"), Category::Condiments);
        assert_eq!(categorize("tomato"), Category::Produce);
        assert_eq!(categorize("bell pepper"), Category::Produce);
        assert_eq!(categorize("black pepper"), Category::Condiments);
        assert_eq!(categorize("キャベツ"), Category::Produce);
    }

    #[test]
    fn plurals() {
        assert_eq!(singularize("tomatoes"), "tomato");
        assert_eq!(singularize("berries"), "berry");
        assert_eq!(singularize("peanuts"), "peanut");
        assert_eq!(singularize("asparagus"), "asparagus");
        assert_eq!(singularize("radishes"), "radish");
    }
}
