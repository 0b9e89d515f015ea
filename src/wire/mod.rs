use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::Recipe;

/// ========================================
/// JSON shapes the model is asked to return
/// ========================================
///
/// Field aliases cover the names models drift to in practice
/// (`main_dish`, `steps`, `detailed_recipe`, `dinners`, ...).

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireIngredient {
    Text(String),
    Structured {
        #[serde(alias = "item", alias = "ingredient")]
        name: String,
        #[serde(default, alias = "amount", alias = "qty", deserialize_with = "lenient_text")]
        quantity: Option<String>,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl WireIngredient {
    pub fn into_line(self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Structured { name, quantity, unit } => [quantity, unit, Some(name)]
                .into_iter()
                .flatten()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireStep {
    Text(String),
    Structured {
        #[serde(alias = "instruction", alias = "step", alias = "description")]
        text: String,
    },
}

impl WireStep {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) | Self::Structured { text: s } => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireDetails {
    #[serde(default, alias = "prep_minutes", deserialize_with = "lenient_u32")]
    pub prep_time: Option<u32>,
    #[serde(default, alias = "cook_minutes", deserialize_with = "lenient_u32")]
    pub cook_time: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub servings: Option<u32>,
    #[serde(default, alias = "steps", alias = "directions", alias = "method")]
    pub instructions: Vec<WireStep>,
    #[serde(default, alias = "ingredients_list")]
    pub ingredients: Vec<WireIngredient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireRecipe {
    #[serde(default, alias = "main_dish", alias = "title", alias = "recipe_name", alias = "dish")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<WireIngredient>,
    #[serde(default, alias = "steps", alias = "directions", alias = "method")]
    pub instructions: Vec<WireStep>,
    #[serde(default, alias = "prep_minutes", deserialize_with = "lenient_u32")]
    pub prep_time: Option<u32>,
    #[serde(default, alias = "cook_minutes", deserialize_with = "lenient_u32")]
    pub cook_time: Option<u32>,
    /// Total minutes, used when prep/cook are not split.
    #[serde(default, alias = "total_time", deserialize_with = "lenient_u32")]
    pub time: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub servings: Option<u32>,
    #[serde(default, alias = "cooking_difficulty", deserialize_with = "lenient_text")]
    pub difficulty: Option<String>,
    #[serde(default, alias = "nutrition_info", deserialize_with = "lenient_text")]
    pub nutrition: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
    #[serde(default)]
    pub detailed_recipe: Option<WireDetails>,
}

impl WireRecipe {
    pub fn into_recipe(self) -> Recipe {
        let details = self.detailed_recipe.unwrap_or_default();
        let mut ingredients: Vec<String> =
            self.ingredients.into_iter().map(WireIngredient::into_line).collect();
        if ingredients.is_empty() {
            ingredients = details.ingredients.into_iter().map(WireIngredient::into_line).collect();
        }
        let mut instructions: Vec<String> =
            self.instructions.into_iter().map(WireStep::into_text).collect();
        if instructions.is_empty() {
            instructions = details.instructions.into_iter().map(WireStep::into_text).collect();
        }
        let prep = self.prep_time.or(details.prep_time);
        let mut cook = self.cook_time.or(details.cook_time);
        if prep.is_none() && cook.is_none() {
            cook = self.time;
        }
        Recipe {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            ingredients: ingredients.into_iter().filter(|s| !s.is_empty()).collect(),
            instructions: instructions.into_iter().filter(|s| !s.is_empty()).collect(),
            prep_minutes: prep,
            cook_minutes: cook,
            servings: self.servings.or(details.servings).filter(|n| *n > 0),
            difficulty: self.difficulty,
            nutrition: self.nutrition,
            notes: self.notes,
        }
    }
}

/// Accepts `{"recipe": {...}}`, `{"recipes": [...]}` or a bare recipe object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireRecipeDoc {
    Wrapped { recipe: WireRecipe },
    List { recipes: Vec<WireRecipe> },
    Bare(WireRecipe),
}

impl WireRecipeDoc {
    pub fn into_recipe(self) -> Option<Recipe> {
        match self {
            Self::Wrapped { recipe } | Self::Bare(recipe) => Some(recipe.into_recipe()),
            Self::List { recipes } => recipes.into_iter().next().map(WireRecipe::into_recipe),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireDinner {
    #[serde(default, alias = "day_index", deserialize_with = "lenient_u32")]
    pub day: Option<u32>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, alias = "cuisine_category", alias = "cuisine_type", deserialize_with = "lenient_text")]
    pub cuisine: Option<String>,
    #[serde(default, alias = "cost", deserialize_with = "lenient_cost")]
    pub estimated_cost: Option<u32>,
    #[serde(default, alias = "dinner")]
    pub recipe: Option<WireRecipe>,
    #[serde(flatten)]
    pub inline: WireRecipe,
}

/// A dinner as the model described it; day numbering not yet checked.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftDinner {
    pub day: Option<u32>,
    pub date: Option<String>,
    pub cuisine: Option<String>,
    pub estimated_cost: u32,
    pub recipe: Recipe,
}

impl WireDinner {
    pub fn into_draft(self) -> DraftDinner {
        let recipe = match self.recipe {
            Some(r) => r,
            None => self.inline,
        };
        DraftDinner {
            day: self.day,
            date: self.date,
            cuisine: self.cuisine,
            estimated_cost: self.estimated_cost.unwrap_or(0),
            recipe: recipe.into_recipe(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WirePlanDoc {
    Object {
        #[serde(alias = "dinners", alias = "plan", alias = "meals")]
        days: Vec<WireDinner>,
    },
    Array(Vec<WireDinner>),
}

impl WirePlanDoc {
    pub fn into_drafts(self) -> Vec<DraftDinner> {
        let dinners = match self {
            Self::Object { days } | Self::Array(days) => days,
        };
        dinners.into_iter().map(WireDinner::into_draft).collect()
    }
}

fn leading_number(s: &str) -> Option<f64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let num: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    num.trim_end_matches('.').parse().ok()
}

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(s),
        _ => None,
    }
}

/// `15`, `15.0`, `"15 minutes"`; negatives and junk become `None`.
fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref()
        .and_then(value_to_f64)
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n.round() as u32))
}

fn lenient_cost<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    lenient_u32(d)
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(other) => Some(other.to_string()),
    })
}
