//! Typed records passed between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalProfile {
    pub name: Option<String>,
    pub age_range: Option<String>,
    pub activity_level: Option<String>,
    pub household: Option<String>,
    /// e.g. "weekday: 30 min"
    pub cooking_time: Option<String>,
    pub allergies: BTreeSet<String>,
    pub health_conditions: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpiceTolerance {
    Mild,
    Medium,
    Hot,
}

impl SpiceTolerance {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mild" | "low" | "none" => Some(Self::Mild),
            "medium" | "moderate" => Some(Self::Medium),
            "hot" | "high" | "spicy" => Some(Self::Hot),
            _ => None,
        }
    }
}

impl fmt::Display for SpiceTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mild => "mild",
            Self::Medium => "medium",
            Self::Hot => "hot",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodPreferences {
    pub loved: BTreeSet<String>,
    pub disliked: BTreeSet<String>,
    pub cuisines: BTreeSet<String>,
    /// Cuisine name to a 1-5 rating.
    pub cuisine_ratings: BTreeMap<String, u8>,
    pub spice_tolerance: Option<SpiceTolerance>,
    /// Food to a texture preference label.
    pub textures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthGoals {
    pub goals: Vec<String>,
    pub dietary_restrictions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookingSkills {
    pub level: Option<String>,
    pub equipment_available: Vec<String>,
    pub equipment_unavailable: Vec<String>,
    pub strong_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PantryItem {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "other".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recipe: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleItem {
    pub name: String,
    pub price: String,
    pub original_price: Option<String>,
    pub discount_rate: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

impl SaleItem {
    /// First number in the price text, `¥198` or `198円` alike.
    pub fn price_value(&self) -> Option<u32> {
        let start = self.price.find(|c: char| c.is_ascii_digit())?;
        self.price[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .ok()
    }
}

/// A supermarket's current specials, cached by whoever fetched the flyer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleInfo {
    pub store_name: String,
    pub date: String,
    pub url: String,
    pub fetched_at: Option<DateTime<Utc>>,
    pub items: Vec<SaleItem>,
}

/// Everything the store knows, loaded once per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalData {
    pub profile: PersonalProfile,
    pub preferences: FoodPreferences,
    pub health: HealthGoals,
    pub skills: CookingSkills,
    pub pantry: Vec<PantryItem>,
    pub history: Vec<HistoryEntry>,
    pub sales: SaleInfo,
}

impl PersonalData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Recipe {
    pub fn total_minutes(&self) -> Option<u32> {
        match (self.prep_minutes, self.cook_minutes) {
            (None, None) => None,
            (p, c) => p.unwrap_or(0).checked_add(c.unwrap_or(0)),
        }
    }

    /// Stable identifier used for feedback and saved files.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

pub fn slugify(s: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for c in s.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "recipe".into()
    } else {
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DinnerPlan {
    pub day: u32,
    pub date: Option<String>,
    pub cuisine: Option<String>,
    pub recipe: Recipe,
    pub estimated_cost: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Produce,
    Protein,
    Dairy,
    Condiments,
    Other,
}

impl Category {
    pub const ORDER: [Category; 5] =
        [Self::Produce, Self::Protein, Self::Dairy, Self::Condiments, Self::Other];

    pub fn label(self) -> &'static str {
        match self {
            Self::Produce => "Produce",
            Self::Protein => "Protein",
            Self::Dairy => "Dairy",
            Self::Condiments => "Condiments",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub category: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    /// Already in display order: grouped by category, sorted by name.
    pub items: Vec<ShoppingItem>,
}

impl ShoppingList {
    pub fn by_category(&self) -> Vec<(Category, Vec<&ShoppingItem>)> {
        Category::ORDER
            .iter()
            .map(|c| (*c, self.items.iter().filter(|i| i.category == *c).collect::<Vec<_>>()))
            .filter(|(_, items)| !items.is_empty())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ShoppingItem> {
        self.items.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPlan {
    pub dinners: Vec<DinnerPlan>,
    pub shopping_list: ShoppingList,
    pub total_estimated_cost: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub recipe_id: String,
    pub rating: u8,
    pub comment: String,
}

impl FeedbackEntry {
    pub fn new(recipe_id: impl Into<String>, rating: u8, comment: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            recipe_id: recipe_id.into(),
            rating,
            comment: comment.into(),
        }
    }
}
