//! Personal data directory: one file per concern, JSON or line-oriented text.
//!
//! Reads never fail: a missing or broken file reads as an empty record.
//! Writes go through a per-file lock and an atomic temp-file rename.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::model::{
    CookingSkills, FoodPreferences, HealthGoals, HistoryEntry, PantryItem, PersonalData,
    PersonalProfile, Recipe, SaleInfo, SaleItem, SpiceTolerance,
};

mod kv;

pub use kv::KvDoc;

pub const PROFILE: &str = "profile";
pub const PREFERENCES: &str = "preferences";
pub const HEALTH_GOALS: &str = "health_goals";
pub const COOKING_SKILLS: &str = "cooking_skills";
pub const PANTRY: &str = "pantry";
pub const HISTORY: &str = "history";
pub const SALES: &str = "sales";

const SALE_STORE_KEYS: [&str; 3] = ["store", "store_name", "店舗"];
const SALE_DATE_KEYS: [&str; 2] = ["date", "日付"];

/// One mutex per file path, shared by everything that writes under a root.
#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    inner: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl FileLocks {
    pub fn for_path(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock();
        map.entry(path.to_path_buf()).or_default().clone()
    }
}

#[derive(Debug, Clone)]
pub struct PersonalStore {
    root: PathBuf,
    locks: FileLocks,
}

impl PersonalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), locks: FileLocks::default() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locks(&self) -> &FileLocks {
        &self.locks
    }

    /// Snapshot of every concern.
    pub fn load(&self) -> PersonalData {
        let data = PersonalData {
            profile: self.profile(),
            preferences: self.preferences(),
            health: self.health_goals(),
            skills: self.cooking_skills(),
            pantry: self.pantry(),
            history: self.history(),
            sales: self.sales(),
        };
        debug!(
            root = %self.root.display(),
            allergies = data.profile.allergies.len(),
            pantry = data.pantry.len(),
            history = data.history.len(),
            sale_items = data.sales.items.len(),
            "loaded personal data"
        );
        data
    }

    pub fn profile(&self) -> PersonalProfile {
        self.load_concern(PROFILE, |doc| {
            let mut p = PersonalProfile {
                name: doc.first(&["name", "名前"]),
                age_range: doc.first(&["age_range", "age", "年齢"]),
                activity_level: doc.first(&["activity_level", "activity", "活動量"]),
                household: doc.first(&["household", "family", "家族構成"]),
                cooking_time: doc.first(&["cooking_time", "食事準備可能時間"]),
                ..Default::default()
            };
            p.allergies = doc.list(&["allergies", "allergy", "アレルギー"]).into_iter().collect();
            p.health_conditions =
                doc.list(&["health_conditions", "conditions", "持病"]).into_iter().collect();
            p
        })
    }

    pub fn preferences(&self) -> FoodPreferences {
        self.load_concern(PREFERENCES, |doc| {
            let mut p = FoodPreferences {
                loved: doc.list(&["loved", "liked", "love", "大好きな食べ物"]).into_iter().collect(),
                disliked: doc
                    .list(&["disliked", "dislikes", "dislike", "苦手・嫌いな食べ物"])
                    .into_iter()
                    .collect(),
                cuisines: doc.list(&["cuisines", "preferred_cuisines"]).into_iter().collect(),
                spice_tolerance: doc
                    .first(&["spice_tolerance", "spice", "辛さ"])
                    .and_then(|s| SpiceTolerance::parse(&s)),
                ..Default::default()
            };
            for (name, value) in doc.pairs(&["cuisine_ratings", "料理の種類別好み"]) {
                if let Some(rating) = kv::parse_rating(&value) {
                    p.cuisine_ratings.insert(name, rating);
                }
            }
            p.textures = doc.pairs(&["textures", "texture"]).into_iter().collect();
            p
        })
    }

    pub fn health_goals(&self) -> HealthGoals {
        self.load_concern(HEALTH_GOALS, |doc| {
            let mut goals = doc.list(&["goals", "health_goals", "健康目標"]);
            goals.extend(doc.list(&[""]));
            HealthGoals {
                goals,
                dietary_restrictions: doc.list(&["dietary_restrictions", "restrictions", "食事制約"]),
            }
        })
    }

    pub fn cooking_skills(&self) -> CookingSkills {
        self.load_concern(COOKING_SKILLS, |doc| CookingSkills {
            level: doc.first(&["level", "skill_level", "全体的なレベル"]),
            equipment_available: doc.list(&["equipment_available", "available", "equipment"]),
            equipment_unavailable: doc.list(&["equipment_unavailable", "unavailable", "not_available"]),
            strong_areas: doc.list(&["strong_areas", "strengths"]),
        })
    }

    pub fn pantry(&self) -> Vec<PantryItem> {
        self.load_concern(PANTRY, |doc| {
            doc.lines()
                .into_iter()
                .map(|line| match line.split_once(':') {
                    Some((name, cat)) if !cat.trim().is_empty() => PantryItem {
                        name: name.trim().to_string(),
                        category: cat.trim().to_lowercase(),
                    },
                    _ => PantryItem {
                        name: line.trim_end_matches(':').trim().to_string(),
                        category: "other".into(),
                    },
                })
                .filter(|p| !p.name.is_empty())
                .collect()
        })
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.load_concern(HISTORY, |doc| {
            doc.lines()
                .into_iter()
                .filter_map(|line| {
                    let (recipe, rest) = line.rsplit_once(':')?;
                    let rating = kv::parse_rating(rest)?;
                    Some(HistoryEntry { recipe: recipe.trim().to_string(), rating, date: None })
                })
                .collect()
        })
    }

    /// Text form: `store:` and `date:` lines, then one `item: price` per line.
    pub fn sales(&self) -> SaleInfo {
        self.load_concern(SALES, |doc| {
            let is_meta = |line: &str| {
                line.split_once([':', '：']).is_some_and(|(k, _)| {
                    let k = k.trim().to_lowercase();
                    SALE_STORE_KEYS.iter().chain(SALE_DATE_KEYS.iter()).any(|m| *m == k)
                })
            };
            let items = doc
                .lines()
                .into_iter()
                .filter(|line| !is_meta(line))
                .map(|line| match line.split_once([':', '：']) {
                    Some((name, price)) => SaleItem {
                        name: name.trim().to_string(),
                        price: price.trim().to_string(),
                        ..Default::default()
                    },
                    None => SaleItem { name: line.trim().to_string(), ..Default::default() },
                })
                .filter(|item| !item.name.is_empty())
                .collect();
            SaleInfo {
                store_name: doc.first(&SALE_STORE_KEYS).unwrap_or_default(),
                date: doc.first(&SALE_DATE_KEYS).unwrap_or_default(),
                items,
                ..Default::default()
            }
        })
    }

    pub fn save_sales(&self, sales: &SaleInfo) -> Result<(), StoreError> {
        self.write_json(&self.json_path(SALES), sales)
    }

    pub fn save_profile(&self, profile: &PersonalProfile) -> Result<(), StoreError> {
        self.write_json(&self.json_path(PROFILE), profile)
    }

    pub fn save_preferences(&self, prefs: &FoodPreferences) -> Result<(), StoreError> {
        self.write_json(&self.json_path(PREFERENCES), prefs)
    }

    /// Read-modify-write of the preferences file under its lock.
    pub fn update_preferences<F>(&self, edit: F) -> Result<FoodPreferences, StoreError>
    where
        F: FnOnce(&mut FoodPreferences),
    {
        let path = self.json_path(PREFERENCES);
        let lock = self.locks.for_path(&path);
        let _guard = lock.lock();
        check_existing::<FoodPreferences>(&path)?;
        let mut prefs = self.preferences();
        edit(&mut prefs);
        write_atomic(&path, &prefs)?;
        Ok(prefs)
    }

    pub fn love(&self, foods: &[String]) -> Result<FoodPreferences, StoreError> {
        self.update_preferences(|p| {
            for f in foods.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
                p.disliked.remove(f);
                p.loved.insert(f.to_string());
            }
        })
    }

    pub fn dislike(&self, foods: &[String]) -> Result<FoodPreferences, StoreError> {
        self.update_preferences(|p| {
            for f in foods.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
                p.loved.remove(f);
                p.disliked.insert(f.to_string());
            }
        })
    }

    pub fn add_pantry_item(&self, item: PantryItem) -> Result<Vec<PantryItem>, StoreError> {
        let path = self.json_path(PANTRY);
        let lock = self.locks.for_path(&path);
        let _guard = lock.lock();
        check_existing::<Vec<PantryItem>>(&path)?;
        let mut items = self.pantry();
        if let Some(existing) =
            items.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&item.name))
        {
            existing.category = item.category;
        } else {
            items.push(item);
        }
        write_atomic(&path, &items)?;
        Ok(items)
    }

    /// Recipes are only kept when the user asks for it.
    pub fn save_recipe(&self, recipe: &Recipe) -> Result<PathBuf, StoreError> {
        let path = self.root.join("recipes").join(format!("{}.json", recipe.slug()));
        self.write_json(&path, recipe)?;
        Ok(path)
    }

    fn json_path(&self, concern: &str) -> PathBuf {
        self.root.join(format!("{concern}.json"))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let lock = self.locks.for_path(path);
        let _guard = lock.lock();
        write_atomic(path, value)
    }

    fn load_concern<T, F>(&self, concern: &str, from_text: F) -> T
    where
        T: DeserializeOwned + Default,
        F: FnOnce(&KvDoc) -> T,
    {
        let json = self.json_path(concern);
        if let Some(s) = read_optional(&json) {
            return match serde_json::from_str(&s) {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %json.display(), error = %e, "ignoring malformed personal data file");
                    T::default()
                }
            };
        }
        let txt = self.root.join(format!("{concern}.txt"));
        match read_optional(&txt) {
            Some(s) => from_text(&KvDoc::parse(&s)),
            None => T::default(),
        }
    }
}

fn read_optional(path: &Path) -> Option<String> {
    match fs_err::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!(error = %e, "treating unreadable personal data file as empty");
            None
        }
    }
}

/// An edit must not replace a JSON file it could not read.
fn check_existing<T: DeserializeOwned>(path: &Path) -> Result<(), StoreError> {
    let body = match fs_err::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(StoreError::Read { path: path.to_path_buf(), source }),
    };
    serde_json::from_str::<T>(&body)
        .map(drop)
        .map_err(|source| StoreError::Malformed { path: path.to_path_buf(), source })
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let werr = |source| StoreError::Write { path: path.to_path_buf(), source };
    fs_err::create_dir_all(dir).map_err(werr)?;
    let body = serde_json::to_string_pretty(value)
        .map_err(|source| StoreError::Encode { path: path.to_path_buf(), source })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(werr)?;
    tmp.write_all(body.as_bytes()).map_err(werr)?;
    tmp.persist(path).map_err(|e| werr(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PersonalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PersonalStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn empty_directory_loads_empty_data() {
        let (_dir, store) = store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn text_profile_is_parsed() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join("profile.txt"),
            "# me\nname: Aiko\nage: 30s\nallergies: peanuts, shrimp\nhealth_conditions:\n- high blood pressure\n",
        )
        .unwrap();
        let p = store.profile();
        assert_eq!(p.name.as_deref(), Some("Aiko"));
        assert_eq!(p.age_range.as_deref(), Some("30s"));
        assert!(p.allergies.contains("peanuts"));
        assert!(p.allergies.contains("shrimp"));
        assert!(p.health_conditions.contains("high blood pressure"));
    }

    #[test]
    fn json_takes_precedence_over_text() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("preferences.txt"), "loved: natto\n").unwrap();
        std::fs::write(dir.path().join("preferences.json"), r#"{"loved":["miso"]}"#).unwrap();
        let p = store.preferences();
        assert!(p.loved.contains("miso"));
        assert!(!p.loved.contains("natto"));
    }

    #[test]
    fn malformed_json_reads_as_empty() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("cooking_skills.json"), "{ not json").unwrap();
        assert_eq!(store.cooking_skills(), CookingSkills::default());
    }

    #[test]
    fn edits_leave_malformed_json_alone() {
        let (dir, store) = store();
        let prefs = dir.path().join("preferences.json");
        let pantry = dir.path().join("pantry.json");
        std::fs::write(&prefs, "{ \"loved\": [\"miso\"").unwrap();
        std::fs::write(&pantry, "[ oops").unwrap();

        let err = store.love(&["tofu".into()]).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }), "{err:?}");
        let err = store
            .add_pantry_item(PantryItem { name: "rice".into(), category: "grains".into() })
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }), "{err:?}");

        assert_eq!(std::fs::read_to_string(&prefs).unwrap(), "{ \"loved\": [\"miso\"");
        assert_eq!(std::fs::read_to_string(&pantry).unwrap(), "[ oops");
    }

    #[test]
    fn sale_text_lists_items_and_prices() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join("sales.txt"),
            "store: Maruetsu\ndate: 2026-10-17\n- 鶏もも肉: 198円\n- キャベツ: ¥98\nbananas\n",
        )
        .unwrap();
        let sales = store.sales();
        assert_eq!(sales.store_name, "Maruetsu");
        assert_eq!(sales.date, "2026-10-17");
        let names: Vec<&str> = sales.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["鶏もも肉", "キャベツ", "bananas"]);
        assert_eq!(sales.items[0].price_value(), Some(198));
        assert_eq!(sales.items[2].price_value(), None);
    }

    #[test]
    fn saved_sales_round_trip() {
        let (_dir, store) = store();
        let sales = SaleInfo {
            store_name: "Aeon".into(),
            items: vec![SaleItem { name: "salmon".into(), price: "¥298".into(), ..Default::default() }],
            ..Default::default()
        };
        store.save_sales(&sales).unwrap();
        assert_eq!(store.sales(), sales);
    }

    #[test]
    fn pantry_and_history_text_lines() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("pantry.txt"), "salt\n- soy sauce: condiments\n").unwrap();
        std::fs::write(dir.path().join("history.txt"), "Ginger pork: 5\nbad line\nCurry: ★★★\n").unwrap();
        let pantry = store.pantry();
        assert_eq!(pantry.len(), 2);
        assert_eq!(pantry[1].category, "condiments");
        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].rating, 5);
        assert_eq!(history[1].rating, 3);
    }

    #[test]
    fn preference_edits_move_between_sets() {
        let (_dir, store) = store();
        store.dislike(&["celery".into()]).unwrap();
        let p = store.love(&["celery".into(), "tofu".into()]).unwrap();
        assert!(p.loved.contains("celery"));
        assert!(!p.disliked.contains("celery"));
        assert_eq!(store.preferences(), p);
    }

    #[test]
    fn pantry_add_replaces_category() {
        let (_dir, store) = store();
        store.add_pantry_item(PantryItem { name: "Rice".into(), category: "other".into() }).unwrap();
        let items = store
            .add_pantry_item(PantryItem { name: "rice".into(), category: "grains".into() })
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "grains");
    }

    #[test]
    fn concurrent_edits_are_not_lost() {
        let (_dir, store) = store();
        std::thread::scope(|s| {
            for i in 0..8 {
                let store = store.clone();
                s.spawn(move || store.love(&[format!("food{i}")]).unwrap());
            }
        });
        assert_eq!(store.preferences().loved.len(), 8);
    }
}
