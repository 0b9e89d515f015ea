use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::errors::{FlaviaError, ProviderError};
use crate::model::{PantryItem, Recipe, ShoppingItem, ShoppingList, WeeklyPlan};

/// Spinner shown while waiting on the model; a no-op when progress is off.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    #[must_use]
    pub fn start(enabled: bool, message: &str) -> Self {
        if !enabled {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        Self { bar: Some(bar) }
    }

    pub fn finish_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.finish_clear();
    }
}

fn minutes(label: &str, m: Option<u32>) -> Option<String> {
    m.map(|m| format!("{label} {m} min"))
}

pub fn show_recipe(r: &Recipe) {
    println!("\n{}", r.name.bold().green());
    if !r.description.is_empty() {
        println!("{}", r.description.italic());
    }
    let meta: Vec<String> = [
        minutes("prep", r.prep_minutes),
        minutes("cook", r.cook_minutes),
        r.servings.map(|s| format!("serves {s}")),
        r.difficulty.clone(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !meta.is_empty() {
        println!("{}", meta.join("  ·  ").dimmed());
    }

    println!("\n{}", "Ingredients".bold());
    for i in &r.ingredients {
        println!("  - {i}");
    }
    println!("\n{}", "Instructions".bold());
    for (n, step) in r.instructions.iter().enumerate() {
        println!("  {}. {step}", n + 1);
    }
    if let Some(n) = &r.nutrition {
        println!("\n{} {n}", "Nutrition:".bold());
    }
    if let Some(n) = &r.notes {
        println!("{} {n}", "Notes:".bold());
    }
    println!("{} {}", "id:".dimmed(), r.slug().dimmed());
}

pub fn show_plan(plan: &WeeklyPlan) {
    println!("\n=== PLAN ({} dinners) ===", plan.dinners.len());
    for d in &plan.dinners {
        let mut head = format!("Day {}", d.day);
        if let Some(date) = &d.date {
            head.push_str(&format!(" ({date})"));
        }
        let cuisine = d.cuisine.as_deref().map(|c| format!("[{c}]")).unwrap_or_default();
        println!("\n{} {}  {}", head.cyan().bold(), cuisine.yellow(), format!("~{}", d.estimated_cost).dimmed());
        show_recipe(&d.recipe);
    }
    show_shopping_list(&plan.shopping_list);
    println!("\n{} {}", "Estimated total:".bold(), plan.total_estimated_cost);
}

pub fn fmt_item(item: &ShoppingItem) -> String {
    let qty = item.quantity.map(|q| {
        if (q.fract()).abs() < 1e-9 {
            format!("{}", q as i64)
        } else {
            format!("{:.2}", q).trim_end_matches('0').to_string()
        }
    });
    [qty, item.unit.clone(), Some(item.name.clone())]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn show_shopping_list(list: &ShoppingList) {
    println!("\n{}", "=== SHOPPING LIST ===".bold());
    if list.items.is_empty() {
        println!("(nothing to buy)");
        return;
    }
    for (cat, items) in list.by_category() {
        println!("{}", cat.label().magenta().bold());
        for i in items {
            println!("  [ ] {}", fmt_item(i));
        }
    }
}

pub fn show_pantry(items: &[PantryItem]) {
    if items.is_empty() {
        println!("(pantry is empty)");
        return;
    }
    for p in items {
        println!("{}  {}", p.name.bold(), p.category.dimmed());
    }
}

fn provider_detail(e: &ProviderError) -> String {
    let mut s = format!("{} ({})", e.kind, e.provider);
    if let Some(status) = e.status {
        s.push_str(&format!(", HTTP {status}"));
    }
    if e.attempts > 0 {
        s.push_str(&format!(", after {} attempt(s)", e.attempts));
    }
    s
}

/// One message naming the failed stage; raw model text is shown for
/// parse and validation failures.
pub fn show_error(err: &FlaviaError) {
    eprintln!("{} {}", format!("[{}]", err.stage()).red().bold(), err);
    match err {
        FlaviaError::Provider(e) => eprintln!("  {}", provider_detail(e)),
        FlaviaError::Validation { reasons, .. } => {
            for r in reasons {
                eprintln!("  - {r}");
            }
        }
        _ => {}
    }
    if let Some(raw) = err.raw_text() {
        eprintln!("{}", "--- model output start ---".dimmed());
        eprintln!("{}", indent(raw, 2));
        eprintln!("{}", "--- model output end ---".dimmed());
    }
}

fn indent(s: &str, n: usize) -> String {
    let pad = " ".repeat(n);
    s.lines()
        .map(|l| format!("{}{}", pad, l))
        .collect::<Vec<_>>()
        .join("\n")
}
