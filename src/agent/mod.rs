//! Per-request orchestration: personal data → context → prompt → model →
//! parse → validate. Each call works on its own snapshot of the store and
//! never writes to it.

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{ModelClient, RetryPolicy};
use crate::config::Config;
use crate::context::{build_context, ContextBlock, UseCase};
use crate::errors::FlaviaError;
use crate::log::{save_stage, Transcript};
use crate::model::{Recipe, WeeklyPlan};
use crate::parse::{parse_plan, parse_recipe, Strategy};
use crate::plan::{assemble_plan, validate_recipe};
use crate::prompt::{build_plan_prompt, build_recipe_prompt, merged_avoids, Prompt};
use crate::provider::DynProvider;
use crate::store::PersonalStore;

/// The prompt a generation would send, without calling the model.
/// `days` selects a plan prompt; `None` a single-recipe prompt.
pub fn preview_prompt(
    config: &Config,
    store: &PersonalStore,
    request: &str,
    days: Option<u32>,
) -> Result<Prompt, FlaviaError> {
    let data = store.load();
    match days {
        Some(days) => {
            let ctx = build_context(&data, UseCase::ShoppingList, config.context_budget);
            build_plan_prompt(request, days, &ctx, config.max_days)
        }
        None => {
            let ctx = build_context(&data, UseCase::RecipeGeneration, config.context_budget);
            build_recipe_prompt(request, &ctx)
        }
    }
}

/// A validated result plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub value: T,
    pub strategy: Strategy,
    pub tx: Uuid,
}

pub struct Planner {
    config: Config,
    store: PersonalStore,
    client: ModelClient,
}

impl Planner {
    pub fn new(config: Config, provider: DynProvider) -> Self {
        let store = PersonalStore::new(config.data_path());
        let client = ModelClient::new(provider, RetryPolicy::from_config(&config));
        Self { config, store, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &PersonalStore {
        &self.store
    }

    pub fn context(&self, use_case: UseCase, budget: Option<usize>) -> ContextBlock {
        let data = self.store.load();
        build_context(&data, use_case, budget.unwrap_or(self.config.context_budget))
    }

    pub fn preview_prompt(&self, request: &str, days: Option<u32>) -> Result<Prompt, FlaviaError> {
        preview_prompt(&self.config, &self.store, request, days)
    }

    pub async fn generate_recipe(&self, request: &str) -> Result<Generated<Recipe>, FlaviaError> {
        let tx = Uuid::new_v4();
        let ctx = self.context(UseCase::RecipeGeneration, None);
        let prompt = build_recipe_prompt(request, &ctx)?;
        let avoid = merged_avoids(request, &ctx);

        let raw = self.call(tx, "recipe", &prompt).await?;
        let parsed = parse_recipe(&raw)?;
        validate_recipe(&parsed.value, &avoid).map_err(|e| e.with_raw(&raw))?;
        info!(%tx, recipe = %parsed.value.name, strategy = ?parsed.strategy, "recipe ready");
        Ok(Generated { value: parsed.value, strategy: parsed.strategy, tx })
    }

    pub async fn generate_plan(
        &self,
        request: &str,
        days: u32,
    ) -> Result<Generated<WeeklyPlan>, FlaviaError> {
        let tx = Uuid::new_v4();
        let data = self.store.load();
        let ctx = build_context(&data, UseCase::ShoppingList, self.config.context_budget);
        let prompt = build_plan_prompt(request, days, &ctx, self.config.max_days)?;
        let avoid = merged_avoids(request, &ctx);

        let raw = self.call(tx, "plan", &prompt).await?;
        let parsed = parse_plan(&raw)?;
        let plan = assemble_plan(parsed.value, days, &avoid, &data.pantry)
            .map_err(|e| e.with_raw(&raw))?;
        info!(%tx, days, items = plan.shopping_list.items.len(), strategy = ?parsed.strategy, "plan ready");
        Ok(Generated { value: plan, strategy: parsed.strategy, tx })
    }

    /// Independent plans, run concurrently; results come back in input order.
    pub async fn generate_batch(
        &self,
        requests: &[String],
        days: u32,
    ) -> Vec<Result<Generated<WeeklyPlan>, FlaviaError>> {
        join_all(requests.iter().map(|r| self.generate_plan(r, days))).await
    }

    async fn call(&self, tx: Uuid, stage: &str, prompt: &Prompt) -> Result<String, FlaviaError> {
        let result = self.client.call_model(prompt).await;
        if self.config.save_request || self.config.save_response {
            let t = Transcript {
                tx,
                stage,
                provider: self.client.provider_name(),
                model: &self.config.model,
                prompt,
                response: result.as_ref().ok().map(String::as_str),
            };
            if let Err(e) =
                save_stage(&self.config.data_path(), &t, self.config.save_request, self.config.save_response)
            {
                warn!(%tx, error = %e, "could not save transcript");
            }
        }
        Ok(result?)
    }
}
