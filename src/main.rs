use anyhow::Context as _;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use flavia::agent::Planner;
use flavia::cli::{Args, Command, PantryCommand, PrefsCommand, UseCaseArg};
use flavia::config::Config;
use flavia::context::UseCase;
use flavia::errors::FlaviaError;
use flavia::feedback::FeedbackRecorder;
use flavia::model::{FeedbackEntry, PantryItem};
use flavia::store::PersonalStore;
use flavia::{provider, ux};

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let level = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("FLAVIA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;
    Ok(())
}

fn use_case(arg: UseCaseArg) -> UseCase {
    match arg {
        UseCaseArg::Recipe => UseCase::RecipeGeneration,
        UseCaseArg::Shopping => UseCase::ShoppingList,
    }
}

/// Commands that only touch local files; no provider or key needed.
fn run_local(cfg: &Config, command: &Command) -> Result<bool, FlaviaError> {
    let store = PersonalStore::new(cfg.data_path());
    match command {
        Command::Context { use_case: uc, budget } => {
            let data = store.load();
            let block = flavia::context::build_context(
                &data,
                use_case(*uc),
                budget.unwrap_or(cfg.context_budget),
            );
            if block.is_empty() {
                println!("(no personal data in {})", cfg.data_dir);
            } else {
                println!("{}", block.text);
            }
            if block.truncated {
                eprintln!("{}", "context truncated to fit the budget".yellow());
            }
        }
        Command::Prompt { request, days } => {
            let prompt = flavia::agent::preview_prompt(cfg, &store, request, *days)?;
            println!("{}", prompt.render());
        }
        Command::Feedback { recipe_id, rating, comment } => {
            let rec = FeedbackRecorder::in_dir(store.root(), store.locks().clone());
            rec.record(&FeedbackEntry::new(recipe_id.clone(), *rating, comment.clone()))?;
            println!("{} {} rated {}/5", "saved".green().bold(), recipe_id, rating);
        }
        Command::Pantry(PantryCommand::Add { name, category }) => {
            let items = store.add_pantry_item(PantryItem { name: name.clone(), category: category.clone() })?;
            ux::show_pantry(&items);
        }
        Command::Pantry(PantryCommand::List) => ux::show_pantry(&store.pantry()),
        Command::Prefs(PrefsCommand::Love { foods }) => {
            let prefs = store.love(foods)?;
            println!("{} {}", "loved:".bold(), prefs.loved.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        Command::Prefs(PrefsCommand::Dislike { foods }) => {
            let prefs = store.dislike(foods)?;
            println!("{} {}", "disliked:".bold(), prefs.disliked.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        _ => return Ok(false),
    }
    Ok(true)
}

async fn run_model(cfg: Config, command: Command) -> Result<ExitCode, FlaviaError> {
    let prov = provider::make_provider(&cfg)?;
    let progress = cfg.progress;
    let planner = Planner::new(cfg, prov);

    match command {
        Command::Recipe { request, save } => {
            let spinner = ux::Spinner::start(progress, "asking the model for a recipe…");
            let result = planner.generate_recipe(&request).await;
            spinner.finish_clear();
            let generated = result?;
            ux::show_recipe(&generated.value);
            if save {
                let path = planner.store().save_recipe(&generated.value)?;
                println!("{} {}", "saved to".green(), path.display());
            }
        }
        Command::Plan { request, days } => {
            let spinner = ux::Spinner::start(progress, &format!("planning {days} dinner(s)…"));
            let result = planner.generate_plan(&request, days).await;
            spinner.finish_clear();
            ux::show_plan(&result?.value);
        }
        Command::Batch { requests, days } => {
            let spinner = ux::Spinner::start(progress, &format!("planning {} request(s)…", requests.len()));
            let results = planner.generate_batch(&requests, days).await;
            spinner.finish_clear();
            let mut failed = 0;
            for (request, result) in requests.iter().zip(results) {
                println!("\n{} {}", "request:".bold(), request);
                match result {
                    Ok(g) => ux::show_plan(&g.value),
                    Err(e) => {
                        ux::show_error(&e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                eprintln!("{} of {} request(s) failed", failed, requests.len());
                return Ok(ExitCode::FAILURE);
            }
        }
        _ => {}
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.debug)?;

    let cfg = match Config::resolve(&args) {
        Ok(c) => c,
        Err(e) => {
            ux::show_error(&e);
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::debug!(provider = ?cfg.provider, model = %cfg.model, data_dir = %cfg.data_dir, "config resolved");

    let handled = run_local(&cfg, &args.command);
    let outcome = match handled {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => run_model(cfg, args.command).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(code) => Ok(code),
        Err(FlaviaError::Store(e)) => Err(e).context("updating personal data"),
        Err(e) => {
            ux::show_error(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}
