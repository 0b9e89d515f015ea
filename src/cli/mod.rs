use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "open-ai", alias = "openai")]
    OpenAI,
    #[value(alias = "anthropic", alias = "claude")]
    Anthropic,
    #[value(alias = "ollama")]
    Ollama,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UseCaseArg {
    Recipe,
    Shopping,
}

#[derive(Parser, Debug)]
#[command(name = "flavia", version, about = "Personal meal planner backed by an LLM")]
pub struct Args {
    /// TOML config file; values there are overridden by flags below.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long, default_value_t = false)]
    pub save_request: bool,

    #[arg(long, default_value_t = false)]
    pub save_response: bool,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Suggest a single recipe.
    Recipe {
        request: String,
        /// Keep the recipe under <data-dir>/recipes.
        #[arg(long, default_value_t = false)]
        save: bool,
    },
    /// Plan several dinners and derive a shopping list.
    Plan {
        request: String,
        #[arg(long, default_value_t = 3)]
        days: u32,
    },
    /// Generate independent plans for several requests at once.
    Batch {
        #[arg(required = true)]
        requests: Vec<String>,
        #[arg(long, default_value_t = 3)]
        days: u32,
    },
    /// Print the personal context block that would be sent.
    Context {
        #[arg(long, value_enum, default_value_t = UseCaseArg::Recipe)]
        use_case: UseCaseArg,
        #[arg(long)]
        budget: Option<usize>,
    },
    /// Print the prompt without calling the model.
    Prompt {
        request: String,
        /// Build a plan prompt for this many days instead of a recipe prompt.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Rate a recipe.
    Feedback {
        recipe_id: String,
        rating: u8,
        #[arg(default_value = "")]
        comment: String,
    },
    #[command(subcommand)]
    Pantry(PantryCommand),
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand, Debug)]
pub enum PantryCommand {
    Add {
        name: String,
        #[arg(long, default_value = "other")]
        category: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    Love { foods: Vec<String> },
    Dislike { foods: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plan_with_global_flags() {
        let args = Args::parse_from([
            "flavia", "--provider", "claude", "--max-retries", "2", "plan", "chicken", "--days", "4",
        ]);
        assert_eq!(args.provider, Some(ProviderKind::Anthropic));
        assert_eq!(args.max_retries, Some(2));
        match args.command {
            Command::Plan { request, days } => {
                assert_eq!(request, "chicken");
                assert_eq!(days, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn feedback_comment_defaults_to_empty() {
        let args = Args::parse_from(["flavia", "feedback", "teriyaki-bowl", "5"]);
        match args.command {
            Command::Feedback { recipe_id, rating, comment } => {
                assert_eq!(recipe_id, "teriyaki-bowl");
                assert_eq!(rating, 5);
                assert!(comment.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
