//! Generates practice books from a blueprint file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pulpit_algo::ReferencePolicy;
use pulpit_backend::factory::{self, FactoryConfig, PhraseFactory};
use pulpit_backend::logging;
use pulpit_backend::services::llm_provider::LLMProvider;

#[derive(Parser, Debug)]
#[command(name = "phrase-factory")]
#[command(about = "Generate Bible translation practice books with an LLM")]
#[command(version)]
struct Args {
    /// Blueprint JSON: a list of {book, theme, key_verbs, chinglish_traps, strong_verb_focus}
    #[arg(
        short,
        long,
        env = "BLUEPRINT_FILE",
        default_value = "assets/bible_data/blueprint_strong_verbs.json"
    )]
    blueprint: PathBuf,

    /// Directory receiving <book>.json
    #[arg(short, long, env = "DATA_DIR", default_value = "assets/bible_data")]
    out_dir: PathBuf,

    /// Items per book
    #[arg(short, long, env = "FACTORY_TARGET", default_value_t = factory::DEFAULT_TARGET)]
    target: usize,

    /// Items requested per round
    #[arg(long, env = "FACTORY_BATCH", default_value_t = factory::DEFAULT_BATCH)]
    batch: usize,

    /// Reference de-duplication: exact, normalized or containment
    #[arg(long, env = "FACTORY_POLICY", default_value = "normalized")]
    policy: ReferencePolicy,

    /// Only generate these books
    #[arg(long = "book")]
    books: Vec<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    logging::init_cli_tracing(args.verbose);

    let provider = LLMProvider::from_env();
    if !provider.is_available() {
        tracing::error!("LLM_API_KEY (or GEMINI_API_KEY) is not set");
        return ExitCode::FAILURE;
    }
    tracing::info!(endpoint = %provider.config().api_endpoint, model = %provider.config().model, "connecting");

    let blueprints = match factory::load_blueprints(&args.blueprint) {
        Ok(blueprints) => blueprints,
        Err(e) => {
            tracing::error!(error = %e, "failed to read blueprint");
            return ExitCode::FAILURE;
        }
    };

    let config = FactoryConfig {
        target: args.target,
        batch: args.batch,
        policy: args.policy,
        ..FactoryConfig::default()
    };
    tracing::info!(
        books = blueprints.len(),
        target = config.target,
        policy = %config.policy,
        "starting factory"
    );
    let factory = PhraseFactory::new(provider, config);

    let mut failed = false;
    for blueprint in blueprints
        .iter()
        .filter(|b| args.books.is_empty() || args.books.contains(&b.book))
    {
        let generated = match factory.build_book(blueprint).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!(book = %blueprint.book, error = %e, "generation aborted");
                return ExitCode::FAILURE;
            }
        };

        match factory::write_book(&args.out_dir, &blueprint.book, &generated.items) {
            Ok(path) => tracing::info!(
                book = %blueprint.book,
                items = generated.report.items,
                duplicates = generated.report.duplicates,
                invalid = generated.report.invalid,
                path = %path.display(),
                "book saved"
            ),
            Err(e) => {
                tracing::error!(book = %blueprint.book, error = %e, "failed to save book");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
