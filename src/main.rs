use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::Path;
use stylerec::{init_tracing, AppState, Config, FeatureFilter, ItemId, SimilarityEngine};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Query fitted recommendation snapshots", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Engine {
    Collaborative,
    Content,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Items most similar to ITEM_ID
    Similar {
        item_id: ItemId,
        #[arg(short, long, value_enum, default_value = "content")]
        engine: Engine,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Predicted rating of ITEM_ID for USER_ID
    Predict {
        user_id: String,
        item_id: ItemId,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Personalised recommendations for USER_ID
    User {
        user_id: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        #[arg(short, long, default_value_t = 10)]
        k: usize,
    },
    /// Content recommendations with catalog attributes
    Recommend {
        item_id: ItemId,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        no_scores: bool,
    },
    /// Catalog items matching attribute filters
    Filter {
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        master_category: Option<String>,
        #[arg(long)]
        sub_category: Option<String>,
        #[arg(long)]
        article_type: Option<String>,
        #[arg(long)]
        base_colour: Option<String>,
        #[arg(long)]
        season: Option<String>,
        #[arg(long)]
        usage: Option<String>,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Catalog record and active features of ITEM_ID
    Explain { item_id: ItemId },
    /// Summary statistics of one engine
    Stats {
        #[arg(short, long, value_enum, default_value = "content")]
        engine: Engine,
    },
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ApiResponse::success(data))?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    let state = AppState::new(config);

    match args.command {
        Command::Similar {
            item_id,
            engine,
            count,
        } => {
            let similar = match engine {
                Engine::Collaborative => state.collaborative()?.similar_items(item_id, count)?,
                Engine::Content => state.content()?.similar_items(item_id, count)?,
            };
            print_json(similar)
        }
        Command::Predict { user_id, item_id, k } => {
            let cf = state.collaborative().context("loading collaborative snapshot")?;
            let rating = match k {
                Some(k) => cf.predict_rating_with_k(&user_id, item_id, k)?,
                None => cf.predict_rating(&user_id, item_id)?,
            };
            print_json(rating)
        }
        Command::User { user_id, count, k } => {
            let cf = state.collaborative().context("loading collaborative snapshot")?;
            print_json(cf.get_item_recommendations(&user_id, count, k)?)
        }
        Command::Recommend {
            item_id,
            count,
            no_scores,
        } => {
            let content = state.content().context("loading content snapshot")?;
            print_json(content.get_recommendations(item_id, count, !no_scores)?)
        }
        Command::Filter {
            gender,
            master_category,
            sub_category,
            article_type,
            base_colour,
            season,
            usage,
            count,
        } => {
            let filter = FeatureFilter {
                gender,
                master_category,
                sub_category,
                article_type,
                base_colour,
                season,
                usage,
            };
            let content = state.content().context("loading content snapshot")?;
            print_json(content.find_similar_by_features(&filter, count)?)
        }
        Command::Explain { item_id } => {
            let content = state.content().context("loading content snapshot")?;
            print_json(content.feature_importance(item_id)?)
        }
        Command::Stats { engine } => match engine {
            Engine::Collaborative => print_json(state.collaborative()?.stats()?),
            Engine::Content => print_json(state.content()?.dataset_stats()?),
        },
    }
}
