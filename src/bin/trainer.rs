use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use stylerec::{init_tracing, Config, ContentRecommender, ItemBasedCf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Collaborative,
    Content,
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Fit recommendation engines and write snapshots", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(short, long, value_enum, default_value = "all")]
    target: Target,

    /// Overrides `data.ratings_path`
    #[arg(long)]
    ratings: Option<PathBuf>,

    /// Overrides `data.catalog_path`
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Overrides `snapshot.dir`
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write the content snapshot with its feature matrix in a separate file
    #[arg(long)]
    split_features: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting stylerec trainer");

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    if let Some(ratings) = args.ratings {
        config.data.ratings_path = ratings;
    }
    if let Some(catalog) = args.catalog {
        config.data.catalog_path = catalog;
    }
    if let Some(dir) = args.output_dir {
        config.snapshot.dir = dir;
    }

    if matches!(args.target, Target::Collaborative | Target::All) {
        train_collaborative(&config)?;
    }
    if matches!(args.target, Target::Content | Target::All) {
        train_content(&config, args.split_features)?;
    }

    info!("Training finished");
    Ok(())
}

fn train_collaborative(config: &Config) -> Result<()> {
    info!(ratings = %config.data.ratings_path.display(), "Training item-based CF model");

    let mut cf = ItemBasedCf::new(config);
    cf.fit(&config.data.ratings_path, Some(config.data.catalog_path.as_path()))
        .context("fitting collaborative engine")?;

    let stats = cf.stats()?;
    info!("Correlation analysis: {}", serde_json::to_string(&stats)?);

    let path = config.snapshot.collaborative_path();
    cf.save_snapshot(&path)
        .with_context(|| format!("saving {}", path.display()))?;

    if let Some(&item_id) = cf.similarity_matrix()?.items().first() {
        let similar = cf.find_similar_items(item_id, 5)?;
        info!(item = item_id, ?similar, "Sample similar items");
    }
    Ok(())
}

fn train_content(config: &Config, split_features: bool) -> Result<()> {
    info!(catalog = %config.data.catalog_path.display(), "Training content-based model");

    let mut content = ContentRecommender::new(config);
    content
        .fit(&config.data.catalog_path)
        .context("fitting content engine")?;

    let stats = content.dataset_stats()?;
    info!("Dataset statistics: {}", serde_json::to_string(&stats)?);

    let path = config.snapshot.content_path();
    if split_features {
        let sidecar = content
            .save_split_snapshot(&path)
            .with_context(|| format!("saving {}", path.display()))?;
        info!(features = %sidecar.display(), "Feature matrix written separately");
    } else {
        content
            .save_snapshot(&path)
            .with_context(|| format!("saving {}", path.display()))?;
    }

    if let Some(item) = content.catalog()?.items().first() {
        let recs = content.get_recommendations(item.id, 5, true)?;
        info!(item = item.id, count = recs.len(), "Sample recommendations");
    }
    Ok(())
}
