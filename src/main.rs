use alsrec::utils::loader::load_triples;
use alsrec::{init_tracing, AlsTrainer, Config, Feedback};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ratings file with one `user,item,value` triple per line
    #[arg(short, long)]
    input: String,

    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(short, long)]
    delimiter: Option<char>,

    /// Treat values as implicit feedback counts
    #[arg(long)]
    implicit: bool,

    #[arg(long)]
    alpha: Option<f64>,

    #[arg(short = 'k', long)]
    factors: Option<usize>,

    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    lambda: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    strict: bool,

    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Only print recommendations for this user
    #[arg(short, long)]
    user: Option<usize>,

    /// Comma-separated item labels, one per column
    #[arg(long)]
    labels: Option<String>,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct UserRecommendations {
    user: usize,
    items: Vec<alsrec::Recommendation>,
}

#[derive(Debug, Serialize)]
struct Output<'a> {
    report: &'a alsrec::TrainingReport,
    recommendations: Vec<UserRecommendations>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    apply_overrides(&mut config, &args);

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.recommendation.workers)
        .build_global()
        .context("failed to configure ranking thread pool")?;

    info!("Training configuration: {:?}", config.training);

    let q = load_triples(&args.input, config.data.delimiter)
        .with_context(|| format!("failed to load ratings from {}", args.input))?;

    let labels: Option<Vec<String>> = args
        .labels
        .as_ref()
        .map(|s| s.split(',').map(|l| l.trim().to_string()).collect());

    let feedback = if args.implicit {
        Feedback::Implicit {
            alpha: config.implicit.alpha,
        }
    } else {
        Feedback::Explicit
    };

    let model = AlsTrainer::new(config.training.clone()).fit(&q, feedback)?;
    info!(
        "Trained {} factors for {} users and {} items",
        model.num_factors(),
        model.num_users(),
        model.num_items()
    );
    let top_n = config.recommendation.top_n.min(model.num_items());

    let recommendations = match args.user {
        Some(user) => vec![UserRecommendations {
            user,
            items: model.top_n(user, top_n, labels.as_deref())?,
        }],
        None => model
            .recommend_all(top_n, labels.as_deref())?
            .into_iter()
            .enumerate()
            .map(|(user, items)| UserRecommendations { user, items })
            .collect(),
    };

    if args.json {
        let output = Output {
            report: &model.report,
            recommendations,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match model.final_error() {
        Some(error) => println!(
            "Final error {:.6} after {} iterations ({:?})",
            error, model.report.iterations_run, model.report.stop_reason
        ),
        None => println!("No iterations completed ({:?})", model.report.stop_reason),
    }
    for warning in &model.report.warnings {
        println!(
            "warning: singular {} {} in iteration {}",
            warning.axis,
            warning.index,
            warning.iteration + 1
        );
    }
    for entry in &recommendations {
        let items: Vec<String> = entry
            .items
            .iter()
            .map(|r| format!("{} ({:.3})", r.label, r.score))
            .collect();
        println!("user {}: {}", entry.user, items.join(", "));
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(delimiter) = args.delimiter {
        config.data.delimiter = delimiter;
    }
    if let Some(alpha) = args.alpha {
        config.implicit.alpha = alpha;
    }
    if let Some(factors) = args.factors {
        config.training.factors = factors;
    }
    if let Some(iterations) = args.iterations {
        config.training.iterations = iterations;
    }
    if let Some(lambda) = args.lambda {
        config.training.lambda = lambda;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    if let Some(top_n) = args.top_n {
        config.recommendation.top_n = top_n;
    }
    if args.strict {
        config.training.strict = true;
    }
    if args.implicit && config.training.init_scale.is_none() {
        config.training.init_scale = Some(config.implicit.init_scale);
    }
}
