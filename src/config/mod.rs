use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub training: TrainingConfig,
    pub implicit: ImplicitConfig,
    pub recommendation: RecommendationConfig,
    pub data: DataConfig,
}

/// Parameters of a single ALS training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of latent factors `k`.
    pub factors: usize,
    pub iterations: usize,
    /// Ridge penalty `λ` added to every normal-equation system.
    pub lambda: f64,
    pub seed: u64,
    /// Abort on the first singular system instead of keeping the previous factor.
    pub strict: bool,
    /// Stop early once the error sequence reaches this value.
    pub error_threshold: Option<f64>,
    /// Upper bound of the uniform initializer. Explicit training falls back
    /// to the largest observed rating when unset.
    pub init_scale: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplicitConfig {
    /// Confidence scale `α` in `c = 1 + α·r`.
    pub alpha: f64,
    pub init_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub top_n: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub delimiter: char,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            factors: 10,
            iterations: 10,
            lambda: 0.01,
            seed: 47,
            strict: false,
            error_threshold: None,
            init_scale: None,
        }
    }
}

impl Default for ImplicitConfig {
    fn default() -> Self {
        Self {
            alpha: 40.0,
            init_scale: 5.0,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            workers: num_cpus::get(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            implicit: ImplicitConfig::default(),
            recommendation: RecommendationConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Config {
    /// Loads a config file and applies `ALSREC_*` environment overrides,
    /// e.g. `ALSREC_TRAINING__LAMBDA=0.1`.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ALSREC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl TrainingConfig {
    pub fn new(factors: usize, iterations: usize, lambda: f64) -> Self {
        Self {
            factors,
            iterations,
            lambda,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_error_threshold(mut self, threshold: f64) -> Self {
        self.error_threshold = Some(threshold);
        self
    }

    pub fn with_init_scale(mut self, scale: f64) -> Self {
        self.init_scale = Some(scale);
        self
    }
}
