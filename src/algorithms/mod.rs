pub mod convergence;
pub mod initializer;
pub mod preprocessing;
pub mod ranking;
pub mod solver;

pub use convergence::{weighted_error, ErrorHistory};
pub use initializer::init_factors;
pub use preprocessing::{make_confidence_matrix, make_weight_matrix, MISSING};
pub use ranking::{best_items, predict, recommend_all, top_n, top_n_labels};
pub use solver::{train, train_implicit, AlsTrainer, CancellationToken};
