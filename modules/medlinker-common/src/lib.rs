pub mod canonical;
pub mod config;
pub mod error;
pub mod trace;
pub mod types;

pub use canonical::{map_synonym, normalize_and_map, normalize_term};
pub use config::Config;
pub use error::MedLinkerError;
pub use trace::*;
pub use types::*;
