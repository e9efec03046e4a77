pub mod json_loader;
pub mod toml_loader;

pub use json_loader::load_attempt_file;
pub use toml_loader::{load_problem_catalog, load_toml_to_problem};
