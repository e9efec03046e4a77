pub mod attempt;
pub mod loaders;
pub mod problem;
pub mod recognition;
pub mod stroke;
pub mod validation;

pub use attempt::AttemptScript;
pub use loaders::{load_attempt_file, load_problem_catalog, load_toml_to_problem};
pub use problem::{ExpectedStep, Problem, ProblemCatalog};
pub use recognition::{RecognitionResult, RecognitionStatus};
pub use stroke::{PointerType, Stroke, StrokePoint};
pub use validation::{StepErrorKind, ValidationRequest, ValidationResult};
