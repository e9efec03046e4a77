pub mod debounced_validator;
pub mod local_validator;
pub mod normalize;
pub mod step_validator;

pub use debounced_validator::{DebouncedValidator, PendingValidation};
pub use local_validator::validate_locally;
pub use normalize::{is_final_answer, normalize_latex};
pub use step_validator::StepValidator;
