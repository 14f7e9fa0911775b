/// Step assertions over a captured response.
pub mod assertions;
/// Base URL, debug flag and schema directory, from the environment or code.
pub mod config;
/// Per-scenario state and the operations the steps call.
pub mod context;
/// `StepError` and the crate `Result` alias.
pub mod errors;
/// Small JSONPath evaluator used by the body path steps.
pub mod jsonpath;
/// Request bodies and building `reqwest` requests.
pub mod request;
/// Captured response snapshot.
pub mod response;
/// JSON Schema validation of response bodies.
pub mod schema;
/// Scenario scope and `` `##key` `` placeholder substitution.
pub mod scope;
/// Cucumber world and step definitions.
pub mod steps;

pub use config::ApiConfig;
pub use context::ApiContext;
pub use errors::{Result, StepError};
pub use request::{FieldKind, FormField, RequestBody, RequestRecord};
pub use response::CapturedResponse;
pub use scope::Scope;
pub use steps::ApiWorld;
