//! Query chains, request parameter assembly and result materialization.

pub mod model_filter;
pub mod ops;
pub mod parameter_builder;
pub mod processor;
pub mod provider;

pub use model_filter::{ModelFilter, SelectedRecord};
pub use ops::{Query, QueryOp};
pub use parameter_builder::ParameterBuilder;
pub use processor::{ExpressionProcessor, QueryOutcome};
pub use provider::{JsonSerializer, RequestMethod, RestClient, RestQueryProvider, Serializer};
