mod catalog;
pub mod fakes;
mod openai;
mod output;
mod provider;
mod registry;
mod role_agent;
mod traits;

pub use catalog::ModelCatalog;
pub use openai::OpenAiCompatibleBackend;
pub use output::{CompletionOutput, TokenUsage};
pub use provider::ProviderKind;
pub use registry::{create_backend, BackendResolver, ProviderRegistry};
pub use role_agent::RoleAgent;
pub use traits::{
    AgentConfig, CompletionBackend, CompletionError, CompletionRequest, Role, DEFAULT_TIMEOUT,
};
