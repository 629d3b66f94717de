pub mod anthropic;
pub mod openai;
pub mod provider;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatibleProvider;
pub use provider::*;
pub use registry::*;
