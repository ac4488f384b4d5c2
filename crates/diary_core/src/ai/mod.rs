//! AI enrichment: provider adapters, materials search and the gateway that
//! ties them together.

pub mod gateway;
pub mod gemini;
pub mod http;
pub mod openai;
pub mod provider;
pub mod search;

pub use gateway::{EnrichmentFailure, EnrichmentGateway, GatewayConfig};
pub use provider::{Prompt, ProviderFailure, ProviderFailureKind, TextProvider};
pub use search::{SearchConfig, SearchError, SearchHit, SearchProvider};
