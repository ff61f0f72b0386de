pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod types;

pub use cache::ResourceKey;
pub use cached_client::{CachedClient, FetchPolicy};
pub use client::{collect_all, ClientOptions, Credentials, ResourceClient, DEFAULT_API_URL};
pub use error::{ApiErrorDetail, ClientError};
