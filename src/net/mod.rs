//! Network interception: transparent network-first fetching with cache
//! fallback, plus the install/activate lifecycle that seeds and rotates
//! cache generations.

pub mod agent;
pub mod client;
pub mod interceptor;

pub use agent::ServiceAgent;
pub use client::{Fetch, FetchRequest, FetchResponse, HttpClient, RequestMode};
pub use interceptor::Interceptor;
