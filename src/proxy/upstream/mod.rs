pub mod client;

pub use client::{ForwardedBody, ForwardedResponse, UpstreamClient};
