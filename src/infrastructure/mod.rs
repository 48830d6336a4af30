// Infrastructure layer - External dependencies and adapters
pub mod api_client;
pub mod config;
pub mod feed_channel;
pub mod http_response;
pub mod live_stream;
