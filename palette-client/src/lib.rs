//! Palette HTTP Client
//!
//! A small, typed HTTP client for the color palette generation service.
//!
//! # Example
//!
//! ```no_run
//! use palette_client::PaletteClient;
//! use palette_core::domain::request::{FunctionType, GenerationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), palette_client::ClientError> {
//!     let client = PaletteClient::new("https://palette.example.com", "secret");
//!
//!     client
//!         .generate_palette(&GenerationRequest {
//!             source_url: "https://in.s3.ap-southeast-1.amazonaws.com/videos/a.mp4".to_string(),
//!             source_serial: "abc123".to_string(),
//!             period_seconds: 60.0,
//!             palette_size: 5,
//!             function_type: FunctionType(1),
//!             destination_uri: "https://out.s3.ap-southeast-1.amazonaws.com/p/abc123.csv"
//!                 .to_string(),
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
mod palette;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use palette::GENERATE_PALETTE_ENDPOINT;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Header carrying the service API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for the palette generation service
#[derive(Debug, Clone)]
pub struct PaletteClient {
    /// Base URL of the service (e.g., "https://abc.execute-api.ap-southeast-1.amazonaws.com")
    base_url: String,
    /// Value sent in the `x-api-key` header
    api_key: String,
    /// HTTP client instance
    client: Client,
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "errorMessage")]
    error_message: String,
}

impl PaletteClient {
    /// Create a new palette client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the service
    /// * `api_key` - The API key sent with every request
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Create a new palette client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use palette_client::PaletteClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = PaletteClient::with_client("http://localhost:8080", "key", http_client);
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle a response whose body is not needed
    ///
    /// The service acknowledges with `200 OK` or `201 Created`. Any other
    /// status is an error carrying the response body.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error_message)
            .unwrap_or(body);

        Err(ClientError::api_error(status.as_u16(), message))
    }
}
