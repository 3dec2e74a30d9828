//! Generator repository
//!
//! Triggers palette generation on the remote service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use palette_client::PaletteClient;
use palette_core::domain::request::GenerationRequest;

/// Repository trait for the palette generation service
#[async_trait]
pub trait PaletteGenerator: Send + Sync {
    /// Requests generation of one palette
    ///
    /// Single-shot: a failure is returned as-is, without retry.
    async fn generate(&self, request: &GenerationRequest) -> Result<()>;
}

/// HTTP implementation of PaletteGenerator
pub struct HttpPaletteGenerator {
    client: PaletteClient,
}

impl HttpPaletteGenerator {
    /// Creates a new HTTP generator
    ///
    /// # Arguments
    /// * `client` - Client for the palette service
    pub fn new(client: PaletteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaletteGenerator for HttpPaletteGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<()> {
        self.client
            .generate_palette(request)
            .await
            .with_context(|| format!("Failed to generate palette target={}", self.client.base_url()))
    }
}
