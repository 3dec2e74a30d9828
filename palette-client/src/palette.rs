//! Palette generation endpoint

use crate::error::Result;
use crate::{API_KEY_HEADER, PaletteClient};
use palette_core::domain::request::GenerationRequest;
use tracing::debug;

/// Path of the generation endpoint, relative to the base URL
pub const GENERATE_PALETTE_ENDPOINT: &str = "/default/testColorPalette";

impl PaletteClient {
    /// Ask the service to generate a palette for one video
    ///
    /// The call is single-shot: no retry is attempted on failure.
    ///
    /// # Arguments
    /// * `req` - The generation request, sent as the JSON body
    pub async fn generate_palette(&self, req: &GenerationRequest) -> Result<()> {
        let url = format!("{}{}", self.base_url, GENERATE_PALETTE_ENDPOINT);
        debug!(target_url = %url, payload = %req, "Sending palette generation request");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(req)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
