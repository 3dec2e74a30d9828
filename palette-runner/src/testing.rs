//! In-memory fakes of the repositories, shared by the unit tests

use anyhow::Result;
use async_trait::async_trait;
use palette_core::domain::record::{InputRow, Record};
use palette_core::domain::request::GenerationRequest;
use palette_core::{Locator, ResultNaming};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::JobConfig;
use crate::repository::{ObjectStorage, PaletteGenerator};

pub const INPUT_BUCKET: &str = "videos-in";
pub const OUTPUT_BUCKET: &str = "palettes-out";

/// Storage holding a fixed set of `(bucket, key)` pairs
#[derive(Default)]
pub struct FakeStorage {
    present: HashSet<(String, String)>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeStorage {
    pub fn with_object(mut self, bucket: &str, key: &str) -> Self {
        self.present.insert((bucket.to_string(), key.to_string()));
        self
    }

    /// Every lookup of `key` fails
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));

        if self.failing.contains(key) {
            anyhow::bail!("access denied bucket={} key={}", bucket, key);
        }

        Ok(self.present.contains(&(bucket.to_string(), key.to_string())))
    }
}

/// Generator recording every request it receives
#[derive(Default)]
pub struct FakeGenerator {
    failing_serials: HashSet<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn failing_for(mut self, serial: &str) -> Self {
        self.failing_serials.insert(serial.to_string());
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaletteGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());

        if self.failing_serials.contains(&request.source_serial) {
            anyhow::bail!("API error (status 500): palette extraction failed");
        }

        Ok(())
    }
}

pub fn job_config() -> JobConfig {
    JobConfig::new(INPUT_BUCKET.to_string(), OUTPUT_BUCKET.to_string())
}

pub fn locator() -> Locator {
    Locator {
        input_bucket: INPUT_BUCKET.to_string(),
        output_bucket: OUTPUT_BUCKET.to_string(),
        output_prefix: "video-color-palette-extraction".to_string(),
        region: "ap-southeast-1".to_string(),
        naming: ResultNaming::Serial,
    }
}

pub fn record(serial: &str, path: &str) -> Record {
    locator().resolve(InputRow {
        serial: serial.to_string(),
        original_file_path: path.to_string(),
    })
}

/// Key of the result object for `serial` under the default locator
pub fn result_key(serial: &str) -> String {
    format!("video-color-palette-extraction/{}.csv", serial)
}
