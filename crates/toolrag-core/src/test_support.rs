//! Deterministic embedding provider shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;

/// Bag-of-words provider that counts calls.
///
/// Texts containing a pinned key embed to the pinned vector; texts containing
/// the failure marker error out; everything else hashes its words into
/// `dims` buckets.
pub struct FakeProvider {
    dims: usize,
    calls: AtomicUsize,
    pinned: Vec<(String, Vec<f32>)>,
    fail_when: Mutex<Option<String>>,
}

impl FakeProvider {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            calls: AtomicUsize::new(0),
            pinned: Vec::new(),
            fail_when: Mutex::new(None),
        }
    }

    pub fn pin(mut self, key: &str, vector: Vec<f32>) -> Self {
        self.pinned.push((key.to_string(), vector));
        self
    }

    pub fn fail_when(&self, marker: Option<&str>) {
        *self.fail_when.lock().unwrap() = marker.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn model_id(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_when.lock().unwrap().as_deref() {
            if text.contains(marker) {
                anyhow::bail!("simulated provider outage");
            }
        }
        if let Some((_, v)) = self.pinned.iter().find(|(k, _)| text.contains(k.as_str())) {
            return Ok(v.clone());
        }
        let mut v = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            v[bucket as usize % self.dims] += 1.0;
        }
        Ok(v)
    }
}
