//! Enrolled identities and distance queries against them.

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::types::{Embedding, Identity};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no face detected in enrollment image for {0:?}")]
    NoFaceDetected(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Summary of a [`IdentityStore::load`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub registered: usize,
    /// Entries that yielded no face (or failed to encode) and were left out.
    pub skipped: Vec<String>,
    /// Names that appeared more than once; the later entry replaced the earlier.
    pub duplicates: Vec<String>,
}

/// Ordered collection of enrolled identities.
///
/// Built wholesale from the enrollment collection and never mutated once
/// published; enrollment changes produce a fresh store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityStore {
    identities: Vec<Identity>,
}

impl IdentityStore {
    pub fn from_identities(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    /// Encode every `(name, image)` source into an identity.
    ///
    /// Images with no detectable face are skipped and listed in the report.
    /// When an image holds several faces the first detected one is used.
    pub fn load<P, I>(sources: I, provider: &mut P) -> (Self, LoadReport)
    where
        P: EmbeddingProvider + ?Sized,
        I: IntoIterator<Item = (String, RgbImage)>,
    {
        let mut identities: Vec<Identity> = Vec::new();
        let mut report = LoadReport::default();

        for (name, image) in sources {
            let embedding = match first_face_embedding(provider, &image) {
                Ok(Some(embedding)) => embedding,
                Ok(None) => {
                    tracing::warn!(name = %name, "no face in enrollment image; skipping");
                    report.skipped.push(name);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "failed to encode enrollment image; skipping");
                    report.skipped.push(name);
                    continue;
                }
            };

            if let Some(existing) = identities.iter_mut().find(|i| i.name == name) {
                tracing::warn!(name = %name, "duplicate enrollment name; later entry replaces earlier");
                existing.embedding = embedding;
                report.duplicates.push(name);
            } else {
                identities.push(Identity { name, embedding });
            }
        }

        report.registered = identities.len();
        tracing::info!(
            registered = report.registered,
            skipped = report.skipped.len(),
            duplicates = report.duplicates.len(),
            "identity store loaded"
        );

        (Self { identities }, report)
    }

    /// Encode a single enrollment image into an identity.
    ///
    /// Does not touch any store; the caller rebuilds the store afterwards.
    pub fn add<P>(name: &str, image: &RgbImage, provider: &mut P) -> Result<Identity, StoreError>
    where
        P: EmbeddingProvider + ?Sized,
    {
        let embedding = first_face_embedding(provider, image)?
            .ok_or_else(|| StoreError::NoFaceDetected(name.to_string()))?;
        Ok(Identity {
            name: name.to_string(),
            embedding,
        })
    }

    /// Distance from `probe` to every identity, in store order.
    pub fn query(&self, probe: &Embedding) -> Vec<f32> {
        self.identities
            .iter()
            .map(|identity| probe.euclidean_distance(&identity.embedding))
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<&Identity> {
        self.identities.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.identities.iter().any(|i| i.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(|i| i.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

fn first_face_embedding<P>(provider: &mut P, image: &RgbImage) -> Result<Option<Embedding>, ProviderError>
where
    P: EmbeddingProvider + ?Sized,
{
    let faces = provider.detect_and_encode(image)?;
    if faces.len() > 1 {
        tracing::debug!(faces = faces.len(), "several faces in enrollment image; using the first");
    }
    Ok(faces.into_iter().next().map(|f| f.embedding))
}
