//! Batch request handling: the `/predict` envelope and its processing loop.
//!
//! Instances are processed one after another, in input order, and result `i`
//! always answers instance `i`. For each instance:
//!
//! ```text
//! resolve options ──▶ base64 decode ──▶ transient file ──▶ engine ──▶ release
//! ```
//!
//! What a failure does depends on [`FailureMode`]: in `FailFast` the first
//! error ends the request and no predictions are returned (instances already
//! processed have had their files released); in `PerInstance` the failing
//! instance gets an empty prediction carrying the error message.

use crate::config::{ConversionOptions, FailureMode, OptionOverrides};
use crate::convert::convert_bytes;
use crate::engine::ConversionEngine;
use crate::error::Pdf2TextError;
use crate::output::{ConversionResult, Prediction};
use crate::transient::TransientStore;
use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine as _,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Standard alphabet; trailing `=` padding optional.
const CONTENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One document in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Base64-encoded PDF bytes.
    pub content: String,
    /// Per-instance option overrides; take precedence over request parameters.
    #[serde(flatten)]
    pub options: OptionOverrides,
}

impl Instance {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            options: OptionOverrides::default(),
        }
    }
}

/// `POST /predict` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<Instance>,
    /// Request-wide option overrides.
    #[serde(default)]
    pub parameters: OptionOverrides,
}

/// `POST /predict` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
}

/// Decode an instance's transport encoding into document bytes.
///
/// ASCII whitespace anywhere in the payload (line-wrapped base64) is ignored.
pub fn decode_content(content: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = content
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    CONTENT_ENGINE.decode(compact)
}

/// Turns a [`PredictRequest`] into a [`PredictResponse`].
///
/// Cheap to clone; every clone shares the same engine.
#[derive(Clone)]
pub struct BatchHandler {
    engine: Arc<dyn ConversionEngine>,
    store: TransientStore,
    defaults: ConversionOptions,
    failure_mode: FailureMode,
}

impl BatchHandler {
    pub fn new(
        engine: Arc<dyn ConversionEngine>,
        store: TransientStore,
        defaults: ConversionOptions,
        failure_mode: FailureMode,
    ) -> Self {
        Self {
            engine,
            store,
            defaults,
            failure_mode,
        }
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Process every instance in order.
    ///
    /// # Errors
    /// In [`FailureMode::FailFast`], the first instance error. Never fails in
    /// [`FailureMode::PerInstance`].
    pub async fn handle(&self, request: PredictRequest) -> Result<PredictResponse, Pdf2TextError> {
        let start = Instant::now();
        let total = request.instances.len();
        info!("Handling batch of {} instances", total);

        let base = request.parameters.apply(self.defaults.clone());
        let mut predictions = Vec::with_capacity(total);

        for (index, instance) in request.instances.into_iter().enumerate() {
            let outcome = self
                .process(index, instance, &base)
                .instrument(info_span!("instance", index))
                .await;

            match outcome {
                Ok(result) => predictions.push(Prediction::ok(result.full_text)),
                Err(e) => match self.failure_mode {
                    FailureMode::FailFast => {
                        warn!("Instance {}/{} failed, aborting batch: {}", index + 1, total, e);
                        return Err(e);
                    }
                    FailureMode::PerInstance => {
                        warn!("Instance {}/{} failed: {}", index + 1, total, e);
                        predictions.push(Prediction::failed(e.to_string()));
                    }
                },
            }
        }

        info!(
            "Batch complete: {} predictions in {}ms",
            predictions.len(),
            start.elapsed().as_millis()
        );
        Ok(PredictResponse { predictions })
    }

    async fn process(
        &self,
        index: usize,
        instance: Instance,
        base: &ConversionOptions,
    ) -> Result<ConversionResult, Pdf2TextError> {
        let options = instance.options.apply(base.clone());
        options
            .validate()
            .map_err(|reason| Pdf2TextError::InvalidOptions { index, reason })?;

        let bytes = decode_content(&instance.content)
            .map_err(|source| Pdf2TextError::InvalidContent { index, source })?;

        convert_bytes(self.engine.as_ref(), &self.store, bytes, &options, index).await
    }
}
