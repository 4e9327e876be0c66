//! Token encoding and decoding

use crate::error::{CodecError, CodecResult};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use core_types::{new_identity, Experiment, Test};

/// Separator between the four token parts
pub const DELIMITER: char = '/';

const PREFIX: char = '#';

// URL-safe alphabet never yields the delimiter; padding is accepted on read.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The shareable subset of an experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedState {
    /// Setup source
    pub baseline: String,
    /// Ordered tests, with scores
    pub tests: Vec<Test>,
    /// Display title
    pub title: String,
    /// Experiment identity
    pub id: String,
}

impl SharedState {
    /// Encode this state as a share token
    pub fn encode(&self) -> CodecResult<String> {
        encode(&self.baseline, &self.tests, &self.title, &self.id)
    }
}

impl From<&Experiment> for SharedState {
    fn from(experiment: &Experiment) -> Self {
        Self {
            baseline: experiment.baseline.clone(),
            tests: experiment.tests.clone(),
            title: experiment.title.clone(),
            id: experiment.id.clone(),
        }
    }
}

/// Encode the four shareable fields into a token.
///
/// # Errors
/// Only if the tests cannot be serialized, which plain tests never trigger.
pub fn encode(baseline: &str, tests: &[Test], title: &str, id: &str) -> CodecResult<String> {
    let tests_json = serde_json::to_string(tests)?;
    let [baseline, tests, title, id] =
        [baseline, tests_json.as_str(), title, id].map(|part| TOKEN_ENGINE.encode(part));
    Ok(format!(
        "{PREFIX}{baseline}{DELIMITER}{tests}{DELIMITER}{title}{DELIMITER}{id}"
    ))
}

fn decode_part(part: &str, name: &'static str) -> CodecResult<String> {
    let bytes = TOKEN_ENGINE
        .decode(part)
        .map_err(|source| CodecError::Base64 { part: name, source })?;
    String::from_utf8(bytes).map_err(|source| CodecError::Utf8 { part: name, source })
}

/// Decode a token produced by [`encode`].
///
/// The leading `#` is optional. A token without a title part decodes with
/// an empty title; a token without an id part, or with an empty one, gets
/// a freshly generated identity.
///
/// # Errors
/// Fails as a whole when the tests part is missing or any present part is
/// not valid base64, UTF-8, or (for tests) a JSON list of tests.
pub fn decode(token: &str) -> CodecResult<SharedState> {
    let body = token.strip_prefix(PREFIX).unwrap_or(token);
    let mut parts = body.splitn(4, DELIMITER);

    let baseline = decode_part(parts.next().unwrap_or_default(), "baseline")?;
    let tests_part = parts.next().ok_or(CodecError::MissingPart("tests"))?;
    let tests: Vec<Test> = serde_json::from_str(&decode_part(tests_part, "tests")?)?;
    let title = match parts.next() {
        Some(part) => decode_part(part, "title")?,
        None => String::new(),
    };
    let id = match parts.next() {
        Some(part) if !part.is_empty() => decode_part(part, "id")?,
        _ => {
            tracing::debug!("share token carries no identity, generating one");
            new_identity()
        }
    };

    Ok(SharedState {
        baseline,
        tests,
        title,
        id,
    })
}
