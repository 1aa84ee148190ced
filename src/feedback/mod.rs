//! Feedback normalizer: asks the model for a reply, a summary and suggested
//! actions, and always hands back usable text.

pub mod parse;
pub mod prompt;

use crate::llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, warn};

pub use parse::{FeedbackFields, Parsed};

pub struct FeedbackNormalizer {
    generator: Arc<dyn TextGenerator>,
}

impl FeedbackNormalizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Produce reply, summary and actions for a review.
    ///
    /// Never fails: a call error or an unusable completion yields fallback text.
    pub async fn normalize(&self, rating: u8, review_text: &str) -> FeedbackFields {
        let prompt = prompt::build_prompt(rating, review_text);

        let completion = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(backend = self.generator.name(), error = %e, "Model call failed, using fallback feedback");
                return FeedbackFields::failure_fallback();
            }
        };

        match parse::parse_completion(&completion) {
            Parsed::Fields { fields, defaulted } => {
                if defaulted.is_empty() {
                    debug!(backend = self.generator.name(), "Parsed model feedback");
                } else {
                    warn!(
                        backend = self.generator.name(),
                        missing = ?defaulted,
                        "Model response lacked fields, substituted defaults"
                    );
                }
                fields
            }
            Parsed::Fallback { reason } => {
                warn!(
                    backend = self.generator.name(),
                    reason = %reason,
                    completion_len = completion.len(),
                    "Model response unusable, using fallback feedback"
                );
                FeedbackFields::failure_fallback()
            }
        }
    }
}
