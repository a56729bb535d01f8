//! Form assistance: script pre-generation (subject + language → script →
//! search terms) and the voice catalogue.
//!
//! Fills the form record only; the task store is never touched.

use super::controller::Orchestrator;
use crate::error::ApiError;
use crate::form::{FormField, FormUpdateError};
use crate::model::{Notice, VoiceCatalog};
use tracing::{debug, error};

/// Script and terms produced by one pre-generation round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScriptDraft {
    pub script: String,
    pub terms: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AssistError {
    #[error("failed to generate video script")]
    Api(#[from] ApiError),
    #[error("failed to save generated script")]
    Form(#[from] FormUpdateError),
}

impl Orchestrator {
    /// Ask the backend for a script and matching search terms, then store both
    /// in the form. On any failure the previous form values are kept.
    pub async fn pregenerate_script(
        &self,
        subject: &str,
        language: &str,
    ) -> Result<ScriptDraft, AssistError> {
        match self.fetch_draft(subject, language).await {
            Ok(draft) => {
                let joined = draft.terms.join(",");
                let saved = self.form.set_values(&[
                    (FormField::VideoScript, draft.script.clone()),
                    (FormField::VideoTerms, joined),
                ]);
                if let Err(e) = saved {
                    error!(error = %e, "error saving generated script");
                    self.notify(Notice::ScriptFailed {
                        reason: e.to_string(),
                    });
                    return Err(e.into());
                }
                debug!(terms = draft.terms.len(), "video script generated");
                self.notify(Notice::ScriptGenerated);
                Ok(draft)
            }
            Err(e) => {
                error!(error = %e, "error generating video script");
                self.notify(Notice::ScriptFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Voices the backend offers for `modelName` / `voiceName`.
    pub async fn voice_catalog(&self) -> Result<VoiceCatalog, ApiError> {
        let catalog = self.api.voice_models().await?;
        debug!(models = catalog.models.len(), "voice catalogue loaded");
        Ok(catalog)
    }

    async fn fetch_draft(&self, subject: &str, language: &str) -> Result<ScriptDraft, ApiError> {
        let script = self.api.generate_script(subject, language).await?;
        let terms = self.api.get_search_terms(subject, &script, language).await?;
        Ok(ScriptDraft { script, terms })
    }
}
