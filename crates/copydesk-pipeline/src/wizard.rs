//! Multi-step session state for the content wizard.
//!
//! A session walks forward through intake, research, writing, review, and
//! export. Each transition has preconditions; rewinding clears every
//! artifact produced after the step rewound to, so a session can never
//! hold an article whose research was discarded.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use copydesk_core::template::DEFAULT_TEMPLATE_ID;
use copydesk_core::types::{GeneratedArticle, ResearchResult, Source};
use copydesk_core::validation::{self, ValidationError};

use crate::run::ExportReceipt;

/// Steps of the wizard, in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Intake,
    Research,
    Write,
    Review,
    Export,
    Done,
}

impl WizardStep {
    fn next(self) -> Option<Self> {
        match self {
            Self::Intake => Some(Self::Research),
            Self::Research => Some(Self::Write),
            Self::Write => Some(Self::Review),
            Self::Review => Some(Self::Export),
            Self::Export => Some(Self::Done),
            Self::Done => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Research => "research",
            Self::Write => "write",
            Self::Review => "review",
            Self::Export => "export",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("cannot advance from {from}: {reason}")]
    CannotAdvance {
        from: WizardStep,
        reason: &'static str,
    },

    #[error("cannot rewind from {from} to {to}")]
    CannotRewind { from: WizardStep, to: WizardStep },

    #[error("step {step} does not accept {action} any more")]
    StepClosed {
        step: WizardStep,
        action: &'static str,
    },

    #[error("no source with id {0} in this session")]
    UnknownSource(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One user's walk through the wizard.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSession {
    pub id: Uuid,
    pub step: WizardStep,
    pub topic: String,
    pub template_id: String,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research: Option<ResearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<GeneratedArticle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportReceipt>,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl WizardSession {
    /// Starts a fresh session at the intake step.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed topic.
    pub fn new(topic: &str, template_id: Option<String>) -> Result<Self, WizardError> {
        let topic = validation::validate_topic(topic)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            step: WizardStep::Intake,
            topic,
            template_id: template_id.unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string()),
            sources: Vec::new(),
            research: None,
            article: None,
            image_url: None,
            export: None,
            created_at: now,
            touched_at: now,
        })
    }

    pub fn touch(&mut self) {
        self.touched_at = Utc::now();
    }

    /// Whether the session has been idle for longer than `ttl_secs`.
    #[must_use]
    pub fn is_expired(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        let Ok(secs) = i64::try_from(ttl_secs) else {
            return false;
        };
        now - self.touched_at > ChronoDuration::seconds(secs)
    }

    /// Adds a normalized source. Only allowed while research has not run;
    /// once findings exist the source list they were computed from is
    /// frozen.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::StepClosed`] after research has been
    /// recorded and a validation error when the session is full.
    pub fn add_source(&mut self, source: Source) -> Result<(), WizardError> {
        if self.research.is_some() || self.step > WizardStep::Research {
            return Err(WizardError::StepClosed {
                step: self.step,
                action: "new sources",
            });
        }
        validation::validate_source_count(self.sources.len())?;
        self.sources.push(source);
        self.touch();
        Ok(())
    }

    /// Removes a source by id, under the same freeze rule as
    /// [`add_source`](Self::add_source).
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::UnknownSource`] when the id is not present.
    pub fn remove_source(&mut self, id: Uuid) -> Result<(), WizardError> {
        if self.research.is_some() || self.step > WizardStep::Research {
            return Err(WizardError::StepClosed {
                step: self.step,
                action: "source removal",
            });
        }
        let index = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or(WizardError::UnknownSource(id))?;
        self.sources.remove(index);
        self.touch();
        Ok(())
    }

    /// Moves the session one step forward, checking that the current step
    /// produced what the next one needs. Review to export is the approval
    /// gate: it requires both research and an article to be present.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::CannotAdvance`] with the unmet precondition.
    pub fn advance(&mut self) -> Result<WizardStep, WizardError> {
        let fail = |from, reason| Err(WizardError::CannotAdvance { from, reason });
        match self.step {
            WizardStep::Intake => {
                if self.sources.is_empty() {
                    return fail(self.step, "at least one source is required");
                }
            }
            WizardStep::Research => {
                if self.research.is_none() {
                    return fail(self.step, "research has not been recorded");
                }
            }
            WizardStep::Write => {
                if self.article.is_none() {
                    return fail(self.step, "no article has been generated");
                }
            }
            WizardStep::Review => {
                if self.research.is_none() || self.article.is_none() {
                    return fail(self.step, "approval needs both research and an article");
                }
            }
            WizardStep::Export => {
                if self.export.is_none() {
                    return fail(self.step, "the article has not been exported");
                }
            }
            WizardStep::Done => {
                return fail(self.step, "the session is finished");
            }
        }
        // `next` is Some for every non-Done step handled above.
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        self.touch();
        Ok(self.step)
    }

    /// Rewinds to an earlier step, discarding everything produced after
    /// it. A finished session cannot be reopened.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::CannotRewind`] for forward or same-step
    /// targets and for sessions already done.
    pub fn rewind(&mut self, to: WizardStep) -> Result<(), WizardError> {
        if self.step == WizardStep::Done || to >= self.step {
            return Err(WizardError::CannotRewind {
                from: self.step,
                to,
            });
        }
        if to < WizardStep::Write {
            self.research = None;
        }
        if to < WizardStep::Review {
            self.article = None;
            self.image_url = None;
        }
        self.export = None;
        self.step = to;
        self.touch();
        Ok(())
    }

    /// Stores research findings and moves the session to the write step.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::CannotAdvance`] when the session is not at
    /// the research step.
    pub fn record_research(&mut self, research: ResearchResult) -> Result<(), WizardError> {
        if self.step != WizardStep::Research {
            return Err(WizardError::CannotAdvance {
                from: self.step,
                reason: "research results belong to the research step",
            });
        }
        self.research = Some(research);
        self.step = WizardStep::Write;
        self.touch();
        Ok(())
    }

    /// Stores a generated article and moves the session to review.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::CannotAdvance`] when the session is not at
    /// the write step or research is missing.
    pub fn record_article(&mut self, article: GeneratedArticle) -> Result<(), WizardError> {
        if self.step != WizardStep::Write || self.research.is_none() {
            return Err(WizardError::CannotAdvance {
                from: self.step,
                reason: "an article can only follow completed research",
            });
        }
        self.article = Some(article);
        self.step = WizardStep::Review;
        self.touch();
        Ok(())
    }

    /// Stores the export receipt and finishes the session.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::CannotAdvance`] when the session is not at
    /// the export step.
    pub fn record_export(&mut self, receipt: ExportReceipt) -> Result<(), WizardError> {
        if self.step != WizardStep::Export {
            return Err(WizardError::CannotAdvance {
                from: self.step,
                reason: "the article has not been approved for export",
            });
        }
        self.image_url.clone_from(&receipt.image_url);
        self.export = Some(receipt);
        self.step = WizardStep::Done;
        self.touch();
        Ok(())
    }
}
