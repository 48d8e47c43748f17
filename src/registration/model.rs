//! Session, draft and profile data models.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::state::RegistrationState;

/// Which branch of the dialogue the user chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Programmer,
    Founder,
}

impl Role {
    /// Parse a role button label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            prompts::ROLE_PROGRAMMER => Some(Self::Programmer),
            prompts::ROLE_FOUNDER => Some(Self::Founder),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Programmer => prompts::ROLE_PROGRAMMER,
            Self::Founder => prompts::ROLE_FOUNDER,
        }
    }
}

/// Answer to an optional question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalAnswer {
    Provided(String),
    NotProvided,
}

impl OptionalAnswer {
    /// Interpret raw input: the skip sentinel means nothing was provided.
    pub fn from_input(text: &str) -> Self {
        if text == prompts::SKIP {
            Self::NotProvided
        } else {
            Self::Provided(text.to_string())
        }
    }
}

impl std::fmt::Display for OptionalAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provided(s) => write!(f, "{s}"),
            Self::NotProvided => write!(f, "{}", prompts::NOT_PROVIDED),
        }
    }
}

/// A chosen specialty with the languages chosen for it, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtyLanguages {
    pub specialty: String,
    pub languages: Vec<String>,
}

/// The specialty multi-select and its nested per-specialty language loop.
///
/// Every selected specialty gets an (initially empty) language list as soon
/// as it is selected. `pending` holds the specialties whose language loop
/// has not finished yet; its front is the one currently being asked about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtySelection {
    chosen: Vec<SpecialtyLanguages>,
    pending: VecDeque<String>,
}

impl SpecialtySelection {
    /// Add a specialty. Returns false if it was already selected.
    pub fn select(&mut self, specialty: &str) -> bool {
        if self.chosen.iter().any(|c| c.specialty == specialty) {
            return false;
        }
        self.chosen.push(SpecialtyLanguages {
            specialty: specialty.to_string(),
            languages: Vec::new(),
        });
        self.pending.push_back(specialty.to_string());
        true
    }

    /// The specialty whose languages are being collected.
    pub fn current(&self) -> Option<&str> {
        self.pending.front().map(String::as_str)
    }

    /// Add a language to the current specialty. Returns false if there is no
    /// current specialty or the language was already chosen.
    pub fn add_language(&mut self, language: &str) -> bool {
        let Some(current) = self.pending.front() else {
            return false;
        };
        let Some(entry) = self.chosen.iter_mut().find(|c| &c.specialty == current) else {
            return false;
        };
        if entry.languages.iter().any(|l| l == language) {
            return false;
        }
        entry.languages.push(language.to_string());
        true
    }

    /// Close the current specialty's language loop and return the next
    /// specialty to ask about, if any.
    pub fn finish_current(&mut self) -> Option<&str> {
        self.pending.pop_front();
        self.current()
    }

    pub fn chosen(&self) -> &[SpecialtyLanguages] {
        &self.chosen
    }

    pub fn languages_of(&self, specialty: &str) -> Option<&[String]> {
        self.chosen
            .iter()
            .find(|c| c.specialty == specialty)
            .map(|c| c.languages.as_slice())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// Answers collected on the programmer branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammerDraft {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub university: Option<String>,
    pub faculty: Option<String>,
    /// Platform reference of the largest photo variant.
    pub photo: Option<String>,
    pub specialties: SpecialtySelection,
    pub github: Option<OptionalAnswer>,
    pub resume: Option<OptionalAnswer>,
    pub about: Option<OptionalAnswer>,
}

impl ProgrammerDraft {
    /// Build the final profile; fails if a required answer is missing.
    pub fn into_profile(self) -> Result<ProgrammerProfile, IncompleteDraft> {
        let missing = |field: &'static str| IncompleteDraft { field };
        Ok(ProgrammerProfile {
            name: self.name.ok_or_else(|| missing("name"))?,
            age: self.age.ok_or_else(|| missing("age"))?,
            university: self.university.ok_or_else(|| missing("university"))?,
            faculty: self.faculty.ok_or_else(|| missing("faculty"))?,
            photo: self.photo.ok_or_else(|| missing("photo"))?,
            specialties: self.specialties.chosen,
            github: self.github.unwrap_or(OptionalAnswer::NotProvided),
            resume: self.resume.unwrap_or(OptionalAnswer::NotProvided),
            about: self.about.unwrap_or(OptionalAnswer::NotProvided),
        })
    }
}

/// Answers collected on the founder branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FounderDraft {
    pub name: Option<String>,
    pub project: Option<String>,
}

impl FounderDraft {
    pub fn into_profile(self) -> Result<FounderProfile, IncompleteDraft> {
        Ok(FounderProfile {
            name: self.name.ok_or(IncompleteDraft { field: "name" })?,
            project: self.project.ok_or(IncompleteDraft { field: "project" })?,
        })
    }
}

/// Accumulated answers; the variant fixes the role for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Draft {
    #[default]
    Empty,
    Programmer(ProgrammerDraft),
    Founder(FounderDraft),
}

impl Draft {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Programmer => Self::Programmer(ProgrammerDraft::default()),
            Role::Founder => Self::Founder(FounderDraft::default()),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Empty => None,
            Self::Programmer(_) => Some(Role::Programmer),
            Self::Founder(_) => Some(Role::Founder),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Per-user conversation state plus accumulated answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub state: RegistrationState,
    pub draft: Draft,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: RegistrationState::Idle,
            draft: Draft::Empty,
            updated_at: Utc::now(),
        }
    }

    /// Drop all answers and return to `Idle`.
    pub fn reset(self) -> Self {
        Self::new(self.user_id)
    }

    /// Whether there is nothing worth keeping in the store.
    pub fn is_blank(&self) -> bool {
        self.state == RegistrationState::Idle && self.draft.is_empty()
    }
}

/// Final programmer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammerProfile {
    pub name: String,
    pub age: u32,
    pub university: String,
    pub faculty: String,
    pub photo: String,
    pub specialties: Vec<SpecialtyLanguages>,
    pub github: OptionalAnswer,
    pub resume: OptionalAnswer,
    pub about: OptionalAnswer,
}

/// Final founder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FounderProfile {
    pub name: String,
    pub project: String,
}

/// The terminal record produced when a registration completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum CompletedProfile {
    Programmer(ProgrammerProfile),
    Founder(FounderProfile),
}

impl CompletedProfile {
    pub fn role(&self) -> Role {
        match self {
            Self::Programmer(_) => Role::Programmer,
            Self::Founder(_) => Role::Founder,
        }
    }
}

/// A draft reached completion without a required answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("registration draft is missing `{field}`")]
pub struct IncompleteDraft {
    pub field: &'static str,
}
