//! Registration state machine — the enumerated dialogue states and the
//! transitions allowed between them.

use serde::{Deserialize, Serialize};

/// The states of the registration dialogue.
///
/// Programmer branch: ChoosingRole → ProgrammerName → ProgrammerAge →
/// ProgrammerUniversity → ProgrammerFaculty → ProgrammerPhoto →
/// ProgrammerSpecialty ⟲ → ChoosingLanguage ⟲ → GithubLink → ResumeLink →
/// AboutMe → Idle.
///
/// Founder branch: ChoosingRole → FounderName → FounderProject → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    #[default]
    Idle,
    ChoosingRole,
    ProgrammerName,
    ProgrammerAge,
    ProgrammerUniversity,
    ProgrammerFaculty,
    ProgrammerPhoto,
    ProgrammerSpecialty,
    ChoosingLanguage,
    GithubLink,
    ResumeLink,
    AboutMe,
    FounderName,
    FounderProject,
}

impl RegistrationState {
    pub const ALL: [RegistrationState; 14] = [
        Self::Idle,
        Self::ChoosingRole,
        Self::ProgrammerName,
        Self::ProgrammerAge,
        Self::ProgrammerUniversity,
        Self::ProgrammerFaculty,
        Self::ProgrammerPhoto,
        Self::ProgrammerSpecialty,
        Self::ChoosingLanguage,
        Self::GithubLink,
        Self::ResumeLink,
        Self::AboutMe,
        Self::FounderName,
        Self::FounderProject,
    ];

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying put (re-prompt, multi-select accumulation) and returning to
    /// `Idle` (completion, early exit, reset) are valid from every state.
    pub fn can_transition_to(&self, target: RegistrationState) -> bool {
        use RegistrationState::*;
        if *self == target || target == Idle {
            return true;
        }
        matches!(
            (self, target),
            (_, ChoosingRole)
                | (ChoosingRole, ProgrammerName)
                | (ChoosingRole, FounderName)
                | (ProgrammerName, ProgrammerAge)
                | (ProgrammerAge, ProgrammerUniversity)
                | (ProgrammerUniversity, ProgrammerFaculty)
                | (ProgrammerFaculty, ProgrammerPhoto)
                | (ProgrammerPhoto, ProgrammerSpecialty)
                | (ProgrammerSpecialty, ChoosingLanguage)
                | (ProgrammerSpecialty, GithubLink)
                | (ChoosingLanguage, GithubLink)
                | (GithubLink, ResumeLink)
                | (ResumeLink, AboutMe)
                | (FounderName, FounderProject)
        )
    }

    /// Whether this state offers a repeated selection closed by the done
    /// sentinel.
    pub fn is_multi_select(&self) -> bool {
        matches!(self, Self::ProgrammerSpecialty | Self::ChoosingLanguage)
    }

    /// Whether this state accepts the skip sentinel.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::GithubLink | Self::ResumeLink | Self::AboutMe)
    }

    /// Whether the state expects a photo rather than text.
    pub fn expects_photo(&self) -> bool {
        matches!(self, Self::ProgrammerPhoto)
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ChoosingRole => "choosing_role",
            Self::ProgrammerName => "programmer_name",
            Self::ProgrammerAge => "programmer_age",
            Self::ProgrammerUniversity => "programmer_university",
            Self::ProgrammerFaculty => "programmer_faculty",
            Self::ProgrammerPhoto => "programmer_photo",
            Self::ProgrammerSpecialty => "programmer_specialty",
            Self::ChoosingLanguage => "choosing_language",
            Self::GithubLink => "github_link",
            Self::ResumeLink => "resume_link",
            Self::AboutMe => "about_me",
            Self::FounderName => "founder_name",
            Self::FounderProject => "founder_project",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmer_path_is_valid() {
        use RegistrationState::*;
        let path = [
            Idle,
            ChoosingRole,
            ProgrammerName,
            ProgrammerAge,
            ProgrammerUniversity,
            ProgrammerFaculty,
            ProgrammerPhoto,
            ProgrammerSpecialty,
            ChoosingLanguage,
            GithubLink,
            ResumeLink,
            AboutMe,
            Idle,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} should transition to {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn founder_path_is_valid() {
        use RegistrationState::*;
        assert!(ChoosingRole.can_transition_to(FounderName));
        assert!(FounderName.can_transition_to(FounderProject));
        assert!(FounderProject.can_transition_to(Idle));
    }

    #[test]
    fn empty_specialty_selection_may_skip_languages() {
        use RegistrationState::*;
        assert!(ProgrammerSpecialty.can_transition_to(GithubLink));
    }

    #[test]
    fn invalid_transitions() {
        use RegistrationState::*;
        // Skip states
        assert!(!ProgrammerName.can_transition_to(ProgrammerUniversity));
        assert!(!ProgrammerPhoto.can_transition_to(ChoosingLanguage));
        // Go backward
        assert!(!ProgrammerAge.can_transition_to(ProgrammerName));
        assert!(!ChoosingLanguage.can_transition_to(ProgrammerSpecialty));
        // Cross branches
        assert!(!FounderName.can_transition_to(ProgrammerAge));
        assert!(!ProgrammerName.can_transition_to(FounderProject));
        assert!(!Idle.can_transition_to(ProgrammerName));
    }

    #[test]
    fn every_state_can_reset_and_restart() {
        for state in RegistrationState::ALL {
            assert!(state.can_transition_to(RegistrationState::Idle));
            assert!(state.can_transition_to(RegistrationState::ChoosingRole));
            assert!(state.can_transition_to(state), "{state} must allow re-prompt");
        }
    }

    #[test]
    fn display_matches_serde() {
        for state in RegistrationState::ALL {
            let display = format!("{state}");
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(
                format!("\"{display}\""),
                json,
                "Display and serde should match for {state:?}"
            );
        }
    }

    #[test]
    fn state_classification() {
        use RegistrationState::*;
        assert!(ProgrammerSpecialty.is_multi_select());
        assert!(ChoosingLanguage.is_multi_select());
        assert!(!GithubLink.is_multi_select());
        assert!(GithubLink.is_optional() && ResumeLink.is_optional() && AboutMe.is_optional());
        assert!(!ProgrammerFaculty.is_optional());
        assert!(ProgrammerPhoto.expects_photo());
        assert!(!ProgrammerName.expects_photo());
    }

    #[test]
    fn default_is_idle() {
        assert_eq!(RegistrationState::default(), RegistrationState::Idle);
    }
}
