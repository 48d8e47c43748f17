//! Registration state machine — per-state input handlers.
//!
//! Every handler is a pure function of the current session and the inbound
//! message. It returns the next session together with the reply to send;
//! nothing here touches the store or the network, so a turn can be
//! replayed or tested without a transport.

use std::collections::HashMap;

use crate::channels::{ContentType, IncomingMessage, Keyboard, OutgoingResponse};
use crate::config::{IntakeCatalog, UnexpectedInputPolicy};

use super::menu::{main_menu, menu_for};
use super::model::{CompletedProfile, Draft, OptionalAnswer, Role, Session};
use super::prompts;
use super::state::RegistrationState;
use super::summary::format_summary;

/// What the dispatcher should send after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply(OutgoingResponse),
    /// Nothing to send.
    Silent,
}

/// How a turn affected the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Moved on to the next question.
    Advanced,
    /// Stayed in a multi-select step and recorded the selection.
    Accumulated,
    /// Input failed validation; same state, nothing recorded.
    Rejected,
    /// The user picked an option that ends the flow early.
    Aborted,
    /// The profile is complete and the summary is being sent.
    Completed,
    /// Input was dropped without a reply.
    Ignored,
    /// The session was reset by a command or an inconsistency.
    Reset,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Advanced => "advanced",
            Self::Accumulated => "accumulated",
            Self::Rejected => "rejected",
            Self::Aborted => "aborted",
            Self::Completed => "completed",
            Self::Ignored => "ignored",
            Self::Reset => "reset",
        };
        write!(f, "{s}")
    }
}

/// Result of a single turn.
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub effect: Effect,
    pub kind: TransitionKind,
    /// Set when the turn completed a registration.
    pub completed: Option<CompletedProfile>,
}

impl Transition {
    fn new(session: Session, effect: Effect, kind: TransitionKind) -> Self {
        Self {
            session,
            effect,
            kind,
            completed: None,
        }
    }

    /// The reply, if the turn produced one.
    pub fn reply(&self) -> Option<&OutgoingResponse> {
        match &self.effect {
            Effect::Reply(response) => Some(response),
            Effect::Silent => None,
        }
    }
}

/// Read-only inputs shared by all handlers.
#[derive(Debug, Clone)]
pub struct MachineContext {
    pub catalog: IntakeCatalog,
    pub unexpected_input: UnexpectedInputPolicy,
}

/// A per-state input handler.
pub type Handler = fn(&MachineContext, Session, &IncomingMessage) -> Transition;

/// Commands honoured in every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Cancel,
    Register,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        // Unlike a plain greeting, `/start` and `Start` also drop any in-flight registration
        // Telegram may append the bot name ("/start@my_bot") or a payload
        let word = text.split_whitespace().next()?;
        let command = word.split('@').next().unwrap_or(word);
        match command {
            prompts::COMMAND_START => return Some(Self::Start),
            prompts::COMMAND_CANCEL => return Some(Self::Cancel),
            _ => {}
        }
        match text {
            prompts::MENU_START => Some(Self::Start),
            prompts::MENU_REGISTRATION => Some(Self::Register),
            _ => None,
        }
    }
}

/// The registration dialogue: a handler table keyed by state, built once.
pub struct StateMachine {
    context: MachineContext,
    handlers: HashMap<RegistrationState, Handler>,
}

impl StateMachine {
    pub fn new(catalog: IntakeCatalog, unexpected_input: UnexpectedInputPolicy) -> Self {
        use RegistrationState::*;
        let handlers: HashMap<RegistrationState, Handler> = HashMap::from([
            (Idle, handle_idle as Handler),
            (ChoosingRole, handle_choosing_role),
            (ProgrammerName, handle_programmer_name),
            (ProgrammerAge, handle_programmer_age),
            (ProgrammerUniversity, handle_programmer_university),
            (ProgrammerFaculty, handle_programmer_faculty),
            (ProgrammerPhoto, handle_programmer_photo),
            (ProgrammerSpecialty, handle_programmer_specialty),
            (ChoosingLanguage, handle_choosing_language),
            (GithubLink, handle_github_link),
            (ResumeLink, handle_resume_link),
            (AboutMe, handle_about_me),
            (FounderName, handle_founder_name),
            (FounderProject, handle_founder_project),
        ]);

        Self {
            context: MachineContext {
                catalog,
                unexpected_input,
            },
            handlers,
        }
    }

    pub fn has_handler(&self, state: RegistrationState) -> bool {
        self.handlers.contains_key(&state)
    }

    /// Run one turn: global commands first, then the current state's handler.
    pub fn handle(&self, session: Session, msg: &IncomingMessage) -> Transition {
        if let Some(command) = msg.text().and_then(Command::parse) {
            return self.context.run_command(command, session);
        }

        match self.handlers.get(&session.state) {
            Some(handler) => handler(&self.context, session, msg),
            None => {
                tracing::error!(state = %session.state, "No handler registered for state");
                self.context.restart(session, "unhandled state")
            }
        }
    }

    /// The question for the session's current state, with its menu.
    pub fn prompt(&self, session: &Session) -> OutgoingResponse {
        self.context.respond(session, prompt_text(session))
    }
}

impl MachineContext {
    fn menu(&self, session: &Session) -> Keyboard {
        Keyboard::from_options(menu_for(session.state, &session.draft, &self.catalog))
    }

    fn respond(&self, session: &Session, text: impl Into<String>) -> OutgoingResponse {
        OutgoingResponse::text(text).with_keyboard(self.menu(session))
    }

    /// Move to `next` and ask its question.
    fn enter(
        &self,
        mut session: Session,
        next: RegistrationState,
        text: impl Into<String>,
    ) -> Transition {
        debug_assert!(session.state.can_transition_to(next));
        session.state = next;
        let reply = self.respond(&session, text);
        Transition::new(session, Effect::Reply(reply), TransitionKind::Advanced)
    }

    /// Stay in the current state after recording a selection.
    fn accumulate(&self, session: Session, text: impl Into<String>) -> Transition {
        debug_assert!(session.state.is_multi_select());
        let reply = self.respond(&session, text);
        Transition::new(session, Effect::Reply(reply), TransitionKind::Accumulated)
    }

    /// Stay in the current state without recording anything.
    fn reject(&self, session: Session, text: impl Into<String>) -> Transition {
        let reply = self.respond(&session, text);
        Transition::new(session, Effect::Reply(reply), TransitionKind::Rejected)
    }

    /// Input of a content type the state cannot use.
    ///
    /// Blank text where text is expected is a failed answer, not a wrong
    /// content type, and is always re-prompted.
    fn unexpected(&self, session: Session, msg: &IncomingMessage) -> Transition {
        let waits_for_text =
            session.state != RegistrationState::Idle && !session.state.expects_photo();
        if waits_for_text && msg.content_type == ContentType::Text {
            let text = prompt_text(&session);
            return self.reject(session, text);
        }

        tracing::debug!(
            state = %session.state,
            expected = if session.state.expects_photo() { "photo" } else { "text" },
            content_type = %msg.content_type,
            policy = ?self.unexpected_input,
            "Unexpected input"
        );
        match self.unexpected_input {
            UnexpectedInputPolicy::Ignore => {
                Transition::new(session, Effect::Silent, TransitionKind::Ignored)
            }
            UnexpectedInputPolicy::Reprompt => {
                let text = prompt_text(&session);
                self.reject(session, text)
            }
        }
    }

    /// Clear the session and send `text` with the main menu.
    fn reset_with(&self, session: Session, text: &str, kind: TransitionKind) -> Transition {
        let reply = OutgoingResponse::text(text).with_keyboard(Keyboard::Options(main_menu()));
        Transition::new(session.reset(), Effect::Reply(reply), kind)
    }

    /// Recover from a session whose draft does not match its state.
    fn restart(&self, session: Session, reason: &str) -> Transition {
        tracing::error!(
            user = %session.user_id,
            state = %session.state,
            reason,
            "Inconsistent registration session, resetting"
        );
        self.reset_with(session, prompts::RESTART_REQUIRED, TransitionKind::Reset)
    }

    fn complete(&self, session: Session, profile: CompletedProfile) -> Transition {
        let summary = format_summary(&profile);
        let keyboard = Keyboard::Options(main_menu());
        let reply = match &profile {
            CompletedProfile::Programmer(p) => OutgoingResponse::photo(&p.photo, summary),
            CompletedProfile::Founder(_) => OutgoingResponse::text(summary),
        }
        .with_keyboard(keyboard);

        tracing::info!(user = %session.user_id, role = ?profile.role(), "Registration completed");

        let mut transition =
            Transition::new(session.reset(), Effect::Reply(reply), TransitionKind::Completed);
        transition.completed = Some(profile);
        transition
    }

    fn run_command(&self, command: Command, session: Session) -> Transition {
        match command {
            Command::Start => self.reset_with(session, prompts::GREETING, TransitionKind::Reset),
            Command::Cancel => self.reset_with(session, prompts::CANCELLED, TransitionKind::Reset),
            Command::Register => {
                let session = session.reset();
                self.enter(session, RegistrationState::ChoosingRole, prompts::ASK_ROLE)
            }
        }
    }
}

/// The question asked on entering `session.state`.
fn prompt_text(session: &Session) -> String {
    use RegistrationState::*;
    match session.state {
        Idle => prompts::IDLE_HINT.to_string(),
        ChoosingRole => prompts::ASK_ROLE.to_string(),
        ProgrammerName | FounderName => prompts::ASK_NAME.to_string(),
        ProgrammerAge => prompts::ASK_AGE.to_string(),
        ProgrammerUniversity => prompts::ASK_UNIVERSITY.to_string(),
        ProgrammerFaculty => prompts::ASK_FACULTY.to_string(),
        ProgrammerPhoto => prompts::ASK_PHOTO.to_string(),
        ProgrammerSpecialty => prompts::ASK_SPECIALTIES.to_string(),
        ChoosingLanguage => match &session.draft {
            Draft::Programmer(p) => p
                .specialties
                .current()
                .map(prompts::ask_languages)
                .unwrap_or_else(|| prompts::ASK_GITHUB.to_string()),
            _ => prompts::ASK_SPECIALTIES.to_string(),
        },
        GithubLink => prompts::ASK_GITHUB.to_string(),
        ResumeLink => prompts::ASK_RESUME.to_string(),
        AboutMe => prompts::ASK_ABOUT.to_string(),
        FounderProject => prompts::ASK_PROJECT.to_string(),
    }
}

/// How an age answer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgeInput {
    Valid(u32),
    NotANumber,
    /// All digits, but too large to be an age.
    OutOfRange,
}

/// A non-negative whole number written with ASCII digits only.
fn parse_age(text: &str) -> AgeInput {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return AgeInput::NotANumber;
    }
    match text.parse() {
        Ok(age) => AgeInput::Valid(age),
        Err(_) => AgeInput::OutOfRange,
    }
}

// ── Handlers ────────────────────────────────────────────────────────

fn handle_idle(ctx: &MachineContext, session: Session, msg: &IncomingMessage) -> Transition {
    ctx.unexpected(session, msg)
}

fn handle_choosing_role(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Some(role) = Role::from_label(text) else {
        return ctx.reject(session, prompts::INVALID_ROLE);
    };

    session.draft = Draft::for_role(role);
    let next = match role {
        Role::Programmer => RegistrationState::ProgrammerName,
        Role::Founder => RegistrationState::FounderName,
    };
    ctx.enter(session, next, prompts::ask_name_for(role.label()))
}

fn handle_programmer_name(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.name = Some(text.to_string());
    ctx.enter(session, RegistrationState::ProgrammerAge, prompts::ASK_AGE)
}

fn handle_programmer_age(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let age = match parse_age(text) {
        AgeInput::Valid(age) => age,
        AgeInput::NotANumber => return ctx.reject(session, prompts::INVALID_AGE),
        AgeInput::OutOfRange => return ctx.reject(session, prompts::AGE_OUT_OF_RANGE),
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.age = Some(age);
    ctx.enter(session, RegistrationState::ProgrammerUniversity, prompts::ASK_UNIVERSITY)
}

fn handle_programmer_university(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };

    if text == ctx.catalog.unlisted_university {
        tracing::info!(user = %session.user_id, "Unsupported university, ending registration");
        return ctx.reset_with(session, prompts::UNSUPPORTED_UNIVERSITY, TransitionKind::Aborted);
    }
    if !ctx.catalog.is_supported_university(text) {
        return ctx.reject(session, prompts::INVALID_CHOICE);
    }

    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.university = Some(text.to_string());
    ctx.enter(session, RegistrationState::ProgrammerFaculty, prompts::ASK_FACULTY)
}

fn handle_programmer_faculty(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.faculty = Some(text.to_string());
    ctx.enter(session, RegistrationState::ProgrammerPhoto, prompts::ASK_PHOTO)
}

fn handle_programmer_photo(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(photo) = msg.largest_photo() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.photo = Some(photo.file_id.clone());
    ctx.enter(session, RegistrationState::ProgrammerSpecialty, prompts::ASK_SPECIALTIES)
}

fn handle_programmer_specialty(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };

    if text == prompts::DONE {
        return match draft.specialties.current().map(prompts::ask_languages) {
            Some(question) => ctx.enter(session, RegistrationState::ChoosingLanguage, question),
            None => ctx.enter(session, RegistrationState::GithubLink, prompts::ASK_GITHUB),
        };
    }

    if !ctx.catalog.is_specialty(text) {
        return ctx.reject(session, prompts::INVALID_CHOICE);
    }
    // Re-selecting is a no-op but still acknowledged
    draft.specialties.select(text);
    ctx.accumulate(session, prompts::specialty_added(text))
}

fn handle_choosing_language(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };

    if text == prompts::DONE {
        return match draft.specialties.finish_current().map(prompts::ask_languages) {
            Some(question) => {
                let reply = ctx.respond(&session, question);
                Transition::new(session, Effect::Reply(reply), TransitionKind::Advanced)
            }
            None => ctx.enter(session, RegistrationState::GithubLink, prompts::ASK_GITHUB),
        };
    }

    let offered = draft
        .specialties
        .current()
        .and_then(|s| ctx.catalog.languages_for(s))
        .is_some_and(|languages| languages.iter().any(|l| l == text));
    if !offered {
        return ctx.reject(session, prompts::INVALID_CHOICE);
    }
    draft.specialties.add_language(text);
    ctx.accumulate(session, prompts::language_added(text))
}

fn handle_github_link(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.github = Some(OptionalAnswer::from_input(text));
    ctx.enter(session, RegistrationState::ResumeLink, prompts::ASK_RESUME)
}

fn handle_resume_link(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(draft) = &mut session.draft else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.resume = Some(OptionalAnswer::from_input(text));
    ctx.enter(session, RegistrationState::AboutMe, prompts::ASK_ABOUT)
}

fn handle_about_me(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Programmer(mut draft) = std::mem::take(&mut session.draft) else {
        return ctx.restart(session, "programmer draft missing");
    };
    draft.about = Some(OptionalAnswer::from_input(text));

    match draft.into_profile() {
        Ok(profile) => ctx.complete(session, CompletedProfile::Programmer(profile)),
        Err(e) => ctx.restart(session, &e.to_string()),
    }
}

fn handle_founder_name(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Founder(draft) = &mut session.draft else {
        return ctx.restart(session, "founder draft missing");
    };
    draft.name = Some(text.to_string());
    ctx.enter(session, RegistrationState::FounderProject, prompts::ASK_PROJECT)
}

fn handle_founder_project(
    ctx: &MachineContext,
    mut session: Session,
    msg: &IncomingMessage,
) -> Transition {
    let Some(text) = msg.text() else {
        return ctx.unexpected(session, msg);
    };
    let Draft::Founder(mut draft) = std::mem::take(&mut session.draft) else {
        return ctx.restart(session, "founder draft missing");
    };
    draft.project = Some(text.to_string());

    match draft.into_profile() {
        Ok(profile) => ctx.complete(session, CompletedProfile::Founder(profile)),
        Err(e) => ctx.restart(session, &e.to_string()),
    }
}
