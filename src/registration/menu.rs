//! Menu builder — the selectable options offered in each state.
//!
//! Menus are derived purely from the state, the draft and the catalog, so
//! they can be rebuilt at any point from session data alone.

use crate::config::IntakeCatalog;

use super::model::Draft;
use super::prompts;
use super::state::RegistrationState;

/// Ordered option labels for `state`. An empty list means free-text input
/// (the keyboard is removed).
pub fn menu_for(state: RegistrationState, draft: &Draft, catalog: &IntakeCatalog) -> Vec<String> {
    use RegistrationState::*;
    match state {
        Idle => main_menu(),
        ChoosingRole => vec![
            prompts::ROLE_PROGRAMMER.to_string(),
            prompts::ROLE_FOUNDER.to_string(),
        ],
        ProgrammerUniversity => catalog
            .universities
            .iter()
            .cloned()
            .chain(std::iter::once(catalog.unlisted_university.clone()))
            .collect(),
        ProgrammerSpecialty => with_done(catalog.specialty_names()),
        ChoosingLanguage => {
            let current = match draft {
                Draft::Programmer(p) => p.specialties.current(),
                _ => None,
            };
            language_menu(current, catalog)
        }
        optional if optional.is_optional() => vec![prompts::SKIP.to_string()],
        _ => Vec::new(),
    }
}

/// Languages offered for `specialty`, followed by the done sentinel.
///
/// A specialty missing from the catalog yields just the sentinel so the user
/// can always leave the loop.
pub fn language_menu(specialty: Option<&str>, catalog: &IntakeCatalog) -> Vec<String> {
    let languages = specialty
        .and_then(|s| catalog.languages_for(s))
        .unwrap_or_default();
    with_done(languages.iter().map(String::as_str))
}

pub fn main_menu() -> Vec<String> {
    vec![
        prompts::MENU_START.to_string(),
        prompts::MENU_REGISTRATION.to_string(),
    ]
}

fn with_done<'a>(options: impl Iterator<Item = &'a str>) -> Vec<String> {
    options
        .map(str::to_string)
        .chain(std::iter::once(prompts::DONE.to_string()))
        .collect()
}
