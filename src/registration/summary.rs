//! Summary formatter — renders a completed profile as the final report.

use super::model::{CompletedProfile, FounderProfile, ProgrammerProfile, SpecialtyLanguages};
use super::prompts::NOT_PROVIDED;

/// Render the completion report for `profile`.
pub fn format_summary(profile: &CompletedProfile) -> String {
    match profile {
        CompletedProfile::Programmer(p) => format_programmer(p),
        CompletedProfile::Founder(f) => format_founder(f),
    }
}

fn format_programmer(p: &ProgrammerProfile) -> String {
    format!(
        "Регистрация завершена!\n\
         Вы - Программист.\n\
         Имя: {}\n\
         Возраст: {}\n\
         Университет: {}\n\
         Факультет: {}\n\
         Специализации и языки:\n\
         {}\n\n\
         GitHub: {}\n\
         Резюме: {}\n\
         О себе: {}",
        p.name,
        p.age,
        p.university,
        p.faculty,
        specialty_listing(&p.specialties),
        p.github,
        p.resume,
        p.about,
    )
}

fn format_founder(f: &FounderProfile) -> String {
    format!(
        "Регистрация завершена!\n\
         Вы - Фаундер.\n\
         Имя: {}\n\
         Проект: {}",
        f.name, f.project,
    )
}

/// One `specialty: lang, lang` line per specialty, in selection order.
fn specialty_listing(specialties: &[SpecialtyLanguages]) -> String {
    if specialties.is_empty() {
        return NOT_PROVIDED.to_string();
    }
    specialties
        .iter()
        .map(|s| {
            let languages = if s.languages.is_empty() {
                NOT_PROVIDED.to_string()
            } else {
                s.languages.join(", ")
            };
            format!("{}: {}", s.specialty, languages)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
