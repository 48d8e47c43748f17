//! User-facing texts and reserved control words of the registration flow.

/// Ends a multi-select step.
pub const DONE: &str = "Готово ✅";
/// Leaves an optional field empty.
pub const SKIP: &str = "Пропустить";
/// Rendered in the summary for anything the user did not provide.
pub const NOT_PROVIDED: &str = "Не указано";

pub const ROLE_PROGRAMMER: &str = "Программист";
pub const ROLE_FOUNDER: &str = "Фаундер";

/// Main menu buttons.
pub const MENU_START: &str = "Start";
pub const MENU_REGISTRATION: &str = "Registration";

pub const COMMAND_START: &str = "/start";
pub const COMMAND_CANCEL: &str = "/cancel";

/// Whether `label` carries control meaning and so cannot be a catalog option.
pub fn is_reserved(label: &str) -> bool {
    [
        DONE,
        SKIP,
        ROLE_PROGRAMMER,
        ROLE_FOUNDER,
        MENU_START,
        MENU_REGISTRATION,
        COMMAND_START,
        COMMAND_CANCEL,
    ]
    .contains(&label)
}

pub const GREETING: &str = "Привет! Я твой бот и готов работать.";
pub const CANCELLED: &str =
    "Регистрация отменена. Нажмите 'Registration', чтобы начать заново.";
pub const IDLE_HINT: &str = "Нажмите 'Registration', чтобы начать регистрацию.";
pub const RESTART_REQUIRED: &str =
    "Что-то пошло не так, и регистрацию придётся начать заново. Нажмите 'Registration'.";

pub const ASK_ROLE: &str = "Выберите вашу роль:";
pub const INVALID_ROLE: &str =
    "Пожалуйста, выберите одну из предложенных ролей: Программист или Фаундер.";

pub const ASK_NAME: &str = "Пожалуйста, введите ваше имя:";
pub const ASK_AGE: &str = "Пожалуйста, введите ваш возраст:";
pub const INVALID_AGE: &str = "Пожалуйста, введите числовое значение возраста.";
pub const AGE_OUT_OF_RANGE: &str =
    "Такой возраст не похож на настоящий, введите реальное значение.";
pub const ASK_UNIVERSITY: &str = "Пожалуйста, выберите ваш университет:";
pub const INVALID_CHOICE: &str = "Пожалуйста, выберите один из предложенных вариантов.";
pub const UNSUPPORTED_UNIVERSITY: &str = "Сейчас мы находимся в beta режиме, пока продукт \
доступен только для студентов НИУ ВШЭ, но скоро мы откроем доступ и для вашего вуза! \
Спасибо за понимание!";
pub const ASK_FACULTY: &str = "Пожалуйста, укажите ваш факультет:";
pub const ASK_PHOTO: &str = "Пожалуйста, отправьте ваше фото для профиля:";
pub const ASK_SPECIALTIES: &str =
    "Выберите одну или несколько специальностей (нажмите 'Готово ✅', когда закончите):";
pub const ASK_GITHUB: &str = "Введите ссылку на GitHub или нажмите 'Пропустить'";
pub const ASK_RESUME: &str = "Введите ссылку на резюме или нажмите 'Пропустить'";
pub const ASK_ABOUT: &str = "Расскажите немного о себе или нажмите 'Пропустить'";

pub const ASK_PROJECT: &str = "Расскажите о вашем проекте:";

pub fn ask_name_for(role_label: &str) -> String {
    format!("Вы выбрали {role_label}. {ASK_NAME}")
}

pub fn specialty_added(specialty: &str) -> String {
    format!("Специальность '{specialty}' добавлена. Выберите еще или нажмите '{DONE}'.")
}

pub fn ask_languages(specialty: &str) -> String {
    format!("Выберите языки для направления '{specialty}' (нажмите '{DONE}', когда закончите):")
}

pub fn language_added(language: &str) -> String {
    format!("Язык '{language}' добавлен. Выберите еще или нажмите '{DONE}'.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_reserved() {
        assert!(is_reserved(DONE));
        assert!(is_reserved(SKIP));
        assert!(is_reserved(MENU_REGISTRATION));
        assert!(!is_reserved("Python"));
        assert!(!is_reserved(NOT_PROVIDED));
    }

    #[test]
    fn dynamic_prompts_quote_the_label() {
        assert!(specialty_added("ML-разработка").contains("'ML-разработка'"));
        assert!(ask_languages("back-разработка").contains("'back-разработка'"));
        assert!(language_added("Go").starts_with("Язык 'Go'"));
        assert!(ask_name_for(ROLE_FOUNDER).starts_with("Вы выбрали Фаундер."));
    }
}
