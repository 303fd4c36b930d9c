/// Pre-call input validation
///
/// Runs in the transport layer before the services are invoked. Each function
/// checks every field and reports all offending ones in a single
/// `ValidationErrors`.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::dictionary::{GroupListing, Translation, WordLookup};
use crate::error::ValidationErrors;
use crate::users::UserRole;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_LOCAL_PART_LENGTH: usize = 64;
/// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_BYTES: usize = 72;
const MAX_NAME_LENGTH: usize = 200;
const MAX_WORD_LENGTH: usize = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();
}

/// Canonical form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        errors.add("email", "Email is required");
        return;
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        errors.add(
            "email",
            format!("Email is too long (maximum {} characters)", MAX_EMAIL_LENGTH),
        );
        return;
    }
    let local_part_too_long = trimmed
        .split_once('@')
        .map(|(local, _)| local.len() > MAX_LOCAL_PART_LENGTH)
        .unwrap_or(false);
    if local_part_too_long || !EMAIL_REGEX.is_match(trimmed) {
        errors.add("email", "Email must be a valid email address");
    }
}

fn check_new_password(field: &'static str, password: &str, errors: &mut ValidationErrors) {
    if password.is_empty() {
        errors.add(field, "Password is required");
    } else if password.len() > MAX_PASSWORD_BYTES {
        errors.add(
            field,
            format!("Password is too long (maximum {} bytes)", MAX_PASSWORD_BYTES),
        );
    }
}

fn check_confirmation(
    field: &'static str,
    password: &str,
    confirmation: &str,
    errors: &mut ValidationErrors,
) {
    if password != confirmation {
        errors.add(field, "Passwords do not match");
    }
}

/// Registration payload. Returns the normalised email.
pub fn validate_registration(
    email: &str,
    password: &str,
    password_confirm: &str,
) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(email, &mut errors);
    check_new_password("password", password, &mut errors);
    check_confirmation("passwordConfirm", password, password_confirm, &mut errors);
    errors.into_result()?;

    Ok(normalize_email(email))
}

/// Login payload. Only presence and shape are checked; strength rules are
/// not applied so that older accounts can still sign in.
pub fn validate_login(email: &str, password: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(email, &mut errors);
    if password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()?;

    Ok(normalize_email(email))
}

pub fn validate_password_change(
    current_password: &str,
    new_password: &str,
    new_password_confirm: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if current_password.is_empty() {
        errors.add("currentPassword", "Password is required");
    }
    check_new_password("newPassword", new_password, &mut errors);
    check_confirmation(
        "newPasswordConfirm",
        new_password,
        new_password_confirm,
        &mut errors,
    );
    errors.into_result()
}

/// Path or query identifier
pub fn parse_id(field: &'static str, value: &str) -> Result<Uuid, ValidationErrors> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ValidationErrors::single(field, "Must be a valid identifier"))
}

pub fn parse_role(value: &str) -> Result<UserRole, ValidationErrors> {
    UserRole::parse(value.trim())
        .ok_or_else(|| ValidationErrors::single("role", "Role must be admin, author or member"))
}

/// `type` query of the group listing; absent means the plain listing
pub fn parse_group_listing(value: Option<&str>) -> Result<GroupListing, ValidationErrors> {
    match value.map(str::trim) {
        None | Some("") | Some("simple") => Ok(GroupListing::Simple),
        Some("full") => Ok(GroupListing::Full),
        Some(_) => Err(ValidationErrors::single("type", "Type must be simple or full")),
    }
}

fn check_text(
    field: &'static str,
    value: &str,
    max: usize,
    errors: &mut ValidationErrors,
) {
    if value.trim().is_empty() {
        errors.add(field, "Must not be empty");
    } else if value.trim().chars().count() > max {
        errors.add(field, format!("Is too long (maximum {} characters)", max));
    }
}

fn check_optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
    errors: &mut ValidationErrors,
) {
    if let Some(value) = value {
        check_text(field, value, max, errors);
    }
}

fn check_translations(translations: &[Translation], errors: &mut ValidationErrors) {
    let incomplete = translations
        .iter()
        .any(|t| t.language.trim().is_empty() || t.translation.trim().is_empty());
    if incomplete {
        errors.add(
            "translations",
            "Every translation needs a language and a translation",
        );
    }
}

pub fn validate_new_word_group(name: &str, main_word: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_text("name", name, MAX_NAME_LENGTH, &mut errors);
    check_text("mainWord", main_word, MAX_WORD_LENGTH, &mut errors);
    errors.into_result()
}

/// Fields that are present must still be non-empty
pub fn validate_word_group_changes(
    name: Option<&str>,
    main_word: Option<&str>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_optional_text("name", name, MAX_NAME_LENGTH, &mut errors);
    check_optional_text("mainWord", main_word, MAX_WORD_LENGTH, &mut errors);
    errors.into_result()
}

/// Returns the parsed group id
pub fn validate_new_word(
    group: &str,
    text: &str,
    translations: &[Translation],
) -> Result<Uuid, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let group_id = if group.trim().is_empty() {
        errors.add("group", "Group is required");
        None
    } else {
        parse_id("group", group)
            .map_err(|_| errors.add("group", "Must be a valid identifier"))
            .ok()
    };
    check_text("text", text, MAX_WORD_LENGTH, &mut errors);
    check_translations(translations, &mut errors);
    errors.into_result()?;

    group_id.ok_or_else(|| ValidationErrors::single("group", "Group is required"))
}

/// Returns the parsed target group id when one was given
pub fn validate_word_changes(
    group: Option<&str>,
    text: Option<&str>,
    translations: Option<&[Translation]>,
) -> Result<Option<Uuid>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let group_id = group.and_then(|group| {
        parse_id("group", group)
            .map_err(|_| errors.add("group", "Must be a valid identifier"))
            .ok()
    });
    check_optional_text("text", text, MAX_WORD_LENGTH, &mut errors);
    if let Some(translations) = translations {
        check_translations(translations, &mut errors);
    }
    errors.into_result()?;

    Ok(group_id)
}

/// The id wins when both are given
pub fn validate_word_lookup(
    id: Option<&str>,
    text: Option<&str>,
) -> Result<WordLookup, ValidationErrors> {
    let id = id.map(str::trim).filter(|v| !v.is_empty());
    let text = text.map(str::trim).filter(|v| !v.is_empty());
    match (id, text) {
        (Some(id), _) => parse_id("id", id).map(WordLookup::Id),
        (None, Some(text)) => Ok(WordLookup::Text(text.to_string())),
        (None, None) => Err(ValidationErrors::single("id", "Either id or text is required")),
    }
}
