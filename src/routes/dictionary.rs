/// Dictionary routes
///
/// Reads are public. Writes sit behind `RequireRole` for admins and authors;
/// only admins may change a group's approval flag.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::dictionary::{
    DictionaryService, GroupListing, NewWord, NewWordGroup, Translation, WordChanges,
    WordGroupChanges,
};
use crate::error::{AppError, ErrorContext};
use crate::users::User;
use crate::validators::{
    parse_group_listing, parse_id, validate_new_word, validate_new_word_group,
    validate_word_changes, validate_word_group_changes, validate_word_lookup,
};

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

#[derive(Deserialize)]
pub struct GroupListQuery {
    #[serde(rename = "type")]
    pub listing: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWordGroupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main_word: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWordGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub main_word: Option<String>,
    pub is_published: Option<bool>,
    pub is_approved: Option<bool>,
}

#[derive(Deserialize)]
pub struct WordQuery {
    pub id: Option<String>,
    pub text: Option<String>,
}

/// `group` is the id of the owning word group
#[derive(Deserialize)]
pub struct CreateWordRequest {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub transcription: String,
    #[serde(default)]
    pub meaning: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub translations: Vec<Translation>,
}

#[derive(Deserialize, Default)]
pub struct UpdateWordRequest {
    pub group: Option<String>,
    pub text: Option<String>,
    pub transcription: Option<String>,
    pub meaning: Option<String>,
    pub examples: Option<Vec<String>>,
    pub translations: Option<Vec<Translation>>,
}

/// GET /api/word-groups?type=simple|full
///
/// `full` embeds each group's words.
pub async fn list_word_groups(
    query: web::Query<GroupListQuery>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    match parse_group_listing(query.listing.as_deref())? {
        GroupListing::Simple => Ok(HttpResponse::Ok().json(dictionary.list_groups().await?)),
        GroupListing::Full => {
            Ok(HttpResponse::Ok().json(dictionary.list_groups_with_words().await?))
        }
    }
}

/// GET /api/word-groups/{group_id}
///
/// # Errors
/// - 404: no such group
pub async fn get_word_group(
    path: web::Path<String>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let group_id = parse_id("groupId", &path)?;
    Ok(HttpResponse::Ok().json(dictionary.find_group(group_id).await?))
}

/// POST /api/word-groups
///
/// **Admin or author.**
///
/// # Errors
/// - 400: offending fields listed in `fields`
/// - 409: main word already used by another group
pub async fn create_word_group(
    user: web::ReqData<User>,
    form: web::Json<CreateWordGroupRequest>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("word_group_create").with_user_id(user.id.to_string());
    validate_new_word_group(&form.name, &form.main_word)?;

    let form = form.into_inner();
    let group = dictionary
        .create_group(NewWordGroup {
            name: form.name.trim().to_string(),
            description: trimmed(form.description),
            main_word: form.main_word.trim().to_string(),
        })
        .await?;

    context.log_success("Word group created");
    Ok(HttpResponse::Created().json(group))
}

/// PATCH /api/word-groups/{group_id}
///
/// **Admin or author.** `isApproved` is admin only.
///
/// # Errors
/// - 400: offending fields listed in `fields`
/// - 403: `isApproved` sent by a non-admin
/// - 404: no such group
/// - 409: main word already used by another group
pub async fn update_word_group(
    user: web::ReqData<User>,
    path: web::Path<String>,
    form: web::Json<UpdateWordGroupRequest>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("word_group_update").with_user_id(user.id.to_string());
    let group_id = parse_id("groupId", &path)?;
    validate_word_group_changes(form.name.as_deref(), form.main_word.as_deref())?;
    if form.is_approved.is_some() && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let form = form.into_inner();
    let group = dictionary
        .update_group(
            group_id,
            WordGroupChanges {
                name: trimmed(form.name),
                description: trimmed(form.description),
                main_word: trimmed(form.main_word),
                is_published: form.is_published,
                is_approved: form.is_approved,
            },
        )
        .await?;

    context.log_success("Word group updated");
    Ok(HttpResponse::Ok().json(group))
}

/// DELETE /api/word-groups/{group_id}
///
/// **Admin or author.** Deletes the group's words too. Deleting a missing
/// group also answers 204.
pub async fn delete_word_group(
    user: web::ReqData<User>,
    path: web::Path<String>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("word_group_delete").with_user_id(user.id.to_string());
    let group_id = parse_id("groupId", &path)?;

    if dictionary.delete_group(group_id).await? {
        context.log_success("Word group deleted");
    }
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/words?id=..&text=..
///
/// # Errors
/// - 400: neither `id` nor `text` given, or a bad id
/// - 404: no such word
pub async fn find_word(
    query: web::Query<WordQuery>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let lookup = validate_word_lookup(query.id.as_deref(), query.text.as_deref())?;
    Ok(HttpResponse::Ok().json(dictionary.find_word(&lookup).await?))
}

/// POST /api/words
///
/// **Admin or author.**
///
/// # Errors
/// - 400: offending fields listed in `fields`
/// - 404: the group does not exist
/// - 409: the text already exists
pub async fn create_word(
    user: web::ReqData<User>,
    form: web::Json<CreateWordRequest>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("word_create").with_user_id(user.id.to_string());
    let group_id = validate_new_word(&form.group, &form.text, &form.translations)?;

    let form = form.into_inner();
    let word = dictionary
        .create_word(NewWord {
            group_id,
            text: form.text.trim().to_string(),
            transcription: form.transcription.trim().to_string(),
            meaning: trimmed(form.meaning),
            examples: form.examples,
            translations: form.translations,
        })
        .await?;

    context.log_success("Word created");
    Ok(HttpResponse::Created().json(word))
}

/// PATCH /api/words/{word_id}
///
/// **Admin or author.**
///
/// # Errors
/// - 400: offending fields listed in `fields`
/// - 404: no such word, or the target group does not exist
/// - 409: the new text already exists
pub async fn update_word(
    user: web::ReqData<User>,
    path: web::Path<String>,
    form: web::Json<UpdateWordRequest>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("word_update").with_user_id(user.id.to_string());
    let word_id = parse_id("wordId", &path)?;
    let group_id = validate_word_changes(
        form.group.as_deref(),
        form.text.as_deref(),
        form.translations.as_deref(),
    )?;

    let form = form.into_inner();
    let word = dictionary
        .update_word(
            word_id,
            WordChanges {
                group_id,
                text: trimmed(form.text),
                transcription: trimmed(form.transcription),
                meaning: trimmed(form.meaning),
                examples: form.examples,
                translations: form.translations,
            },
        )
        .await?;

    context.log_success("Word updated");
    Ok(HttpResponse::Ok().json(word))
}

/// DELETE /api/words/{word_id}
///
/// **Admin or author.** Deleting a missing word also answers 204.
pub async fn delete_word(
    user: web::ReqData<User>,
    path: web::Path<String>,
    dictionary: web::Data<DictionaryService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("word_delete").with_user_id(user.id.to_string());
    let word_id = parse_id("wordId", &path)?;

    if dictionary.delete_word(word_id).await? {
        context.log_success("Word deleted");
    }
    Ok(HttpResponse::NoContent().finish())
}
