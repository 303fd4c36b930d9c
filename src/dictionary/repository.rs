/// Dictionary persistence
///
/// `insert` and `update` report a taken main word (groups) or word text
/// (words) as `DatabaseError::UniqueViolation`. `update` returns `None` and
/// `delete` returns `false` when the row does not exist.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dictionary::models::{Translation, Word, WordChanges, WordGroup, WordGroupChanges};
use crate::error::{AppError, DatabaseError};

#[async_trait]
pub trait WordGroupRepository: Send + Sync {
    async fn insert(&self, group: &WordGroup) -> Result<(), AppError>;
    /// Oldest first
    async fn find_all(&self) -> Result<Vec<WordGroup>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WordGroup>, AppError>;
    async fn update(
        &self,
        id: Uuid,
        changes: &WordGroupChanges,
    ) -> Result<Option<WordGroup>, AppError>;
    /// Removes the group together with its words
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait WordRepository: Send + Sync {
    async fn insert(&self, word: &Word) -> Result<(), AppError>;
    /// Oldest first
    async fn find_all(&self) -> Result<Vec<Word>, AppError>;
    async fn find_by_group(&self, group_id: Uuid) -> Result<Vec<Word>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Word>, AppError>;
    async fn find_by_text(&self, text: &str) -> Result<Option<Word>, AppError>;
    async fn update(&self, id: Uuid, changes: &WordChanges) -> Result<Option<Word>, AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

fn oldest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

/// Process-local store for both tables
///
/// Groups and words share one lock so that deleting a group and its words is
/// a single step, as the foreign key cascade is in Postgres.
#[derive(Default)]
pub struct InMemoryDictionary {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    groups: HashMap<Uuid, WordGroup>,
    words: HashMap<Uuid, Word>,
}

impl InMemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("dictionary lock poisoned".to_string()))
    }
}

fn main_word_taken(tables: &Tables, main_word: &str, except: Option<Uuid>) -> bool {
    tables
        .groups
        .values()
        .any(|g| g.main_word == main_word && Some(g.id) != except)
}

fn text_taken(tables: &Tables, text: &str, except: Option<Uuid>) -> bool {
    tables
        .words
        .values()
        .any(|w| w.text == text && Some(w.id) != except)
}

#[async_trait]
impl WordGroupRepository for InMemoryDictionary {
    async fn insert(&self, group: &WordGroup) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if main_word_taken(&tables, &group.main_word, None) {
            return Err(DatabaseError::UniqueViolation("word_groups_main_word_key".to_string()).into());
        }
        tables.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<WordGroup>, AppError> {
        let groups = self.lock()?.groups.values().cloned().collect();
        Ok(oldest_first(groups, |g| (g.created_at, g.id)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WordGroup>, AppError> {
        Ok(self.lock()?.groups.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &WordGroupChanges,
    ) -> Result<Option<WordGroup>, AppError> {
        let mut tables = self.lock()?;
        if let Some(main_word) = &changes.main_word {
            if main_word_taken(&tables, main_word, Some(id)) {
                return Err(
                    DatabaseError::UniqueViolation("word_groups_main_word_key".to_string()).into(),
                );
            }
        }
        Ok(tables.groups.get_mut(&id).map(|group| {
            changes.apply(group);
            group.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        if tables.groups.remove(&id).is_none() {
            return Ok(false);
        }
        tables.words.retain(|_, w| w.group_id != id);
        Ok(true)
    }
}

#[async_trait]
impl WordRepository for InMemoryDictionary {
    async fn insert(&self, word: &Word) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if !tables.groups.contains_key(&word.group_id) {
            return Err(AppError::Database(DatabaseError::QueryExecution(
                "words_group_id_fkey".to_string(),
            )));
        }
        if text_taken(&tables, &word.text, None) {
            return Err(DatabaseError::UniqueViolation("words_text_key".to_string()).into());
        }
        tables.words.insert(word.id, word.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Word>, AppError> {
        let words = self.lock()?.words.values().cloned().collect();
        Ok(oldest_first(words, |w| (w.created_at, w.id)))
    }

    async fn find_by_group(&self, group_id: Uuid) -> Result<Vec<Word>, AppError> {
        let words = self
            .lock()?
            .words
            .values()
            .filter(|w| w.group_id == group_id)
            .cloned()
            .collect();
        Ok(oldest_first(words, |w| (w.created_at, w.id)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Word>, AppError> {
        Ok(self.lock()?.words.get(&id).cloned())
    }

    async fn find_by_text(&self, text: &str) -> Result<Option<Word>, AppError> {
        Ok(self.lock()?.words.values().find(|w| w.text == text).cloned())
    }

    async fn update(&self, id: Uuid, changes: &WordChanges) -> Result<Option<Word>, AppError> {
        let mut tables = self.lock()?;
        if let Some(text) = &changes.text {
            if text_taken(&tables, text, Some(id)) {
                return Err(DatabaseError::UniqueViolation("words_text_key".to_string()).into());
            }
        }
        if let Some(group_id) = changes.group_id {
            if !tables.groups.contains_key(&group_id) {
                return Err(AppError::Database(DatabaseError::QueryExecution(
                    "words_group_id_fkey".to_string(),
                )));
            }
        }
        Ok(tables.words.get_mut(&id).map(|word| {
            changes.apply(word);
            word.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.words.remove(&id).is_some())
    }
}

/// PostgreSQL repository over `word_groups` and `words`
pub struct PgDictionary {
    pool: PgPool,
}

impl PgDictionary {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type GroupRow = (Uuid, String, Option<String>, String, bool, bool, DateTime<Utc>);

fn group_from_row(row: GroupRow) -> WordGroup {
    let (id, name, description, main_word, is_published, is_approved, created_at) = row;
    WordGroup {
        id,
        name,
        description,
        main_word,
        is_published,
        is_approved,
        created_at,
    }
}

type WordRow = (
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    Vec<String>,
    Json<Vec<Translation>>,
    DateTime<Utc>,
);

fn word_from_row(row: WordRow) -> Word {
    let (id, group_id, text, transcription, meaning, examples, translations, created_at) = row;
    Word {
        id,
        group_id,
        text,
        transcription,
        meaning,
        examples,
        translations: translations.0,
        created_at,
    }
}

#[async_trait]
impl WordGroupRepository for PgDictionary {
    async fn insert(&self, group: &WordGroup) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO word_groups (id, name, description, main_word, is_published, is_approved, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.main_word)
        .bind(group.is_published)
        .bind(group.is_approved)
        .bind(group.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<WordGroup>, AppError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, main_word, is_published, is_approved, created_at
            FROM word_groups
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(group_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WordGroup>, AppError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, main_word, is_published, is_approved, created_at
            FROM word_groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(group_from_row))
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &WordGroupChanges,
    ) -> Result<Option<WordGroup>, AppError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE word_groups
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                main_word = COALESCE($3, main_word),
                is_published = COALESCE($4, is_published),
                is_approved = COALESCE($5, is_approved)
            WHERE id = $6
            RETURNING id, name, description, main_word, is_published, is_approved, created_at
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.main_word)
        .bind(changes.is_published)
        .bind(changes.is_approved)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(group_from_row))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM word_groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl WordRepository for PgDictionary {
    async fn insert(&self, word: &Word) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO words (id, group_id, text, transcription, meaning, examples, translations, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(word.id)
        .bind(word.group_id)
        .bind(&word.text)
        .bind(&word.transcription)
        .bind(&word.meaning)
        .bind(&word.examples)
        .bind(Json(word.translations.clone()))
        .bind(word.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Word>, AppError> {
        let rows = sqlx::query_as::<_, WordRow>(
            r#"
            SELECT id, group_id, text, transcription, meaning, examples, translations, created_at
            FROM words
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(word_from_row).collect())
    }

    async fn find_by_group(&self, group_id: Uuid) -> Result<Vec<Word>, AppError> {
        let rows = sqlx::query_as::<_, WordRow>(
            r#"
            SELECT id, group_id, text, transcription, meaning, examples, translations, created_at
            FROM words
            WHERE group_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(word_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Word>, AppError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            SELECT id, group_id, text, transcription, meaning, examples, translations, created_at
            FROM words
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(word_from_row))
    }

    async fn find_by_text(&self, text: &str) -> Result<Option<Word>, AppError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            SELECT id, group_id, text, transcription, meaning, examples, translations, created_at
            FROM words
            WHERE text = $1
            "#,
        )
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(word_from_row))
    }

    async fn update(&self, id: Uuid, changes: &WordChanges) -> Result<Option<Word>, AppError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            UPDATE words
            SET group_id = COALESCE($1, group_id),
                text = COALESCE($2, text),
                transcription = COALESCE($3, transcription),
                meaning = COALESCE($4, meaning),
                examples = COALESCE($5, examples),
                translations = COALESCE($6, translations)
            WHERE id = $7
            RETURNING id, group_id, text, transcription, meaning, examples, translations, created_at
            "#,
        )
        .bind(changes.group_id)
        .bind(&changes.text)
        .bind(&changes.transcription)
        .bind(&changes.meaning)
        .bind(&changes.examples)
        .bind(changes.translations.clone().map(Json))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(word_from_row))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM words WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
