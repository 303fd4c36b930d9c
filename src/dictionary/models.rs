use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub language: String,
    pub translation: String,
}

/// A themed group of words, identified by its unique main word
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub main_word: String,
    pub is_published: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWordGroup {
    pub name: String,
    pub description: Option<String>,
    pub main_word: String,
}

impl WordGroup {
    pub fn new(new: NewWordGroup) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            main_word: new.main_word,
            is_published: false,
            is_approved: false,
            created_at: Utc::now(),
        }
    }
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct WordGroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub main_word: Option<String>,
    pub is_published: Option<bool>,
    pub is_approved: Option<bool>,
}

impl WordGroupChanges {
    pub fn apply(&self, group: &mut WordGroup) {
        if let Some(name) = &self.name {
            group.name = name.clone();
        }
        if let Some(description) = &self.description {
            group.description = Some(description.clone());
        }
        if let Some(main_word) = &self.main_word {
            group.main_word = main_word.clone();
        }
        if let Some(published) = self.is_published {
            group.is_published = published;
        }
        if let Some(approved) = self.is_approved {
            group.is_approved = approved;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Word {
    pub id: Uuid,
    pub group_id: Uuid,
    pub text: String,
    pub transcription: String,
    pub meaning: Option<String>,
    pub examples: Vec<String>,
    pub translations: Vec<Translation>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWord {
    pub group_id: Uuid,
    pub text: String,
    pub transcription: String,
    pub meaning: Option<String>,
    pub examples: Vec<String>,
    pub translations: Vec<Translation>,
}

impl Word {
    pub fn new(new: NewWord) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id: new.group_id,
            text: new.text,
            transcription: new.transcription,
            meaning: new.meaning,
            examples: new.examples,
            translations: new.translations,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WordChanges {
    pub group_id: Option<Uuid>,
    pub text: Option<String>,
    pub transcription: Option<String>,
    pub meaning: Option<String>,
    pub examples: Option<Vec<String>>,
    pub translations: Option<Vec<Translation>>,
}

impl WordChanges {
    pub fn apply(&self, word: &mut Word) {
        if let Some(group_id) = self.group_id {
            word.group_id = group_id;
        }
        if let Some(text) = &self.text {
            word.text = text.clone();
        }
        if let Some(transcription) = &self.transcription {
            word.transcription = transcription.clone();
        }
        if let Some(meaning) = &self.meaning {
            word.meaning = Some(meaning.clone());
        }
        if let Some(examples) = &self.examples {
            word.examples = examples.clone();
        }
        if let Some(translations) = &self.translations {
            word.translations = translations.clone();
        }
    }
}

/// A group joined with every word that belongs to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordGroupWithWords {
    #[serde(flatten)]
    pub group: WordGroup,
    pub words: Vec<Word>,
}

/// `type` query of the group listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupListing {
    /// Groups only
    #[default]
    Simple,
    /// Groups with their words
    Full,
}

/// A word is looked up by id, or by its text when no id is given
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordLookup {
    Id(Uuid),
    Text(String),
}
