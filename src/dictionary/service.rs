use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::dictionary::models::{
    NewWord, NewWordGroup, Word, WordChanges, WordGroup, WordGroupChanges, WordGroupWithWords,
    WordLookup,
};
use crate::dictionary::repository::{WordGroupRepository, WordRepository};
use crate::error::{AppError, DatabaseError};

fn group_not_found() -> AppError {
    AppError::NotFound("Word group not found".to_string())
}

fn word_not_found() -> AppError {
    AppError::NotFound("Word not found".to_string())
}

fn main_word_conflict(main_word: &str) -> AppError {
    AppError::Conflict(format!(
        "Group with the main word '{}' already exists",
        main_word
    ))
}

fn text_conflict(text: &str) -> AppError {
    AppError::Conflict(format!("Word '{}' already exists", text))
}

/// Word groups and the words filed under them
pub struct DictionaryService {
    groups: Arc<dyn WordGroupRepository>,
    words: Arc<dyn WordRepository>,
}

impl DictionaryService {
    pub fn new(groups: Arc<dyn WordGroupRepository>, words: Arc<dyn WordRepository>) -> Self {
        Self { groups, words }
    }

    pub async fn list_groups(&self) -> Result<Vec<WordGroup>, AppError> {
        self.groups.find_all().await
    }

    /// Every group with its words, both oldest first
    pub async fn list_groups_with_words(&self) -> Result<Vec<WordGroupWithWords>, AppError> {
        let groups = self.groups.find_all().await?;
        let mut by_group: HashMap<Uuid, Vec<Word>> = HashMap::new();
        for word in self.words.find_all().await? {
            by_group.entry(word.group_id).or_default().push(word);
        }

        Ok(groups
            .into_iter()
            .map(|group| WordGroupWithWords {
                words: by_group.remove(&group.id).unwrap_or_default(),
                group,
            })
            .collect())
    }

    /// # Errors
    /// `AppError::NotFound` when no group has this id
    pub async fn find_group(&self, id: Uuid) -> Result<WordGroupWithWords, AppError> {
        let group = self.groups.find_by_id(id).await?.ok_or_else(group_not_found)?;
        let words = self.words.find_by_group(id).await?;
        Ok(WordGroupWithWords { group, words })
    }

    /// # Errors
    /// `AppError::Conflict` when the main word belongs to another group
    pub async fn create_group(&self, new: NewWordGroup) -> Result<WordGroup, AppError> {
        let group = WordGroup::new(new);
        match self.groups.insert(&group).await {
            Ok(()) => {}
            Err(AppError::Database(DatabaseError::UniqueViolation(_))) => {
                return Err(main_word_conflict(&group.main_word))
            }
            Err(e) => return Err(e),
        }

        tracing::info!(group_id = %group.id, main_word = %group.main_word, "Word group created");
        Ok(group)
    }

    /// # Errors
    /// `AppError::NotFound` for an unknown id, `AppError::Conflict` when the
    /// new main word is taken
    pub async fn update_group(
        &self,
        id: Uuid,
        changes: WordGroupChanges,
    ) -> Result<WordGroup, AppError> {
        match self.groups.update(id, &changes).await {
            Ok(Some(group)) => Ok(group),
            Ok(None) => Err(group_not_found()),
            Err(AppError::Database(DatabaseError::UniqueViolation(_))) => Err(main_word_conflict(
                changes.main_word.as_deref().unwrap_or_default(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Delete a group and every word in it. Returns `false` when there was
    /// nothing to delete.
    pub async fn delete_group(&self, id: Uuid) -> Result<bool, AppError> {
        let deleted = self.groups.delete(id).await?;
        if deleted {
            tracing::info!(group_id = %id, "Word group deleted");
        }
        Ok(deleted)
    }

    /// # Errors
    /// `AppError::NotFound` when nothing matches
    pub async fn find_word(&self, lookup: &WordLookup) -> Result<Word, AppError> {
        let word = match lookup {
            WordLookup::Id(id) => self.words.find_by_id(*id).await?,
            WordLookup::Text(text) => self.words.find_by_text(text).await?,
        };
        word.ok_or_else(word_not_found)
    }

    /// # Errors
    /// `AppError::NotFound` when the group does not exist,
    /// `AppError::Conflict` when the text is taken
    pub async fn create_word(&self, new: NewWord) -> Result<Word, AppError> {
        self.ensure_group(new.group_id).await?;

        let word = Word::new(new);
        match self.words.insert(&word).await {
            Ok(()) => {}
            Err(AppError::Database(DatabaseError::UniqueViolation(_))) => {
                return Err(text_conflict(&word.text))
            }
            Err(e) => return Err(e),
        }

        tracing::info!(word_id = %word.id, group_id = %word.group_id, "Word created");
        Ok(word)
    }

    /// # Errors
    /// `AppError::NotFound` for an unknown word or target group,
    /// `AppError::Conflict` when the new text is taken
    pub async fn update_word(&self, id: Uuid, changes: WordChanges) -> Result<Word, AppError> {
        if let Some(group_id) = changes.group_id {
            self.ensure_group(group_id).await?;
        }

        match self.words.update(id, &changes).await {
            Ok(Some(word)) => Ok(word),
            Ok(None) => Err(word_not_found()),
            Err(AppError::Database(DatabaseError::UniqueViolation(_))) => Err(text_conflict(
                changes.text.as_deref().unwrap_or_default(),
            )),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_word(&self, id: Uuid) -> Result<bool, AppError> {
        self.words.delete(id).await
    }

    async fn ensure_group(&self, id: Uuid) -> Result<(), AppError> {
        self.groups
            .find_by_id(id)
            .await?
            .map(|_| ())
            .ok_or_else(group_not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::models::Translation;
    use crate::dictionary::repository::InMemoryDictionary;

    fn service() -> DictionaryService {
        let store = Arc::new(InMemoryDictionary::new());
        DictionaryService::new(store.clone(), store)
    }

    fn new_group(main_word: &str) -> NewWordGroup {
        NewWordGroup {
            name: format!("{} words", main_word),
            description: None,
            main_word: main_word.to_string(),
        }
    }

    fn new_word(group_id: Uuid, text: &str) -> NewWord {
        NewWord {
            group_id,
            text: text.to_string(),
            transcription: format!("[{}]", text),
            meaning: None,
            examples: vec![format!("A {} sat here.", text)],
            translations: vec![Translation {
                language: "de".to_string(),
                translation: text.to_uppercase(),
            }],
        }
    }

    #[tokio::test]
    async fn test_duplicate_main_word_conflicts() {
        let service = service();
        service.create_group(new_group("animal")).await.unwrap();

        let err = service.create_group(new_group("animal")).await.unwrap_err();
        match err {
            AppError::Conflict(msg) => {
                assert_eq!(msg, "Group with the main word 'animal' already exists")
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_find_group_includes_its_words() {
        let service = service();
        let animals = service.create_group(new_group("animal")).await.unwrap();
        let plants = service.create_group(new_group("plant")).await.unwrap();
        service.create_word(new_word(animals.id, "cat")).await.unwrap();
        service.create_word(new_word(plants.id, "oak")).await.unwrap();

        let found = service.find_group(animals.id).await.unwrap();
        assert_eq!(found.group.main_word, "animal");
        assert_eq!(found.words.len(), 1);
        assert_eq!(found.words[0].text, "cat");

        assert!(matches!(
            service.find_group(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_full_listing_attaches_words_to_groups() {
        let service = service();
        let animals = service.create_group(new_group("animal")).await.unwrap();
        service.create_group(new_group("plant")).await.unwrap();
        for text in ["cat", "dog"] {
            service.create_word(new_word(animals.id, text)).await.unwrap();
        }

        let listing = service.list_groups_with_words().await.unwrap();
        assert_eq!(listing.len(), 2);
        let animal_entry = listing
            .iter()
            .find(|g| g.group.id == animals.id)
            .expect("animal group listed");
        assert_eq!(animal_entry.words.len(), 2);
        let plant_entry = listing
            .iter()
            .find(|g| g.group.id != animals.id)
            .expect("plant group listed");
        assert!(plant_entry.words.is_empty());

        assert_eq!(service.list_groups().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_word_requires_existing_group() {
        let service = service();
        let err = service
            .create_word(new_word(Uuid::new_v4(), "cat"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_word_by_id_or_text() {
        let service = service();
        let animals = service.create_group(new_group("animal")).await.unwrap();
        let cat = service.create_word(new_word(animals.id, "cat")).await.unwrap();

        let by_id = service.find_word(&WordLookup::Id(cat.id)).await.unwrap();
        let by_text = service
            .find_word(&WordLookup::Text("cat".to_string()))
            .await
            .unwrap();
        assert_eq!(by_id, by_text);
        assert_eq!(by_id.translations[0].translation, "CAT");

        assert!(matches!(
            service.find_word(&WordLookup::Text("dog".to_string())).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_word_text_conflict_and_move() {
        let service = service();
        let animals = service.create_group(new_group("animal")).await.unwrap();
        let pets = service.create_group(new_group("pet")).await.unwrap();
        service.create_word(new_word(animals.id, "cat")).await.unwrap();
        let dog = service.create_word(new_word(animals.id, "dog")).await.unwrap();

        let rename = WordChanges {
            text: Some("cat".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_word(dog.id, rename).await,
            Err(AppError::Conflict(_))
        ));

        let to_missing_group = WordChanges {
            group_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_word(dog.id, to_missing_group).await,
            Err(AppError::NotFound(_))
        ));

        let moved = service
            .update_word(
                dog.id,
                WordChanges {
                    group_id: Some(pets.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.group_id, pets.id);
        assert_eq!(moved.text, "dog");
    }

    #[tokio::test]
    async fn test_update_missing_group_is_not_found() {
        let service = service();
        let err = service
            .update_group(Uuid::new_v4(), WordGroupChanges::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_group_cascades_and_is_idempotent() {
        let service = service();
        let animals = service.create_group(new_group("animal")).await.unwrap();
        let cat = service.create_word(new_word(animals.id, "cat")).await.unwrap();

        assert!(service.delete_group(animals.id).await.unwrap());
        assert!(!service.delete_group(animals.id).await.unwrap());
        assert!(matches!(
            service.find_word(&WordLookup::Id(cat.id)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(!service.delete_word(cat.id).await.unwrap());
    }
}
