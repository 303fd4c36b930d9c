/// Dictionary module
///
/// Word groups, the words filed under them, and their persistence seams.

mod models;
mod repository;
mod service;

pub use models::{
    GroupListing, NewWord, NewWordGroup, Translation, Word, WordChanges, WordGroup,
    WordGroupChanges, WordGroupWithWords, WordLookup,
};
pub use repository::{InMemoryDictionary, PgDictionary, WordGroupRepository, WordRepository};
pub use service::DictionaryService;
