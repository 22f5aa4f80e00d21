pub mod db;
pub mod entities;
pub mod repository;

pub use db::{init_db, init_db_with_pool};
pub use entities::{conversations, entries, messages, summaries};
pub use repository::{
    ConversationStore, EntryStore, RepositoryError, SeaOrmJournalRepository, SummaryStore,
};
