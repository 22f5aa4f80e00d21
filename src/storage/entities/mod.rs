pub mod conversations;
pub mod entries;
pub mod messages;
pub mod summaries;
