mod items;
mod schema;
mod sources;
mod tombstones;
mod types;

pub use items::item_id;
pub use schema::Database;
pub use types::{
    DatabaseError, DeletedArticle, FeedItem, FeedSource, ItemPredicate, ItemSort, ParsedEntry,
};
