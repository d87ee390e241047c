pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_from_config, connect_with_settings, DbPool};
pub use repositories::{
    DocumentStore, InMemoryDocumentStore, InMemorySessionStore, RepositoryError, SessionStore,
    SqlDocumentStore, SqlSessionStore,
};
