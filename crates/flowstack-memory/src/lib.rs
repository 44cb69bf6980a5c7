pub mod embeddings;
pub mod store;

pub use embeddings::{cosine_similarity, EmbeddingApi, EmbeddingRouter, HttpEmbeddingBackend};
pub use store::{split_passages, SqliteVectorStore};
