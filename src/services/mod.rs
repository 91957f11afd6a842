pub mod batch;
mod embedding;
mod pipeline;
mod tokenizer;
pub mod vector_store;

pub use batch::{Batches, split_by_size, split_into_count};
pub use embedding::{Embedder, EmbeddingClient};
pub use pipeline::{CorpusEstimate, EmbeddingPipeline};
pub use tokenizer::{TokenizedCorpus, Tokenizer};
pub use vector_store::{PgVectorBackend, QdrantBackend, VectorStore, create_backend};
