//! # laodong-db
//!
//! Infrastructure layer for laodong - dense vector search over the legal corpus.
//!
//! This crate holds the storage-facing implementations that `laodong-core`
//! consumes through its capability traits. Keeping them here means the core
//! pipeline compiles without HTTP clients for vector stores and can be tested
//! against in-process doubles.
//!
//! ## Architecture
//!
//! ```text
//! laodong-cli → laodong-core → (capability traits)
//!                   ↑
//!              laodong-db    (dense vector search)
//!              laodong-model (embeddings, reranking, generation)
//! ```
//!
//! ## Features
//!
//! - `qdrant` (default): REST client for a Qdrant collection
//!
//! ## Usage
//!
//! ```ignore
//! use laodong_db::vector::{MemoryVectorIndex, VectorMetric, VectorRecord};
//!
//! let index = MemoryVectorIndex::new(768, VectorMetric::Cosine);
//! index.upsert(vec![VectorRecord::new("c1", embedding)])?;
//! let hits = index.query(&query_vector, 15)?;
//! ```

pub mod error;
pub mod vector;

pub use error::{DbError, DbResult};
