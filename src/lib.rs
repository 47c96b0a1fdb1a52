//! # docqa — Document QA Retrieval Core
//!
//! Backend core for a document question-answering service: documents are
//! split into overlapping text chunks, each chunk is embedded into a
//! unit-normalized vector, and natural-language questions are answered by
//! retrieving the most similar chunks under an inner-product metric.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and defaults
//! - **[`chunker`]** — Overlapping fixed-size text segmentation
//! - **[`embedder`]** — Text embedding via ONNX Runtime (MiniLM-class sentence models)
//! - **[`index`]** — Dense vector index keyed by chunk identity, with snapshot persistence
//! - **[`service`]** — Ingest / query / remove orchestration, the only surface the API layer calls

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod index;
pub mod service;
