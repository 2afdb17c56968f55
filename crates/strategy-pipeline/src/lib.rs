//! Strategy Pipeline
//!
//! Rule-based strategic decision pipeline. A free-text message flows through
//! four stages, each producing an immutable, validated value:
//!
//! 1. **Router** (`router/`): message to `QueryPlan` (domains, mode, confidence)
//! 2. **Governor** (`governor/`): `QueryPlan` to `Decision` (risk profile,
//!    hard constraints, recommendation)
//! 3. **Synthesizer** (`synthesizer/`): `Decision` to a five-section
//!    `DecisionDocument`, with retry and a degraded fallback
//! 4. **AuditSink** (`audit/`): one signed, append-only `AuditRecord` per run
//!
//! The **Orchestrator** (`orchestrator/`) drives the stages through a state
//! machine and always returns a complete `PipelineResult`.
//!
//! ## Design Principles
//!
//! - Deterministic: Router and Governor depend only on their input
//! - Validated at construction: each stage checks its own output contract
//! - Append-only: the audit store refuses UPDATE and DELETE
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strategy_pipeline::{AuditSink, Orchestrator, PipelineConfig, SqliteAuditStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PipelineConfig::from_env();
//!     let store = Arc::new(SqliteAuditStore::open(&config.audit_db_path).unwrap());
//!     let sink = Arc::new(AuditSink::new(&config, store).unwrap());
//!     let orchestrator = Orchestrator::new(&config, sink);
//!
//!     let result = orchestrator
//!         .process("¿Es buen momento para solicitar excedencia en CGI?", "user-1")
//!         .await;
//!     println!("{} -> {:?}", result.correlation_id, result.status);
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod governor;
pub mod orchestrator;
pub mod router;
pub mod synthesizer;
pub mod telemetry;
pub mod validation;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use audit::{AuditSink, AuditStore, SqliteAuditStore, Verification};
pub use config::{PipelineConfig, RetryConfig};
pub use error::{AuditError, ErrorCode, PipelineError, ValidationFailure};
pub use governor::Governor;
pub use orchestrator::{Orchestrator, PipelineResult, PipelineState, LOCAL_ONLY};
pub use router::Router;
pub use synthesizer::{Composer, StandardComposer, SynthesisOutcome, Synthesizer};
pub use telemetry::{PipelineMetrics, PipelineMetricsRegistry};

/// Crate version recorded by binaries at startup
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");
