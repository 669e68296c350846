//! Multimedia quality-control analysis service.
//!
//! Modules are organized by collaborator, matching the boundaries a request
//! crosses: Input Guard validates what comes in, the Probe Driver and
//! Quality Metrics Pipeline run the external `ffprobe`/`ffmpeg`-compatible
//! binaries, the Job Orchestrator schedules and tracks work across a worker
//! pool, and HTTP Ingress exposes all of it over axum.

pub mod commentary;
pub mod config;
pub mod domain;
pub mod error;
pub mod guard;
pub mod hls;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod report;
pub mod storage;
