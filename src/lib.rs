//! voice-memo - record, review and play back voice memos
//!
//! This crate captures microphone audio in timesliced chunks, assembles
//! them into a single clip, and plays clips back with a seekable clock.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, state machines, the chunk assembler and errors
//! - **Application**: Recording controller, playback engine, snapshot bus and port traits
//! - **Infrastructure**: Adapter implementations (cpal capture, rodio output, URL fetching, config)
//! - **CLI**: Command-line interface, argument parsing and terminal rendering

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
