//! # Recast Core
//!
//! Core types for the recast batch transcoder.
//!
//! This crate provides the building blocks shared by every other recast
//! component:
//! - Error handling types
//! - Rational time-base arithmetic and timestamp rescaling
//! - The immutable transcoder configuration record
//! - Codec profiles (target codec pair, output extension)
//! - Stream descriptions produced by the demuxer layer
//! - The pipeline-to-dispatcher event channel

pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod profile;
pub mod rational;

pub use config::{AudioCodec, Configuration, Language, VideoCodec};
pub use error::{ConfigError, Error, Result};
pub use events::{event_channel, Event, EventReceiver, EventSender};
pub use media::{CodecTag, StreamDesc, StreamKind};
pub use profile::CodecProfile;
pub use rational::{Rational, Rounding, TimeBase, NOPTS};
