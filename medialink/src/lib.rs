//! # medialink
//!
//! Safe, ownership-aware handles over an external media engine's media and
//! playlist primitives.
//!
//! **Purpose:** Create media references, collect them in lockable media
//! lists, and expose each list's event manager, without ever handing the
//! caller a raw engine pointer.
//!
//! **Architecture:**
//! - [`engine`]: the [`NativeEngine`] capability trait and the process-wide
//!   engine handle ([`init`], [`release`])
//! - [`Media`]: owned reference to one playable item
//! - [`MediaList`] / [`MediaListLock`]: ordered collection and its lock guard
//! - [`EventManager`]: non-owning handle to a list's event manager
//! - [`MemoryEngine`]: in-process engine; `ffi::libvlc` (feature `libvlc`)
//!   binds the system libvlc

pub mod engine;
pub mod error;
pub mod event_manager;
#[cfg(feature = "libvlc")]
pub mod ffi;
pub mod media;
pub mod media_list;

pub use engine::{
    init, init_from_config, instance, is_initialized, release, MemoryEngine, NativeEngine,
    NativeEventManager, NativeList, NativeMedia,
};
pub use error::{Error, Result};
pub use event_manager::EventManager;
pub use media::{Media, MediaState};
pub use media_list::{MediaList, MediaListLock};
pub use medialink_common::{Backend, EngineConfig};
