//! Native engine capability and the process-wide engine handle
//!
//! # Architecture
//! - [`NativeEngine`]: one method per native primitive the binding needs
//! - Opaque handle newtypes ([`NativeMedia`], [`NativeList`],
//!   [`NativeEventManager`]); a null native pointer is `None`
//! - Process-wide slot holding the installed engine. Every `Media` and
//!   `MediaList` keeps its own `Arc` to the engine it was created from, so
//!   releasing the slot never tears the engine down underneath live handles.
//!
//! # Last-error slot
//! Engines report failures through a shared last-error slot rather than
//! per-call return values. [`call`] clears the slot right before the native
//! call and reads it right after, so an error left behind by an unrelated
//! earlier call is never attributed to the current one.

pub mod memory;

use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock};

use medialink_common::{Backend, EngineConfig};
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::media::MediaState;
use crate::{Error, Result};

pub use memory::MemoryEngine;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Wrap a raw native value; zero (null) yields `None`
            pub fn from_raw(raw: usize) -> Option<Self> {
                NonZeroUsize::new(raw).map(Self)
            }

            pub fn as_raw(self) -> usize {
                self.0.get()
            }
        }
    };
}

native_handle!(
    /// Engine-side media item
    NativeMedia
);
native_handle!(
    /// Engine-side media list
    NativeList
);
native_handle!(
    /// Engine-side event manager (owned by its media list)
    NativeEventManager
);

/// Primitives provided by the external media engine
///
/// Methods mirror the engine's C ABI: allocation returns `None` for a null
/// handle, list mutation returns the engine's integer status (0 = success),
/// and everything else reports failure only through [`last_error`].
///
/// Handles passed in were produced by the same engine and not yet released;
/// the binding layer guarantees this.
///
/// [`last_error`]: NativeEngine::last_error
pub trait NativeEngine: Send + Sync {
    /// Short backend name for diagnostics
    fn name(&self) -> &str;

    fn media_new_path(&self, path: &str) -> Option<NativeMedia>;
    fn media_new_location(&self, location: &str) -> Option<NativeMedia>;
    fn media_add_option(&self, media: NativeMedia, option: &str);
    fn media_get_mrl(&self, media: NativeMedia) -> Option<String>;
    fn media_get_state(&self, media: NativeMedia) -> MediaState;
    fn media_release(&self, media: NativeMedia);

    fn list_new(&self) -> Option<NativeList>;
    fn list_release(&self, list: NativeList);
    fn list_add_media(&self, list: NativeList, media: NativeMedia) -> i32;
    fn list_insert_media(&self, list: NativeList, media: NativeMedia, index: i32) -> i32;
    fn list_remove_index(&self, list: NativeList, index: i32) -> i32;
    fn list_count(&self, list: NativeList) -> i32;
    /// Index of `media` in `list`, -1 if absent
    fn list_index_of_item(&self, list: NativeList, media: NativeMedia) -> i32;
    fn list_is_readonly(&self, list: NativeList) -> bool;
    /// Blocks until the calling thread owns the list
    fn list_lock(&self, list: NativeList);
    fn list_unlock(&self, list: NativeList);
    fn list_event_manager(&self, list: NativeList) -> Option<NativeEventManager>;

    fn last_error(&self) -> Option<String>;
    fn clear_error(&self);
}

/// Run one native call paired with its own last-error reading
pub(crate) fn call<T>(
    engine: &dyn NativeEngine,
    f: impl FnOnce(&dyn NativeEngine) -> T,
) -> (T, Option<String>) {
    engine.clear_error();
    let value = f(engine);
    (value, engine.last_error())
}

/// Run a native call whose only failure signal is the last-error slot
pub(crate) fn call_unit(
    engine: &dyn NativeEngine,
    f: impl FnOnce(&dyn NativeEngine),
) -> Result<()> {
    match call(engine, f) {
        ((), None) => Ok(()),
        ((), Some(message)) => Err(Error::Engine(message)),
    }
}

/// Same engine instance (compares data pointers only)
pub(crate) fn same_engine(a: &Arc<dyn NativeEngine>, b: &Arc<dyn NativeEngine>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// ============================================================================
// Process-wide engine handle
// ============================================================================

static ENGINE: Lazy<RwLock<Option<Arc<dyn NativeEngine>>>> = Lazy::new(|| RwLock::new(None));

/// Install `engine` as the process-wide engine handle
///
/// # Errors
/// [`Error::AlreadyInitialized`] if an engine is already installed.
pub fn init(engine: Arc<dyn NativeEngine>) -> Result<()> {
    let mut slot = ENGINE.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    info!("Media engine initialized ({})", engine.name());
    *slot = Some(engine);
    Ok(())
}

/// Build the configured backend and install it
///
/// Also installs the global tracing subscriber with the configured
/// `log_filter` (`RUST_LOG` still wins) unless one is already installed.
pub fn init_from_config(config: &EngineConfig) -> Result<()> {
    config.validate()?;
    if !medialink_common::logging::init_tracing(&config.log_filter) {
        debug!("Tracing subscriber already installed, ignoring log_filter");
    }
    init(build_engine(config)?)
}

fn build_engine(config: &EngineConfig) -> Result<Arc<dyn NativeEngine>> {
    match config.backend {
        Backend::Memory => {
            if !config.args.is_empty() {
                debug!("Memory engine ignores arguments: {:?}", config.args);
            }
            Ok(Arc::new(MemoryEngine::new()))
        }
        #[cfg(feature = "libvlc")]
        Backend::Libvlc => Ok(Arc::new(crate::ffi::libvlc::LibVlc::new(&config.args)?)),
        #[cfg(not(feature = "libvlc"))]
        Backend::Libvlc => Err(Error::BackendUnavailable("libvlc")),
    }
}

/// Remove the process-wide engine handle
///
/// Idempotent. Media and lists created earlier keep their engine alive until
/// they are dropped; new ones can no longer be created.
pub fn release() {
    let previous = ENGINE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    if let Some(engine) = previous {
        info!("Media engine released ({})", engine.name());
    }
}

pub fn is_initialized() -> bool {
    ENGINE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Current engine handle
///
/// # Errors
/// [`Error::NotInitialized`] if no engine is installed.
pub fn instance() -> Result<Arc<dyn NativeEngine>> {
    ENGINE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(Error::NotInitialized)
}
