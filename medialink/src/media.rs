//! Media references
//!
//! A [`Media`] owns exactly one engine-side reference to a playable item.
//! Adding it to a [`MediaList`](crate::MediaList) never transfers that
//! ownership: the list takes its own reference, so the media can be
//! released before or after the list without double frees.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{self, NativeEngine, NativeMedia};
use crate::{Error, Result};

/// Playback state of a media item as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MediaState {
    NothingSpecial = 0,
    Opening = 1,
    Buffering = 2,
    Playing = 3,
    Paused = 4,
    Stopped = 5,
    Ended = 6,
    Error = 7,
}

impl MediaState {
    /// Map the engine's raw state value
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(MediaState::NothingSpecial),
            1 => Some(MediaState::Opening),
            2 => Some(MediaState::Buffering),
            3 => Some(MediaState::Playing),
            4 => Some(MediaState::Paused),
            5 => Some(MediaState::Stopped),
            6 => Some(MediaState::Ended),
            7 => Some(MediaState::Error),
            _ => None,
        }
    }
}

/// Owned handle to one playable item known to the engine
pub struct Media {
    engine: Arc<dyn NativeEngine>,
    handle: Option<NativeMedia>,
}

impl Media {
    /// Create a media from a local filesystem path
    ///
    /// # Errors
    /// - [`Error::NotInitialized`] if no engine is installed
    /// - [`Error::Engine`] / [`Error::AllocationFailed`] if the engine
    ///   returns a null handle
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use medialink::{Media, MemoryEngine};
    ///
    /// # medialink::release();
    /// medialink::init(Arc::new(MemoryEngine::new()))?;
    /// let mut media = Media::from_path("/music/track01.flac")?;
    /// assert_eq!(media.mrl()?, "file:///music/track01.flac");
    /// media.release()?;
    /// # medialink::release();
    /// # Ok::<(), medialink::Error>(())
    /// ```
    pub fn from_path(path: &str) -> Result<Self> {
        Self::new_in(&engine::instance()?, path, true)
    }

    /// Create a media from a remote location (URL)
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new_in(&engine::instance()?, url, false)
    }

    /// Create a media and apply `options` in order
    ///
    /// Stops at the first option the engine rejects. The already allocated
    /// media is released before the error is returned.
    pub fn with_options<S: AsRef<str>>(location: &str, local: bool, options: &[S]) -> Result<Self> {
        let mut media = Self::new_in(&engine::instance()?, location, local)?;
        for option in options {
            media.add_options(option.as_ref())?;
        }
        Ok(media)
    }

    /// Create a media on an explicit engine (local path or remote location)
    pub fn new_in(engine: &Arc<dyn NativeEngine>, location: &str, local: bool) -> Result<Self> {
        check_c_string(location)?;

        let (handle, err) = engine::call(engine.as_ref(), |e| {
            if local {
                e.media_new_path(location)
            } else {
                e.media_new_location(location)
            }
        });

        let Some(handle) = handle else {
            return Err(Error::from_slot(err, Error::AllocationFailed("media")));
        };
        if let Some(message) = err {
            // Handle is valid; the slot message is not attributable to this call
            debug!("Ignoring engine message on media creation: {}", message);
        }

        debug!("Created media {:?} for {}", handle, location);
        Ok(Self {
            engine: engine.clone(),
            handle: Some(handle),
        })
    }

    /// Append one engine-specific option string (e.g. `":no-audio"`)
    ///
    /// # Errors
    /// - [`Error::MediaReleased`] if the media was released
    /// - [`Error::Engine`] if the engine reports an error for this call
    pub fn add_options(&mut self, option: &str) -> Result<()> {
        let handle = self.native()?;
        check_c_string(option)?;
        engine::call_unit(self.engine.as_ref(), |e| e.media_add_option(handle, option))
    }

    /// Engine resource locator of this media
    pub fn mrl(&self) -> Result<String> {
        let handle = self.native()?;
        let (mrl, err) = engine::call(self.engine.as_ref(), |e| e.media_get_mrl(handle));
        mrl.ok_or_else(|| Error::from_slot(err, Error::Engine("media has no MRL".to_string())))
    }

    pub fn state(&self) -> Result<MediaState> {
        let handle = self.native()?;
        let (state, err) = engine::call(self.engine.as_ref(), |e| e.media_get_state(handle));
        match err {
            None => Ok(state),
            Some(message) => Err(Error::Engine(message)),
        }
    }

    /// Release the engine-side reference
    ///
    /// Idempotent: releasing an already released media is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        debug!("Releasing media {:?}", handle);
        engine::call_unit(self.engine.as_ref(), |e| e.media_release(handle))
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Raw engine handle, `None` once released
    pub fn as_raw(&self) -> Option<NativeMedia> {
        self.handle
    }

    pub(crate) fn native(&self) -> Result<NativeMedia> {
        self.handle.ok_or(Error::MediaReleased)
    }

    pub(crate) fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }
}

impl Drop for Media {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release media on drop: {}", e);
        }
    }
}

impl fmt::Debug for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Media")
            .field("engine", &self.engine.name())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Strings cross the C boundary NUL-terminated
pub(crate) fn check_c_string(value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(Error::InvalidString(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;

    fn engine() -> (Arc<MemoryEngine>, Arc<dyn NativeEngine>) {
        let memory = Arc::new(MemoryEngine::new());
        let engine: Arc<dyn NativeEngine> = memory.clone();
        (memory, engine)
    }

    #[test]
    fn test_media_state_from_raw() {
        assert_eq!(MediaState::from_raw(0), Some(MediaState::NothingSpecial));
        assert_eq!(MediaState::from_raw(7), Some(MediaState::Error));
        assert_eq!(MediaState::from_raw(8), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (memory, engine) = engine();
        let mut media = Media::new_in(&engine, "/a.mp4", true).unwrap();

        media.release().unwrap();
        assert!(media.is_released());
        let calls = memory.native_calls();

        media.release().unwrap();
        assert_eq!(memory.native_calls(), calls);
        assert_eq!(memory.live_media(), 0);
    }

    #[test]
    fn test_operations_after_release_make_no_native_call() {
        let (memory, engine) = engine();
        let mut media = Media::new_in(&engine, "http://example.com/a.ogg", false).unwrap();
        media.release().unwrap();
        let calls = memory.native_calls();

        assert!(matches!(media.add_options(":no-video"), Err(Error::MediaReleased)));
        assert!(matches!(media.mrl(), Err(Error::MediaReleased)));
        assert!(matches!(media.state(), Err(Error::MediaReleased)));
        assert_eq!(memory.native_calls(), calls);
    }

    #[test]
    fn test_null_handle_reports_engine_error() {
        let (_memory, engine) = engine();
        let result = Media::new_in(&engine, "no scheme here", false);
        assert!(matches!(result, Err(Error::Engine(ref m)) if m.contains("invalid media location")));
    }

    #[test]
    fn test_allocation_failure() {
        let (memory, engine) = engine();
        memory.fail_next_allocation();
        assert!(matches!(
            Media::new_in(&engine, "/a.mp4", true),
            Err(Error::Engine(ref m)) if m == "allocation failed"
        ));
    }

    #[test]
    fn test_nul_in_location_rejected_before_native_call() {
        let (memory, engine) = engine();
        let result = Media::new_in(&engine, "/bad\0path", true);
        assert!(matches!(result, Err(Error::InvalidString(_))));
        assert_eq!(memory.native_calls(), 0);
    }

    #[test]
    fn test_stale_error_not_attributed_to_creation() {
        let (memory, engine) = engine();
        memory.set_stale_error("earlier failure");
        assert!(Media::new_in(&engine, "/a.mp4", true).is_ok());
    }

    #[test]
    fn test_add_options_in_order() {
        let (memory, engine) = engine();
        let mut media = Media::new_in(&engine, "/a.mp4", true).unwrap();

        media.add_options(":start-time=10").unwrap();
        media.add_options(":no-video").unwrap();

        let handle = media.as_raw().unwrap();
        assert_eq!(memory.media_options(handle), vec![":start-time=10", ":no-video"]);
    }

    #[test]
    fn test_add_options_engine_error() {
        let (memory, engine) = engine();
        let mut media = Media::new_in(&engine, "/a.mp4", true).unwrap();

        memory.raise_on_next_call("bad option");
        assert!(matches!(
            media.add_options(":bogus"),
            Err(Error::Engine(ref m)) if m == "bad option"
        ));
    }

    #[test]
    fn test_state_reported_by_engine() {
        let (memory, engine) = engine();
        let media = Media::new_in(&engine, "/a.mp4", true).unwrap();
        assert_eq!(media.state().unwrap(), MediaState::NothingSpecial);

        memory.set_media_state(media.as_raw().unwrap(), MediaState::Playing);
        assert_eq!(media.state().unwrap(), MediaState::Playing);
    }

    #[test]
    fn test_drop_releases_handle() {
        let (memory, engine) = engine();
        {
            let _media = Media::new_in(&engine, "/a.mp4", true).unwrap();
            assert_eq!(memory.live_media(), 1);
        }
        assert_eq!(memory.live_media(), 0);
    }
}
