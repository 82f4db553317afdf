//! Media list: ordered, lockable collection of media
//!
//! # Ownership
//! A [`MediaList`] owns only its own engine-side list. Items are shared with
//! the engine by reference count: adding a [`Media`] makes the engine retain
//! it, removing or releasing the list drops that reference again. The
//! [`Media`] object itself stays owned by whoever created it.
//!
//! # Locking
//! Index-based operations (size, insert, remove, clear) are only consistent
//! while the caller owns the list. They are therefore only reachable through
//! the [`MediaListLock`] guard returned by [`MediaList::lock`]; the native
//! lock is released when the guard is dropped or [`MediaListLock::unlock`]
//! is called. The guard is `!Send` because the engine requires unlock from
//! the thread that locked.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use medialink::{MediaList, MemoryEngine};
//!
//! # medialink::release();
//! medialink::init(Arc::new(MemoryEngine::new()))?;
//!
//! let mut list = MediaList::new()?;
//! list.add_media_from_path("a.mp4")?;
//! list.add_media_from_path("b.mp4")?;
//!
//! let guard = list.lock()?;
//! assert_eq!(guard.size()?, 2);
//! guard.remove_at_index(0)?;
//! assert_eq!(guard.size()?, 1);
//! guard.unlock()?;
//!
//! list.release()?;
//! list.release()?;
//! # medialink::release();
//! # Ok::<(), medialink::Error>(())
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{self, NativeEngine, NativeList};
use crate::event_manager::EventManager;
use crate::media::Media;
use crate::{Error, Result};

/// Owned handle to an engine-side media list
pub struct MediaList {
    engine: Arc<dyn NativeEngine>,
    handle: Option<NativeList>,
}

impl MediaList {
    /// Create an empty media list on the process-wide engine
    ///
    /// # Errors
    /// - [`Error::NotInitialized`] if no engine is installed
    /// - [`Error::Engine`] / [`Error::AllocationFailed`] if the engine
    ///   returns a null handle
    pub fn new() -> Result<Self> {
        Self::new_in(&engine::instance()?)
    }

    /// Create an empty media list on an explicit engine
    pub fn new_in(engine: &Arc<dyn NativeEngine>) -> Result<Self> {
        let (handle, err) = engine::call(engine.as_ref(), |e| e.list_new());
        let Some(handle) = handle else {
            return Err(Error::from_slot(err, Error::AllocationFailed("media list")));
        };

        debug!("Created media list {:?}", handle);
        Ok(Self {
            engine: engine.clone(),
            handle: Some(handle),
        })
    }

    /// Release the engine-side list
    ///
    /// Idempotent. Media previously added are not released: their owners
    /// keep them, the engine drops only the list's own references.
    pub fn release(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        debug!("Releasing media list {:?}", handle);
        engine::call_unit(self.engine.as_ref(), |e| e.list_release(handle))
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Raw engine handle, `None` once released
    pub fn as_raw(&self) -> Option<NativeList> {
        self.handle
    }

    /// Append `media` at the end of the list
    ///
    /// # Errors
    /// - [`Error::MediaListReleased`] if the list was released (checked first)
    /// - [`Error::MediaReleased`] if the media was released
    /// - [`Error::EngineMismatch`] if the media comes from another engine
    /// - [`Error::Engine`] / [`Error::AddFailed`] if the engine refuses
    pub fn add_media(&self, media: &Media) -> Result<()> {
        let list = self.native()?;
        let item = media.native()?;
        if !engine::same_engine(&self.engine, media.engine()) {
            return Err(Error::EngineMismatch);
        }

        let (status, err) = engine::call(self.engine.as_ref(), |e| e.list_add_media(list, item));
        if status != 0 {
            return Err(Error::from_slot(err, Error::AddFailed));
        }

        debug!("Added media {:?} to list {:?}", item, list);
        Ok(())
    }

    /// Create a media from a local path and append it
    pub fn add_media_from_path(&self, path: &str) -> Result<()> {
        self.add_new_media(path, true)
    }

    /// Create a media from a remote location and append it
    pub fn add_media_from_url(&self, url: &str) -> Result<()> {
        self.add_new_media(url, false)
    }

    /// The temporary media is released on return whether or not the add
    /// succeeded; on success the list's own reference keeps the item alive.
    fn add_new_media(&self, location: &str, local: bool) -> Result<()> {
        self.native()?;
        let mut media = Media::new_in(&self.engine, location, local)?;
        let added = self.add_media(&media);
        let released = media.release();
        added.and(released)
    }

    /// Take ownership of the list, blocking while another owner holds it
    ///
    /// The returned guard unlocks on drop. If the engine reports an error
    /// for the lock call, the list is unlocked again before returning.
    pub fn lock(&self) -> Result<MediaListLock<'_>> {
        let handle = self.native()?;
        let ((), err) = engine::call(self.engine.as_ref(), |e| e.list_lock(handle));

        // The native lock is held once list_lock returns
        let guard = MediaListLock {
            list: self,
            handle,
            held: true,
            _not_send: PhantomData,
        };
        match err {
            None => Ok(guard),
            Some(message) => {
                drop(guard);
                Err(Error::Engine(message))
            }
        }
    }

    /// Event manager of this list
    ///
    /// Retrieves the engine's existing event manager; repeated calls return
    /// the same handle for the lifetime of the list.
    pub fn event_manager(&self) -> Result<EventManager<'_>> {
        let handle = self.native()?;
        let (manager, _) = engine::call(self.engine.as_ref(), |e| e.list_event_manager(handle));
        manager
            .map(EventManager::new)
            .ok_or(Error::EventManagerUnavailable)
    }

    /// Whether the engine forbids mutation of this list
    pub fn is_read_only(&self) -> Result<bool> {
        let handle = self.native()?;
        let (read_only, _) = engine::call(self.engine.as_ref(), |e| e.list_is_readonly(handle));
        Ok(read_only)
    }

    fn native(&self) -> Result<NativeList> {
        self.handle.ok_or(Error::MediaListReleased)
    }
}

impl Drop for MediaList {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release media list on drop: {}", e);
        }
    }
}

impl fmt::Debug for MediaList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaList")
            .field("engine", &self.engine.name())
            .field("handle", &self.handle)
            .finish()
    }
}

// ============================================================================
// Lock guard
// ============================================================================

/// Proof that the calling thread owns a [`MediaList`]
///
/// Holds a shared borrow of the list, so the list can not be released while
/// locked. Unlocks on drop.
pub struct MediaListLock<'a> {
    list: &'a MediaList,
    handle: NativeList,
    held: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> MediaListLock<'a> {
    /// Number of items in the list
    pub fn size(&self) -> Result<usize> {
        let (count, err) = engine::call(self.engine(), |e| e.list_count(self.handle));
        if let Some(message) = err {
            return Err(Error::Engine(message));
        }
        usize::try_from(count)
            .map_err(|_| Error::Engine(format!("engine reported invalid count {}", count)))
    }

    /// Detach the item at `index`
    ///
    /// The removed media is not released; whoever owns it still does.
    ///
    /// # Errors
    /// [`Error::RemoveFailed`] if the engine reports a non-zero status
    /// (e.g. index out of bounds).
    pub fn remove_at_index(&self, index: usize) -> Result<()> {
        let native_index = i32::try_from(index).map_err(|_| Error::RemoveFailed { index })?;
        let (status, _) =
            engine::call(self.engine(), |e| e.list_remove_index(self.handle, native_index));

        if status != 0 {
            return Err(Error::RemoveFailed { index });
        }

        debug!("Removed index {} from list {:?}", index, self.handle);
        Ok(())
    }

    /// Keep the first `keep` items and remove everything after them
    ///
    /// Removes from the end towards `keep` so earlier indices never shift.
    /// Stops at the first failed removal; items removed before it stay
    /// removed.
    pub fn clear_list(&self, keep: usize) -> Result<()> {
        let size = self.size()?;
        if size <= keep {
            return Ok(());
        }

        for index in (keep..size).rev() {
            self.remove_at_index(index)?;
        }

        debug!(
            "Cleared list {:?} from {} down to {} items",
            self.handle, size, keep
        );
        Ok(())
    }

    /// Insert `media` at `index`, shifting later items right
    pub fn insert_media(&self, media: &Media, index: usize) -> Result<()> {
        let item = media.native()?;
        if !engine::same_engine(&self.list.engine, media.engine()) {
            return Err(Error::EngineMismatch);
        }
        let native_index = i32::try_from(index).map_err(|_| Error::InsertFailed { index })?;

        let (status, err) = engine::call(self.engine(), |e| {
            e.list_insert_media(self.handle, item, native_index)
        });
        if status != 0 {
            return Err(Error::from_slot(err, Error::InsertFailed { index }));
        }
        Ok(())
    }

    /// Position of `media` in the list, `None` if absent
    pub fn index_of(&self, media: &Media) -> Result<Option<usize>> {
        let item = media.native()?;
        if !engine::same_engine(&self.list.engine, media.engine()) {
            return Ok(None);
        }

        let (index, _) = engine::call(self.engine(), |e| e.list_index_of_item(self.handle, item));
        Ok(usize::try_from(index).ok())
    }

    /// Release ownership of the list, reporting engine errors
    pub fn unlock(mut self) -> Result<()> {
        self.held = false;
        let handle = self.handle;
        engine::call_unit(self.engine(), |e| e.list_unlock(handle))
    }

    fn engine(&self) -> &dyn NativeEngine {
        self.list.engine.as_ref()
    }
}

impl Drop for MediaListLock<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }

        let handle = self.handle;
        if let Err(e) = engine::call_unit(self.engine(), |e| e.list_unlock(handle)) {
            warn!("Failed to unlock media list on drop: {}", e);
        }
    }
}

impl fmt::Debug for MediaListLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaListLock")
            .field("handle", &self.handle)
            .finish()
    }
}
