//! In-process reference engine
//!
//! Behaves like the native engine as far as the binding layer can observe:
//! - Media are reference counted; a list retains every item it holds and
//!   drops that reference on removal or list release
//! - Each list carries a blocking, non-reentrant lock
//! - Failures are reported through a per-thread last-error slot, like the
//!   native engine's thread-local error message
//!
//! Also exposes inspection and fault injection used by tests (native call
//! counter, forced allocation failure, injected errors, rejected options,
//! read-only lists).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::trace;

use super::{NativeEngine, NativeEventManager, NativeList, NativeMedia};
use crate::media::MediaState;

/// Engine-side media item
#[derive(Debug)]
struct MediaSlot {
    mrl: String,
    options: Vec<String>,
    state: MediaState,
    refs: usize,
}

/// Engine-side list
struct ListSlot {
    items: Vec<usize>,
    read_only: bool,
    event_manager: usize,
    lock: Arc<ListLock>,
}

/// Blocking ownership flag
#[derive(Default)]
struct ListLock {
    held: Mutex<bool>,
    freed: Condvar,
}

impl ListLock {
    fn acquire(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .freed
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    /// Returns false if the lock was not held
    fn release(&self) -> bool {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let was_held = std::mem::replace(&mut *held, false);
        self.freed.notify_one();
        was_held
    }
}

#[derive(Default)]
struct State {
    media: HashMap<usize, MediaSlot>,
    lists: HashMap<usize, ListSlot>,
}

impl State {
    fn retain(&mut self, id: usize) {
        if let Some(slot) = self.media.get_mut(&id) {
            slot.refs += 1;
        }
    }

    /// Drop one reference; frees the item on the last one
    fn unref(&mut self, id: usize) -> bool {
        let Some(slot) = self.media.get_mut(&id) else {
            return false;
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            self.media.remove(&id);
        }
        true
    }
}

/// In-process implementation of [`NativeEngine`]
pub struct MemoryEngine {
    state: Mutex<State>,
    /// Last error per calling thread
    last_error: Mutex<HashMap<ThreadId, String>>,
    next_id: AtomicUsize,
    native_calls: AtomicUsize,
    fail_next_allocation: AtomicBool,
    pending_error: Mutex<Option<String>>,
    rejected_option: Mutex<Option<String>>,
    hide_event_managers: AtomicBool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            last_error: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            native_calls: AtomicUsize::new(0),
            fail_next_allocation: AtomicBool::new(false),
            pending_error: Mutex::new(None),
            rejected_option: Mutex::new(None),
            hide_event_managers: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Number of primitive calls made so far (error slot access not counted)
    pub fn native_calls(&self) -> usize {
        self.native_calls.load(Ordering::SeqCst)
    }

    /// Media items still alive engine-side (owned or held by a list)
    pub fn live_media(&self) -> usize {
        self.state().media.len()
    }

    pub fn live_lists(&self) -> usize {
        self.state().lists.len()
    }

    /// Engine-side reference count of a media item (0 once freed)
    pub fn media_refs(&self, media: NativeMedia) -> usize {
        self.state()
            .media
            .get(&media.as_raw())
            .map(|slot| slot.refs)
            .unwrap_or(0)
    }

    /// Options applied to a media item, in order
    pub fn media_options(&self, media: NativeMedia) -> Vec<String> {
        self.state()
            .media
            .get(&media.as_raw())
            .map(|slot| slot.options.clone())
            .unwrap_or_default()
    }

    /// MRLs of a list's items, in index order
    pub fn list_mrls(&self, list: NativeList) -> Vec<String> {
        let state = self.state();
        state
            .lists
            .get(&list.as_raw())
            .map(|slot| {
                slot.items
                    .iter()
                    .filter_map(|id| state.media.get(id).map(|m| m.mrl.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether some thread currently owns the list lock
    pub fn is_list_locked(&self, list: NativeList) -> bool {
        self.state()
            .lists
            .get(&list.as_raw())
            .map(|slot| *slot.lock.held.lock().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------------

    /// Next media or list allocation returns null
    pub fn fail_next_allocation(&self) {
        self.fail_next_allocation.store(true, Ordering::SeqCst);
    }

    /// Next primitive call reports `message` through the last-error slot
    pub fn raise_on_next_call(&self, message: &str) {
        *self
            .pending_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    /// `media_add_option` refuses `option` (reported through the error slot)
    pub fn reject_option(&self, option: &str) {
        *self
            .rejected_option
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(option.to_string());
    }

    /// Leave an error in the slot as if an unrelated earlier call failed
    pub fn set_stale_error(&self, message: &str) {
        self.set_error(message);
    }

    /// Lists stop exposing their event manager
    pub fn hide_event_managers(&self, hide: bool) {
        self.hide_event_managers.store(hide, Ordering::SeqCst);
    }

    pub fn set_read_only(&self, list: NativeList, read_only: bool) {
        if let Some(slot) = self.state().lists.get_mut(&list.as_raw()) {
            slot.read_only = read_only;
        }
    }

    pub fn set_media_state(&self, media: NativeMedia, state: MediaState) {
        if let Some(slot) = self.state().media.get_mut(&media.as_raw()) {
            slot.state = state;
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn error_slots(&self) -> MutexGuard<'_, HashMap<ThreadId, String>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_error(&self, message: &str) {
        self.error_slots()
            .insert(thread::current().id(), message.to_string());
    }

    /// Count a primitive call and apply any injected error
    fn enter(&self, primitive: &str) {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        trace!("memory engine: {}", primitive);

        let pending = self
            .pending_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(message) = pending {
            self.set_error(&message);
        }
    }

    fn allocate_id(&self) -> Option<usize> {
        if self.fail_next_allocation.swap(false, Ordering::SeqCst) {
            self.set_error("allocation failed");
            return None;
        }
        Some(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn new_media(&self, mrl: String) -> Option<NativeMedia> {
        let id = self.allocate_id()?;
        self.state().media.insert(
            id,
            MediaSlot {
                mrl,
                options: Vec::new(),
                state: MediaState::NothingSpecial,
                refs: 1,
            },
        );
        NativeMedia::from_raw(id)
    }

    fn list_lock_of(&self, list: NativeList) -> Option<Arc<ListLock>> {
        self.state()
            .lists
            .get(&list.as_raw())
            .map(|slot| slot.lock.clone())
    }

    /// Insert at `index`, or append when `None`; returns the native status
    fn insert_item(&self, list: NativeList, media: NativeMedia, index: Option<i32>) -> i32 {
        let mut state = self.state();
        let id = media.as_raw();

        let failure = if !state.media.contains_key(&id) {
            Some("unknown media")
        } else {
            match state.lists.get_mut(&list.as_raw()) {
                None => Some("unknown media list"),
                Some(slot) if slot.read_only => Some("media list is read-only"),
                Some(slot) => {
                    let position = match index {
                        None => Some(slot.items.len()),
                        Some(index) => usize::try_from(index)
                            .ok()
                            .filter(|&index| index <= slot.items.len()),
                    };
                    match position {
                        Some(position) => {
                            slot.items.insert(position, id);
                            None
                        }
                        None => Some("index out of bounds"),
                    }
                }
            }
        };

        match failure {
            None => {
                state.retain(id);
                0
            }
            Some(message) => {
                drop(state);
                self.set_error(message);
                -1
            }
        }
    }
}

impl NativeEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    fn media_new_path(&self, path: &str) -> Option<NativeMedia> {
        self.enter("media_new_path");
        if path.is_empty() {
            self.set_error("invalid media path");
            return None;
        }
        let mrl = if path.starts_with('/') {
            format!("file://{}", path)
        } else {
            format!("file:///{}", path)
        };
        self.new_media(mrl)
    }

    fn media_new_location(&self, location: &str) -> Option<NativeMedia> {
        self.enter("media_new_location");
        if !location.contains("://") {
            self.set_error(&format!("invalid media location: {}", location));
            return None;
        }
        self.new_media(location.to_string())
    }

    fn media_add_option(&self, media: NativeMedia, option: &str) {
        self.enter("media_add_option");
        let rejected = self
            .rejected_option
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(option);
        if rejected {
            self.set_error(&format!("option rejected: {}", option));
            return;
        }
        match self.state().media.get_mut(&media.as_raw()) {
            Some(slot) => slot.options.push(option.to_string()),
            None => self.set_error("unknown media"),
        }
    }

    fn media_get_mrl(&self, media: NativeMedia) -> Option<String> {
        self.enter("media_get_mrl");
        self.state()
            .media
            .get(&media.as_raw())
            .map(|slot| slot.mrl.clone())
    }

    fn media_get_state(&self, media: NativeMedia) -> MediaState {
        self.enter("media_get_state");
        self.state()
            .media
            .get(&media.as_raw())
            .map(|slot| slot.state)
            .unwrap_or(MediaState::Error)
    }

    fn media_release(&self, media: NativeMedia) {
        self.enter("media_release");
        if !self.state().unref(media.as_raw()) {
            self.set_error("unknown media");
        }
    }

    fn list_new(&self) -> Option<NativeList> {
        self.enter("list_new");
        let id = self.allocate_id()?;
        let event_manager = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.state().lists.insert(
            id,
            ListSlot {
                items: Vec::new(),
                read_only: false,
                event_manager,
                lock: Arc::new(ListLock::default()),
            },
        );
        NativeList::from_raw(id)
    }

    fn list_release(&self, list: NativeList) {
        self.enter("list_release");
        let mut state = self.state();
        let removed = state.lists.remove(&list.as_raw());
        match removed {
            Some(slot) => {
                for id in slot.items {
                    state.unref(id);
                }
            }
            None => {
                drop(state);
                self.set_error("unknown media list");
            }
        }
    }

    fn list_add_media(&self, list: NativeList, media: NativeMedia) -> i32 {
        self.enter("list_add_media");
        self.insert_item(list, media, None)
    }

    fn list_insert_media(&self, list: NativeList, media: NativeMedia, index: i32) -> i32 {
        self.enter("list_insert_media");
        self.insert_item(list, media, Some(index))
    }

    fn list_remove_index(&self, list: NativeList, index: i32) -> i32 {
        self.enter("list_remove_index");
        let mut state = self.state();

        let removed = match state.lists.get_mut(&list.as_raw()) {
            None => Err("unknown media list"),
            Some(slot) if slot.read_only => Err("media list is read-only"),
            Some(slot) => match usize::try_from(index) {
                Ok(index) if index < slot.items.len() => Ok(slot.items.remove(index)),
                _ => Err("index out of bounds"),
            },
        };

        match removed {
            Ok(id) => {
                state.unref(id);
                0
            }
            Err(message) => {
                drop(state);
                self.set_error(message);
                -1
            }
        }
    }

    fn list_count(&self, list: NativeList) -> i32 {
        self.enter("list_count");
        let count = self
            .state()
            .lists
            .get(&list.as_raw())
            .map(|slot| i32::try_from(slot.items.len()).unwrap_or(i32::MAX));
        count.unwrap_or_else(|| {
            self.set_error("unknown media list");
            0
        })
    }

    fn list_index_of_item(&self, list: NativeList, media: NativeMedia) -> i32 {
        self.enter("list_index_of_item");
        self.state()
            .lists
            .get(&list.as_raw())
            .and_then(|slot| slot.items.iter().position(|&id| id == media.as_raw()))
            .and_then(|index| i32::try_from(index).ok())
            .unwrap_or(-1)
    }

    fn list_is_readonly(&self, list: NativeList) -> bool {
        self.enter("list_is_readonly");
        self.state()
            .lists
            .get(&list.as_raw())
            .map(|slot| slot.read_only)
            .unwrap_or(false)
    }

    fn list_lock(&self, list: NativeList) {
        self.enter("list_lock");
        // Block outside the state mutex so other lists stay usable
        match self.list_lock_of(list) {
            Some(lock) => lock.acquire(),
            None => self.set_error("unknown media list"),
        }
    }

    fn list_unlock(&self, list: NativeList) {
        self.enter("list_unlock");
        match self.list_lock_of(list) {
            Some(lock) => {
                if !lock.release() {
                    self.set_error("media list is not locked");
                }
            }
            None => self.set_error("unknown media list"),
        }
    }

    fn list_event_manager(&self, list: NativeList) -> Option<NativeEventManager> {
        self.enter("list_event_manager");
        if self.hide_event_managers.load(Ordering::SeqCst) {
            return None;
        }
        self.state()
            .lists
            .get(&list.as_raw())
            .and_then(|slot| NativeEventManager::from_raw(slot.event_manager))
    }

    fn last_error(&self) -> Option<String> {
        self.error_slots().get(&thread::current().id()).cloned()
    }

    fn clear_error(&self) {
        self.error_slots().remove(&thread::current().id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_path_and_location_mrls() {
        let engine = MemoryEngine::new();
        let local = engine.media_new_path("/music/a.mp3").unwrap();
        let relative = engine.media_new_path("a.mp4").unwrap();
        let remote = engine.media_new_location("http://example.com/s.ogg").unwrap();

        assert_eq!(engine.media_get_mrl(local).unwrap(), "file:///music/a.mp3");
        assert_eq!(engine.media_get_mrl(relative).unwrap(), "file:///a.mp4");
        assert_eq!(engine.media_get_mrl(remote).unwrap(), "http://example.com/s.ogg");
    }

    #[test]
    fn test_invalid_location_sets_error() {
        let engine = MemoryEngine::new();
        assert!(engine.media_new_location("not a url").is_none());
        assert!(engine.last_error().unwrap().contains("invalid media location"));
    }

    #[test]
    fn test_list_retains_media() {
        let engine = MemoryEngine::new();
        let list = engine.list_new().unwrap();
        let media = engine.media_new_path("/a.mp4").unwrap();

        assert_eq!(engine.list_add_media(list, media), 0);
        assert_eq!(engine.media_refs(media), 2);

        // Owner releases; list keeps the item alive
        engine.media_release(media);
        assert_eq!(engine.media_refs(media), 1);
        assert_eq!(engine.list_count(list), 1);

        engine.list_release(list);
        assert_eq!(engine.live_media(), 0);
        assert_eq!(engine.live_lists(), 0);
    }

    #[test]
    fn test_remove_out_of_bounds() {
        let engine = MemoryEngine::new();
        let list = engine.list_new().unwrap();

        assert_eq!(engine.list_remove_index(list, 0), -1);
        assert_eq!(engine.last_error().unwrap(), "index out of bounds");
        assert_eq!(engine.list_remove_index(list, -1), -1);
    }

    #[test]
    fn test_read_only_list_rejects_mutation() {
        let engine = MemoryEngine::new();
        let list = engine.list_new().unwrap();
        let media = engine.media_new_path("/a.mp4").unwrap();
        engine.set_read_only(list, true);

        assert!(engine.list_is_readonly(list));
        assert_eq!(engine.list_add_media(list, media), -1);
        assert_eq!(engine.last_error().unwrap(), "media list is read-only");
    }

    #[test]
    fn test_fail_next_allocation_is_one_shot() {
        let engine = MemoryEngine::new();
        engine.fail_next_allocation();

        assert!(engine.list_new().is_none());
        assert!(engine.list_new().is_some());
    }

    #[test]
    fn test_unlock_without_lock_sets_error() {
        let engine = MemoryEngine::new();
        let list = engine.list_new().unwrap();

        engine.list_unlock(list);
        assert_eq!(engine.last_error().unwrap(), "media list is not locked");
    }

    #[test]
    fn test_lock_blocks_other_thread() {
        let engine = Arc::new(MemoryEngine::new());
        let list = engine.list_new().unwrap();
        engine.list_lock(list);

        let (tx, rx) = mpsc::channel();
        let worker = {
            let engine = engine.clone();
            thread::spawn(move || {
                engine.list_lock(list);
                tx.send(()).unwrap();
                engine.list_unlock(list);
            })
        };

        // Worker must still be waiting
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        engine.list_unlock(list);
        rx.recv_timeout(Duration::from_secs(5))
            .expect("worker should acquire the lock after unlock");
        worker.join().unwrap();
        assert!(!engine.is_list_locked(list));
    }

    #[test]
    fn test_error_slot_is_per_thread() {
        let engine = Arc::new(MemoryEngine::new());
        assert!(engine.media_new_location("not a url").is_none());

        let other = {
            let engine = engine.clone();
            thread::spawn(move || engine.last_error()).join().unwrap()
        };
        assert!(other.is_none());
        assert!(engine.last_error().unwrap().contains("invalid media location"));

        engine.clear_error();
        assert!(engine.last_error().is_none());
    }

    #[test]
    fn test_rejected_option_sets_error() {
        let engine = MemoryEngine::new();
        let media = engine.media_new_path("/a.mp4").unwrap();
        engine.reject_option(":bad");

        engine.media_add_option(media, ":good");
        assert!(engine.last_error().is_none());
        engine.media_add_option(media, ":bad");
        assert_eq!(engine.last_error().unwrap(), "option rejected: :bad");
        assert_eq!(engine.media_options(media), vec![":good"]);
    }

    #[test]
    fn test_error_slot_access_not_counted() {
        let engine = MemoryEngine::new();
        engine.clear_error();
        let _ = engine.last_error();
        assert_eq!(engine.native_calls(), 0);

        let _ = engine.list_new();
        assert_eq!(engine.native_calls(), 1);
    }
}
