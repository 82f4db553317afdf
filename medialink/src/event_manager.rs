//! Event manager handle
//!
//! The engine owns the event manager of each media list; this type only
//! borrows it. The lifetime ties it to the list it came from, so it can not
//! be used after the list is released.

use std::marker::PhantomData;

use crate::engine::NativeEventManager;
use crate::MediaList;

/// Non-owning handle to a media list's event manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventManager<'a> {
    handle: NativeEventManager,
    _list: PhantomData<&'a MediaList>,
}

impl<'a> EventManager<'a> {
    pub(crate) fn new(handle: NativeEventManager) -> Self {
        Self {
            handle,
            _list: PhantomData,
        }
    }

    /// Raw engine handle, for attaching event callbacks through the engine
    pub fn as_raw(&self) -> NativeEventManager {
        self.handle
    }
}
