//! libvlc FFI backend
//!
//! Safe wrapper around the libvlc C library implementing [`NativeEngine`].
//! Implements RAII for the engine instance: dropping [`LibVlc`] releases it.
//!
//! # Architecture
//! - FFI bindings to the libvlc 3.x media and media list API
//! - Pointers travel through the binding layer as opaque handle newtypes
//! - Last-error slot mapped to `libvlc_errmsg` / `libvlc_clearerr`
//!
//! # Safety
//! Every handle passed to the engine methods was produced by this instance
//! and not yet released; `Media` and `MediaList` guarantee this by nulling
//! their handle on release and refusing handles from another engine.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};

use tracing::{debug, info};

use crate::engine::{NativeEngine, NativeEventManager, NativeList, NativeMedia};
use crate::media::MediaState;
use crate::{Error, Result};

// ============================================================================
// FFI Bindings
// ============================================================================

mod ffi {
    use super::*;

    pub type InstancePtr = *mut c_void;
    pub type MediaPtr = *mut c_void;
    pub type MediaListPtr = *mut c_void;
    pub type EventManagerPtr = *mut c_void;

    #[link(name = "vlc")]
    extern "C" {
        pub fn libvlc_new(argc: c_int, argv: *const *const c_char) -> InstancePtr;
        pub fn libvlc_release(instance: InstancePtr);
        pub fn libvlc_errmsg() -> *const c_char;
        pub fn libvlc_clearerr();
        pub fn libvlc_free(ptr: *mut c_void);

        pub fn libvlc_media_new_path(instance: InstancePtr, path: *const c_char) -> MediaPtr;
        pub fn libvlc_media_new_location(instance: InstancePtr, mrl: *const c_char) -> MediaPtr;
        pub fn libvlc_media_add_option(media: MediaPtr, option: *const c_char);
        pub fn libvlc_media_get_mrl(media: MediaPtr) -> *mut c_char;
        pub fn libvlc_media_get_state(media: MediaPtr) -> c_int;
        pub fn libvlc_media_release(media: MediaPtr);

        pub fn libvlc_media_list_new(instance: InstancePtr) -> MediaListPtr;
        pub fn libvlc_media_list_release(list: MediaListPtr);
        pub fn libvlc_media_list_add_media(list: MediaListPtr, media: MediaPtr) -> c_int;
        pub fn libvlc_media_list_insert_media(
            list: MediaListPtr,
            media: MediaPtr,
            index: c_int,
        ) -> c_int;
        pub fn libvlc_media_list_remove_index(list: MediaListPtr, index: c_int) -> c_int;
        pub fn libvlc_media_list_count(list: MediaListPtr) -> c_int;
        pub fn libvlc_media_list_index_of_item(list: MediaListPtr, media: MediaPtr) -> c_int;
        pub fn libvlc_media_list_is_readonly(list: MediaListPtr) -> c_int;
        pub fn libvlc_media_list_lock(list: MediaListPtr);
        pub fn libvlc_media_list_unlock(list: MediaListPtr);
        pub fn libvlc_media_list_event_manager(list: MediaListPtr) -> EventManagerPtr;
    }
}

// ============================================================================
// RAII Wrapper
// ============================================================================

/// libvlc engine instance
pub struct LibVlc {
    instance: ffi::InstancePtr,
}

// SAFETY: libvlc instances, media and media lists are internally
// synchronized; the error message slot is thread-local.
unsafe impl Send for LibVlc {}
unsafe impl Sync for LibVlc {}

impl LibVlc {
    /// Create a libvlc instance with command-line style arguments
    ///
    /// # Errors
    /// - [`Error::InvalidString`] if an argument contains a NUL byte
    /// - [`Error::Engine`] / [`Error::AllocationFailed`] if libvlc fails to start
    pub fn new(args: &[String]) -> Result<Self> {
        let c_args = args
            .iter()
            .map(|arg| CString::new(arg.as_str()).map_err(|_| Error::InvalidString(arg.clone())))
            .collect::<Result<Vec<_>>>()?;
        let argv: Vec<*const c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();

        let instance = unsafe {
            ffi::libvlc_clearerr();
            ffi::libvlc_new(argv.len() as c_int, argv.as_ptr())
        };

        if instance.is_null() {
            return Err(Error::from_slot(
                read_errmsg(),
                Error::AllocationFailed("libvlc instance"),
            ));
        }

        info!("libvlc instance created with {} argument(s)", args.len());
        Ok(Self { instance })
    }
}

impl Drop for LibVlc {
    fn drop(&mut self) {
        debug!("Releasing libvlc instance");
        unsafe {
            ffi::libvlc_release(self.instance);
        }
    }
}

fn read_errmsg() -> Option<String> {
    unsafe {
        let message = ffi::libvlc_errmsg();
        if message.is_null() {
            None
        } else {
            Some(CStr::from_ptr(message).to_string_lossy().into_owned())
        }
    }
}

fn media_ptr(media: NativeMedia) -> ffi::MediaPtr {
    media.as_raw() as ffi::MediaPtr
}

fn list_ptr(list: NativeList) -> ffi::MediaListPtr {
    list.as_raw() as ffi::MediaListPtr
}

impl NativeEngine for LibVlc {
    fn name(&self) -> &str {
        "libvlc"
    }

    fn media_new_path(&self, path: &str) -> Option<NativeMedia> {
        let c_path = CString::new(path).ok()?;
        let media = unsafe { ffi::libvlc_media_new_path(self.instance, c_path.as_ptr()) };
        NativeMedia::from_raw(media as usize)
    }

    fn media_new_location(&self, location: &str) -> Option<NativeMedia> {
        let c_location = CString::new(location).ok()?;
        let media = unsafe { ffi::libvlc_media_new_location(self.instance, c_location.as_ptr()) };
        NativeMedia::from_raw(media as usize)
    }

    fn media_add_option(&self, media: NativeMedia, option: &str) {
        // Callers reject NUL bytes before reaching the engine
        if let Ok(c_option) = CString::new(option) {
            unsafe { ffi::libvlc_media_add_option(media_ptr(media), c_option.as_ptr()) }
        }
    }

    fn media_get_mrl(&self, media: NativeMedia) -> Option<String> {
        unsafe {
            let c_mrl = ffi::libvlc_media_get_mrl(media_ptr(media));
            if c_mrl.is_null() {
                return None;
            }
            let mrl = CStr::from_ptr(c_mrl).to_string_lossy().into_owned();
            // Allocated by libvlc, must be freed by libvlc
            ffi::libvlc_free(c_mrl as *mut c_void);
            Some(mrl)
        }
    }

    fn media_get_state(&self, media: NativeMedia) -> MediaState {
        let raw = unsafe { ffi::libvlc_media_get_state(media_ptr(media)) };
        u32::try_from(raw)
            .ok()
            .and_then(MediaState::from_raw)
            .unwrap_or(MediaState::Error)
    }

    fn media_release(&self, media: NativeMedia) {
        unsafe { ffi::libvlc_media_release(media_ptr(media)) }
    }

    fn list_new(&self) -> Option<NativeList> {
        let list = unsafe { ffi::libvlc_media_list_new(self.instance) };
        NativeList::from_raw(list as usize)
    }

    fn list_release(&self, list: NativeList) {
        unsafe { ffi::libvlc_media_list_release(list_ptr(list)) }
    }

    fn list_add_media(&self, list: NativeList, media: NativeMedia) -> i32 {
        unsafe { ffi::libvlc_media_list_add_media(list_ptr(list), media_ptr(media)) }
    }

    fn list_insert_media(&self, list: NativeList, media: NativeMedia, index: i32) -> i32 {
        unsafe { ffi::libvlc_media_list_insert_media(list_ptr(list), media_ptr(media), index) }
    }

    fn list_remove_index(&self, list: NativeList, index: i32) -> i32 {
        unsafe { ffi::libvlc_media_list_remove_index(list_ptr(list), index) }
    }

    fn list_count(&self, list: NativeList) -> i32 {
        unsafe { ffi::libvlc_media_list_count(list_ptr(list)) }
    }

    fn list_index_of_item(&self, list: NativeList, media: NativeMedia) -> i32 {
        unsafe { ffi::libvlc_media_list_index_of_item(list_ptr(list), media_ptr(media)) }
    }

    fn list_is_readonly(&self, list: NativeList) -> bool {
        unsafe { ffi::libvlc_media_list_is_readonly(list_ptr(list)) != 0 }
    }

    fn list_lock(&self, list: NativeList) {
        unsafe { ffi::libvlc_media_list_lock(list_ptr(list)) }
    }

    fn list_unlock(&self, list: NativeList) {
        unsafe { ffi::libvlc_media_list_unlock(list_ptr(list)) }
    }

    fn list_event_manager(&self, list: NativeList) -> Option<NativeEventManager> {
        let manager = unsafe { ffi::libvlc_media_list_event_manager(list_ptr(list)) };
        NativeEventManager::from_raw(manager as usize)
    }

    fn last_error(&self) -> Option<String> {
        read_errmsg()
    }

    fn clear_error(&self) {
        unsafe { ffi::libvlc_clearerr() }
    }
}

// ============================================================================
// Tests (require the system libvlc)
// ============================================================================
