use parking_lot::lock_api::RawMutex as _;

use crate::{el_boolean, el_boolean_from};

/// Non-recursive mutex embedded in instance structs.
#[repr(C)]
pub struct el_mutex {
    raw: parking_lot::RawMutex,
}

impl el_mutex {
    pub const INIT: el_mutex = el_mutex {
        raw: parking_lot::RawMutex::INIT,
    };
}

pub unsafe extern "C" fn el_mutex_init(mutex: *mut el_mutex) {
    std::ptr::write(mutex, el_mutex::INIT);
}

pub unsafe extern "C" fn el_mutex_lock(mutex: *mut el_mutex) {
    (*mutex).raw.lock();
}

pub unsafe extern "C" fn el_mutex_trylock(mutex: *mut el_mutex) -> el_boolean {
    el_boolean_from((*mutex).raw.try_lock())
}

/// The calling thread must hold the lock.
pub unsafe extern "C" fn el_mutex_unlock(mutex: *mut el_mutex) {
    (*mutex).raw.unlock();
}

pub unsafe extern "C" fn el_mutex_is_locked(mutex: *const el_mutex) -> el_boolean {
    el_boolean_from((*mutex).raw.is_locked())
}
