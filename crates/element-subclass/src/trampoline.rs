//! Boundary between foreign callbacks and host methods.
//!
//! Every `extern "C"` slot installed by [`extend`](crate::extend) funnels
//! through [`guard`]: it resolves the instance's registry handle, runs the
//! host method under `catch_unwind` and maps failures to the slot's native
//! failure signal.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use element_sys as sys;

use crate::config::{config, ResolveFailurePolicy};
use crate::error::ResolveError;
use crate::interface::TypeInit;
use crate::registry::{registry, Handle};
use crate::subclass::{parent_class, ClassBuilder, ClassInitData, ObjectSubclass};
use crate::types::Type;
use crate::Extendable;

const TARGET: &str = "element_subclass::trampoline";

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Runs `f`, converting a panic into `None` after logging it.
pub fn call_guarded<R>(context: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Some(result),
        Err(payload) => {
            log::error!(target: TARGET, "{context} panicked: {}", panic_message(payload.as_ref()));
            None
        }
    }
}

/// Host value stored behind `object`'s private slot.
pub(crate) unsafe fn instance_of<T: ObjectSubclass>(object: *const sys::el_object) -> Result<Arc<T>, ResolveError> {
    if object.is_null() {
        return Err(ResolveError::Invalid);
    }
    let handle = Handle::from_raw(sys::el_object_get_private(object)).ok_or(ResolveError::Unregistered)?;
    registry().resolve_as::<T>(handle)
}

fn resolve_failed<T: ObjectSubclass>(method: &str, err: ResolveError) {
    log::error!(target: TARGET, "{}::{method}: cannot resolve instance: {err}", T::NAME);
    if config().resolve_failure == ResolveFailurePolicy::Abort {
        std::process::abort();
    }
}

/// Dispatches `body` to the host instance of `object`. Returns `fallback`
/// when the instance cannot be resolved or the body panics.
pub(crate) unsafe fn guard<T: ObjectSubclass, R>(
    object: *mut sys::el_object,
    method: &'static str,
    fallback: R,
    body: impl FnOnce(&T) -> R,
) -> R {
    let imp = match instance_of::<T>(object) {
        Ok(imp) => imp,
        Err(err) => {
            resolve_failed::<T>(method, err);
            return fallback;
        }
    };
    match panic::catch_unwind(AssertUnwindSafe(|| body(&imp))) {
        Ok(result) => result,
        Err(payload) => {
            log::error!(target: TARGET, "{}::{method} panicked: {}", T::NAME, panic_message(payload.as_ref()));
            fallback
        }
    }
}

/// Logs a host error and reports failure to the runtime.
pub(crate) fn report<T: ObjectSubclass>(method: &str, result: anyhow::Result<()>) -> sys::el_boolean {
    match result {
        Ok(()) => sys::EL_TRUE,
        Err(err) => {
            log::error!(target: TARGET, "{}::{method} failed: {err:#}", T::NAME);
            sys::EL_FALSE
        }
    }
}

/// Host form of a parent slot's boolean result.
pub(crate) fn check_parent(method: &str, ret: sys::el_boolean) -> anyhow::Result<()> {
    anyhow::ensure!(ret != sys::EL_FALSE, "parent {method} failed");
    Ok(())
}

pub(crate) unsafe extern "C" fn instance_init<T: ObjectSubclass>(instance: *mut sys::el_object, _klass: *mut c_void) {
    if sys::el_object_get_private(instance) != 0 {
        log::error!(target: TARGET, "{}: instance already carries a handle", T::NAME);
        return;
    }
    let Some(imp) = call_guarded(T::NAME, T::new) else {
        return;
    };
    match registry().register(Arc::new(imp)) {
        Ok(handle) => sys::el_object_set_private(instance, handle.into_raw()),
        Err(err) => log::error!(target: TARGET, "{}: {err}", T::NAME),
    }
}

pub(crate) unsafe extern "C" fn finalize<T: ObjectSubclass>(object: *mut sys::el_object) {
    let raw = (*object).private.swap(0, std::sync::atomic::Ordering::AcqRel);
    if let Some(handle) = Handle::from_raw(raw) {
        match registry().release(handle) {
            Ok(value) => {
                call_guarded(T::NAME, move || drop(value));
            }
            Err(err) => resolve_failed::<T>("finalize", err),
        }
    }
    let parent = parent_class::<T, sys::el_object_class>();
    if let Some(finalize) = parent.as_ref().and_then(|parent| parent.finalize) {
        finalize(object);
    }
}

pub(crate) unsafe extern "C" fn class_init<T: ObjectSubclass>(klass: *mut c_void, data: *mut c_void) {
    let data = &mut *(data as *mut ClassInitData);
    let overrides = data.overrides;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let type_ = (*(klass as *const sys::el_type_class)).type_;
        if let Some(type_) = Type::from_raw(type_) {
            T::type_init(&mut TypeInit::new(type_));
        }
        <T::ParentType as Extendable>::install(klass, &overrides);
        let object_class = klass as *mut sys::el_object_class;
        (*object_class).finalize = Some(finalize::<T>);

        for (index, pspec) in T::properties().iter().enumerate() {
            let installed = sys::el_object_class_install_property(object_class, index as u32 + 1, pspec.to_raw());
            if installed == sys::EL_FALSE {
                log::warn!(target: "element_subclass::extend", "{}: property `{}` was not installed", T::NAME, pspec.name());
            }
        }

        let mut builder = ClassBuilder::new(klass);
        T::class_init(&mut builder);
    }));
    if let Err(payload) = result {
        data.panic = Some(panic_message(payload.as_ref()));
    }
}
