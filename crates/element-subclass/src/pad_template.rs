//! Pad templates of element classes.

use std::ffi::CString;

use element_sys as sys;

use crate::base_transform::PadDirection;
use crate::caps::Caps;
use crate::element::Element;
use crate::subclass::ClassBuilder;
use crate::types::{IsA, Type};
use crate::value::{cstring_lossy, string_from_ptr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadPresence {
    Always,
    Sometimes,
    Request,
}

impl PadPresence {
    pub fn from_raw(raw: sys::el_pad_presence) -> Option<Self> {
        match raw {
            sys::EL_PAD_ALWAYS => Some(PadPresence::Always),
            sys::EL_PAD_SOMETIMES => Some(PadPresence::Sometimes),
            sys::EL_PAD_REQUEST => Some(PadPresence::Request),
            _ => None,
        }
    }

    pub fn into_raw(self) -> sys::el_pad_presence {
        match self {
            PadPresence::Always => sys::EL_PAD_ALWAYS,
            PadPresence::Sometimes => sys::EL_PAD_SOMETIMES,
            PadPresence::Request => sys::EL_PAD_REQUEST,
        }
    }
}

/// Pads an element class can create. `name` may be a pattern such as
/// `src_%u`.
#[derive(Debug, Clone, PartialEq)]
pub struct PadTemplate {
    name: String,
    direction: PadDirection,
    presence: PadPresence,
    caps: Caps,
}

impl PadTemplate {
    pub fn new(name: &str, direction: PadDirection, presence: PadPresence, caps: Caps) -> Self {
        Self {
            name: name.to_owned(),
            direction,
            presence,
            caps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PadDirection {
        self.direction
    }

    pub fn presence(&self) -> PadPresence {
        self.presence
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    /// Copies a runtime template; `None` for a null pointer or an unknown
    /// presence.
    ///
    /// # Safety
    /// `templ` must be null or a valid template.
    pub unsafe fn from_raw(templ: *const sys::el_pad_template) -> Option<Self> {
        let templ = templ.as_ref()?;
        let name = string_from_ptr(templ.name_template, "pad template name")?;
        let presence = PadPresence::from_raw(templ.presence)?;
        let caps = Caps::from_raw_full(sys::el_caps_ref(templ.caps))?;
        Some(Self {
            name,
            direction: PadDirection::from_raw(templ.direction),
            presence,
            caps,
        })
    }
}

impl ClassBuilder {
    /// Adds `templ`, replacing a template of the same name added to this
    /// class before. Ignored with a warning for non-elements.
    pub fn add_pad_template(&mut self, templ: &PadTemplate) {
        if !self.is_element() {
            return;
        }
        let name = cstring_lossy(&templ.name, "pad template name");
        unsafe {
            let raw = sys::el_pad_template_new(
                name.as_ptr(),
                templ.direction.into_raw(),
                templ.presence.into_raw(),
                templ.caps.as_ptr() as *mut sys::el_caps,
            );
            sys::el_element_class_add_pad_template(self.as_ptr().cast(), raw);
        }
    }
}

fn element_class(type_: Type) -> Option<*const sys::el_element_class> {
    let element = unsafe { sys::el_element_get_type() };
    if !type_.is_a(Type(element)) {
        return None;
    }
    Some(unsafe { sys::el_type_class_peek(type_.into_raw()) as *const sys::el_element_class })
}

/// Templates of an element type and its ancestors, closest first. A subclass
/// template hides an inherited one of the same name.
pub fn element_pad_templates(type_: Type) -> Vec<PadTemplate> {
    let Some(klass) = element_class(type_) else {
        return Vec::new();
    };
    unsafe {
        (0..sys::el_element_class_get_n_pad_templates(klass))
            .filter_map(|index| PadTemplate::from_raw(sys::el_element_class_get_pad_template_nth(klass, index)))
            .collect()
    }
}

/// Template `name` of an element type, inherited from ancestors.
pub fn element_pad_template(type_: Type, name: &str) -> Option<PadTemplate> {
    let klass = element_class(type_)?;
    let name = CString::new(name).ok()?;
    unsafe { PadTemplate::from_raw(sys::el_element_class_get_pad_template(klass, name.as_ptr())) }
}

pub trait PadTemplateExt: IsA<Element> {
    fn pad_template(&self, name: &str) -> Option<PadTemplate> {
        element_pad_template(Type(unsafe { sys::el_object_type(self.as_object_ptr()) }), name)
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        element_pad_templates(Type(unsafe { sys::el_object_type(self.as_object_ptr()) }))
    }
}

impl<O: IsA<Element>> PadTemplateExt for O {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_survives_the_raw_form() {
        for presence in [PadPresence::Always, PadPresence::Sometimes, PadPresence::Request] {
            assert_eq!(PadPresence::from_raw(presence.into_raw()), Some(presence));
        }
        assert_eq!(PadPresence::from_raw(3), None);
    }

    #[test]
    fn raw_template_copies_its_fields() {
        let caps = Caps::new("audio/x-raw");
        let templ = PadTemplate::new("src_%u", PadDirection::Src, PadPresence::Sometimes, caps.clone());
        unsafe {
            let name = CString::new(templ.name()).unwrap();
            let raw = sys::el_pad_template_new(
                name.as_ptr(),
                sys::EL_PAD_SRC,
                sys::EL_PAD_SOMETIMES,
                caps.as_ptr() as *mut sys::el_caps,
            );
            assert_eq!(PadTemplate::from_raw(raw), Some(templ));
            sys::el_pad_template_free(raw);
            assert!(PadTemplate::from_raw(std::ptr::null()).is_none());
        }
        assert_eq!(caps.refcount(), 1);
    }
}
