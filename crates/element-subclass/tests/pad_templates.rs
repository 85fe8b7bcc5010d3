//! Pad templates and metadata entries added during class init.

mod common;

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::OnceLock;

use element_subclass::prelude::*;
use element_subclass::{
    element_metadata, element_pad_template, element_pad_templates, extend, sys, BaseSink, Caps, Element, Object,
    Overrides, PadDirection, PadPresence, PadTemplate, Type,
};
use log::Level;
use pretty_assertions::assert_eq;

unsafe extern "C" fn native_class_init(klass: *mut c_void, _data: *mut c_void) {
    let klass = klass as *mut sys::el_element_class;
    let caps = sys::el_caps_new(b"audio/x-raw\0".as_ptr().cast());
    let sink = sys::el_pad_template_new(b"sink\0".as_ptr().cast(), sys::EL_PAD_SINK, sys::EL_PAD_ALWAYS, caps);
    let src = sys::el_pad_template_new(b"src\0".as_ptr().cast(), sys::EL_PAD_SRC, sys::EL_PAD_ALWAYS, caps);
    sys::el_caps_unref(caps);
    sys::el_element_class_add_pad_template(klass, sink);
    sys::el_element_class_add_pad_template(klass, src);
    sys::el_element_class_add_metadata(klass, b"doc-uri\0".as_ptr().cast(), b"native.html\0".as_ptr().cast());
}

unsafe extern "C" fn native_templated_sink_get_type() -> sys::el_type {
    static TYPE: OnceLock<sys::el_type> = OnceLock::new();
    *TYPE.get_or_init(|| {
        let info = sys::el_type_info {
            class_size: size_of::<sys::el_base_sink_class>(),
            class_init: Some(native_class_init),
            class_data: ptr::null_mut(),
            instance_size: size_of::<sys::el_base_sink>(),
            instance_init: None,
        };
        sys::el_type_register_static(sys::el_base_sink_get_type(), b"NativeTemplatedSink\0".as_ptr().cast(), &info)
    })
}

element_subclass::object_wrapper!(
    /// Sink whose templates are added natively.
    pub struct NativeTemplatedSink(sys::el_base_sink) @type native_templated_sink_get_type(),
    @extends BaseSink, Element, Object
);

unsafe impl Extendable for NativeTemplatedSink {
    type Class = sys::el_base_sink_class;

    fn parent_type() -> Option<Type> {
        Some(BaseSink::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        BaseSink::install(klass, overrides);
    }
}

struct Decoder;

impl ObjectSubclass for Decoder {
    const NAME: &'static str = "TestTemplatedDecoder";
    type ParentType = NativeTemplatedSink;

    fn new() -> Self {
        Self
    }

    fn class_init(klass: &mut ClassBuilder) {
        klass.set_metadata("Templated decoder", "Codec/Decoder", "Adds pad templates", "element-subclass");
        klass.add_metadata("doc-uri", "decoder.html");
        klass.add_metadata("rank", "primary");
        klass.add_pad_template(&PadTemplate::new(
            "sink",
            PadDirection::Sink,
            PadPresence::Always,
            Caps::new("audio/x-flac"),
        ));
        klass.add_pad_template(&PadTemplate::new(
            "aux_%u",
            PadDirection::Src,
            PadPresence::Sometimes,
            Caps::new("text/plain"),
        ));
        klass.add_pad_template(&PadTemplate::new(
            "aux_%u",
            PadDirection::Src,
            PadPresence::Request,
            Caps::new("text/plain"),
        ));
    }
}

#[test]
fn subclass_templates_hide_inherited_ones_by_name() {
    let ty = extend!(Decoder).unwrap();
    let names: Vec<String> = element_pad_templates(ty).iter().map(|templ| templ.name().to_owned()).collect();
    assert_eq!(names, vec!["sink", "aux_%u", "src"]);

    let sink = element_pad_template(ty, "sink").unwrap();
    assert_eq!(sink.direction(), PadDirection::Sink);
    assert_eq!(sink.caps().media_type(), "audio/x-flac");

    let src = element_pad_template(ty, "src").unwrap();
    assert_eq!(src.direction(), PadDirection::Src);
    assert_eq!(src.presence(), PadPresence::Always);
    assert_eq!(src.caps().media_type(), "audio/x-raw");

    let parent = element_pad_template(NativeTemplatedSink::static_type(), "sink").unwrap();
    assert_eq!(parent.caps().media_type(), "audio/x-raw");
    assert_eq!(element_pad_templates(NativeTemplatedSink::static_type()).len(), 2);
}

#[test]
fn a_repeated_template_name_replaces_the_earlier_one() {
    let ty = extend!(Decoder).unwrap();
    let aux = element_pad_template(ty, "aux_%u").unwrap();
    assert_eq!(aux.presence(), PadPresence::Request);
    assert_eq!(aux, PadTemplate::new("aux_%u", PadDirection::Src, PadPresence::Request, Caps::new("text/plain")));
}

#[test]
fn templates_are_reachable_from_instances() {
    let ty = extend!(Decoder).unwrap();
    let decoder = ty.create::<Element>(None).unwrap();
    assert_eq!(decoder.pad_templates().len(), 3);
    assert!(decoder.pad_template("aux_%u").is_some());
    assert!(decoder.pad_template("missing").is_none());
    assert!(element_pad_templates(BaseSink::static_type()).is_empty());
}

#[test]
fn added_metadata_overrides_inherited_entries() {
    let ty = extend!(Decoder).unwrap();
    assert_eq!(element_metadata(ty, "doc-uri").as_deref(), Some("decoder.html"));
    assert_eq!(element_metadata(ty, "rank").as_deref(), Some("primary"));
    assert_eq!(element_metadata(ty, "long-name").as_deref(), Some("Templated decoder"));
    assert_eq!(element_metadata(NativeTemplatedSink::static_type(), "doc-uri").as_deref(), Some("native.html"));
    assert_eq!(element_metadata(NativeTemplatedSink::static_type(), "rank"), None);
}

/// Not an element, so element class data is refused.
struct PlainObject;

impl ObjectSubclass for PlainObject {
    const NAME: &'static str = "TestTemplatedPlainObject";
    type ParentType = Object;

    fn new() -> Self {
        Self
    }

    fn class_init(klass: &mut ClassBuilder) {
        klass.add_pad_template(&PadTemplate::new(
            "src",
            PadDirection::Src,
            PadPresence::Always,
            Caps::new("text/plain"),
        ));
        klass.add_metadata("rank", "none");
    }
}

#[test]
fn non_elements_ignore_class_data() {
    common::capture_logs();
    let ty = extend!(PlainObject).unwrap();
    assert!(element_pad_templates(ty).is_empty());
    assert_eq!(element_metadata(ty, "rank"), None);
    assert!(!common::logged(Level::Warn, "TestTemplatedPlainObject is not an element").is_empty());
}
