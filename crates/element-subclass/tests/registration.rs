use std::ffi::c_void;
use std::sync::Barrier;
use std::thread;

use element_subclass::prelude::*;
use element_subclass::{extend, sys, type_data, BaseSink, Element, Object, Overrides, RegistrationError, Type};
use pretty_assertions::assert_eq;

struct Plain;

impl ObjectSubclass for Plain {
    const NAME: &'static str = "TestRegistrationPlain";
    type ParentType = Object;

    fn new() -> Self {
        Self
    }
}

#[test]
fn extending_twice_returns_the_same_type() {
    let first = extend!(Plain).unwrap();
    let second = extend!(Plain).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.name(), "TestRegistrationPlain");
    assert_eq!(first.parent(), Some(Object::static_type()));
    assert_eq!(Type::from_name("TestRegistrationPlain"), Some(first));
    assert_eq!(type_data::<Plain>().unwrap().type_(), first);
}

mod impostor {
    use super::*;

    /// Claims the name already used by `super::Plain`.
    pub struct Plain;

    impl ObjectSubclass for Plain {
        const NAME: &'static str = "TestRegistrationPlain";
        type ParentType = Object;

        fn new() -> Self {
            Self
        }
    }
}

#[test]
fn second_rust_type_with_the_same_name_conflicts() {
    extend!(Plain).unwrap();
    match extend!(impostor::Plain) {
        Err(RegistrationError::NameConflict { name, existing }) => {
            assert_eq!(name, "TestRegistrationPlain");
            assert!(existing.ends_with("Plain"));
        }
        other => panic!("expected a name conflict, got {other:?}"),
    }
    assert!(type_data::<impostor::Plain>().is_none());
}

struct Shadowing;

impl ObjectSubclass for Shadowing {
    const NAME: &'static str = "ElBaseSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

#[test]
fn native_type_names_are_taken() {
    let err = extend!(Shadowing).unwrap_err();
    assert!(matches!(err, RegistrationError::NameTaken(ref name) if name == "ElBaseSink"));
}

struct NulInName;

impl ObjectSubclass for NulInName {
    const NAME: &'static str = "Bad\0Name";
    type ParentType = Object;

    fn new() -> Self {
        Self
    }
}

#[test]
fn names_with_interior_nul_are_invalid() {
    let err = extend!(NulInName).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidName(_)));
    assert!(type_data::<NulInName>().is_none());
}

struct ExplodingInit;

impl ObjectSubclass for ExplodingInit {
    const NAME: &'static str = "TestExplodingInit";
    type ParentType = Object;

    fn new() -> Self {
        Self
    }

    fn class_init(_klass: &mut ClassBuilder) {
        panic!("no class for you");
    }
}

#[test]
fn panicking_class_init_fails_registration() {
    match extend!(ExplodingInit) {
        Err(RegistrationError::ClassInit { name, message }) => {
            assert_eq!(name, "TestExplodingInit");
            assert!(message.contains("no class for you"));
        }
        other => panic!("expected a class init failure, got {other:?}"),
    }
    assert!(type_data::<ExplodingInit>().is_none());

    // the runtime kept the name, so a retry cannot succeed
    assert!(matches!(extend!(ExplodingInit), Err(RegistrationError::NameTaken(_))));
}

element_subclass::object_wrapper!(
    /// Declares the object class struct for a sink.
    pub struct ShrunkSink(sys::el_base_sink) @type sys::el_base_sink_get_type(), @extends Object
);

unsafe impl Extendable for ShrunkSink {
    type Class = sys::el_object_class;

    fn parent_type() -> Option<Type> {
        Some(Element::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        Object::install(klass, overrides);
    }
}

element_subclass::object_wrapper!(
    /// Right layout, wrong ancestry.
    pub struct OrphanSink(sys::el_base_sink) @type sys::el_base_sink_get_type(), @extends Object
);

unsafe impl Extendable for OrphanSink {
    type Class = sys::el_base_sink_class;

    fn parent_type() -> Option<Type> {
        Some(Object::static_type())
    }

    unsafe fn install(klass: *mut c_void, overrides: &Overrides) {
        Object::install(klass, overrides);
    }
}

struct OnShrunk;

impl ObjectSubclass for OnShrunk {
    const NAME: &'static str = "TestOnShrunkSink";
    type ParentType = ShrunkSink;

    fn new() -> Self {
        Self
    }
}

struct OnOrphan;

impl ObjectSubclass for OnOrphan {
    const NAME: &'static str = "TestOnOrphanSink";
    type ParentType = OrphanSink;

    fn new() -> Self {
        Self
    }
}

#[test]
fn mismatched_class_struct_is_refused() {
    match extend!(OnShrunk) {
        Err(RegistrationError::AbiMismatch { name, detail }) => {
            assert_eq!(name, "TestOnShrunkSink");
            assert!(detail.contains("class struct"), "{detail}");
        }
        other => panic!("expected an ABI mismatch, got {other:?}"),
    }
    assert_eq!(Type::from_name("TestOnShrunkSink"), None);
}

#[test]
fn mismatched_ancestry_is_refused() {
    match extend!(OnOrphan) {
        Err(RegistrationError::AbiMismatch { detail, .. }) => assert!(detail.contains("derives from"), "{detail}"),
        other => panic!("expected an ABI mismatch, got {other:?}"),
    }
    assert_eq!(Type::from_name("TestOnOrphanSink"), None);
}

struct Raced;

impl ObjectSubclass for Raced {
    const NAME: &'static str = "TestRacedSink";
    type ParentType = BaseSink;

    fn new() -> Self {
        Self
    }
}

#[test]
fn concurrent_extends_agree_on_one_type() {
    let barrier = Barrier::new(8);
    let types: Vec<Type> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    extend!(Raced).unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|worker| worker.join().unwrap()).collect()
    });
    assert!(types.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(types[0].parent(), Some(BaseSink::static_type()));
}
