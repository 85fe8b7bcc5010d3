mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use element_subclass::prelude::*;
use element_subclass::{
    capabilities, extend, type_data, Capability, MarshalError, Object, ParamSpec, Value, ValueType,
};
use log::Level;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

struct Tunable {
    volume: Mutex<f64>,
    label: Mutex<Option<String>>,
    mute: Mutex<bool>,
    constructed: AtomicUsize,
}

impl ObjectSubclass for Tunable {
    const NAME: &'static str = "TestTunable";
    type ParentType = Object;

    fn new() -> Self {
        Self {
            volume: Mutex::new(1.0),
            label: Mutex::new(None),
            mute: Mutex::new(false),
            constructed: AtomicUsize::new(0),
        }
    }

    fn properties() -> Vec<ParamSpec> {
        vec![
            ParamSpec::double("volume", 0.0, 10.0, 1.0).blurb("Linear gain"),
            ParamSpec::string("label", None),
            ParamSpec::boolean("mute", false),
            ParamSpec::uint("latency", 0, 1000, 0).read_only(),
            ParamSpec::int("broken", -10, 10, 0),
        ]
    }
}

impl SetProperty for Tunable {
    fn set_property(&self, _object: &Object, index: usize, value: &Value, pspec: &ParamSpec) {
        match (index, pspec.name()) {
            (0, "volume") => *self.volume.lock() = value.get().unwrap(),
            (1, "label") => *self.label.lock() = value.get().unwrap(),
            (2, "mute") => *self.mute.lock() = value.get().unwrap(),
            (4, "broken") => {}
            other => panic!("unexpected property {other:?}"),
        }
    }
}

impl GetProperty for Tunable {
    fn property(&self, _object: &Object, index: usize, _pspec: &ParamSpec) -> Value {
        match index {
            0 => Value::Double(*self.volume.lock()),
            1 => Value::String(self.label.lock().clone()),
            2 => Value::Bool(*self.mute.lock()),
            3 => Value::UInt(42),
            // answers with the wrong type on purpose
            _ => Value::Bool(true),
        }
    }
}

impl Constructed for Tunable {
    fn constructed(&self, object: &Object) {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        self.parent_constructed(object);
    }
}

fn tunable() -> Object {
    let ty = extend!(Tunable).unwrap();
    ty.create::<Object>(Some("tunable")).unwrap()
}

#[test]
fn declared_properties_are_recorded_in_order() {
    extend!(Tunable).unwrap();
    let data = type_data::<Tunable>().unwrap();
    let names: Vec<&str> = data.properties().iter().map(ParamSpec::name).collect();
    assert_eq!(names, vec!["volume", "label", "mute", "latency", "broken"]);
    assert_eq!(data.properties()[0].blurb_str(), "Linear gain");

    let detected = capabilities!(Tunable);
    assert!(detected.contains(Capability::SetProperty));
    assert!(detected.contains(Capability::GetProperty));
    assert!(detected.contains(Capability::Constructed));
    assert_eq!(data.capabilities(), detected);
}

#[test]
fn values_round_trip_through_the_runtime() {
    let object = tunable();

    object.set_property("volume", 2.5f64).unwrap();
    assert_eq!(object.property("volume"), Ok(Value::Double(2.5)));

    object.set_property("label", "left channel").unwrap();
    assert_eq!(object.property("label"), Ok(Value::String(Some("left channel".to_owned()))));
    object.set_property("label", None::<String>).unwrap();
    assert_eq!(object.property("label"), Ok(Value::String(None)));

    object.set_property("mute", true).unwrap();
    assert_eq!(object.property("mute").unwrap().get::<bool>(), Ok(true));
}

#[test]
fn invalid_writes_are_rejected_before_the_host() {
    let object = tunable();

    let rejected = |name: &str| -> Result<(), MarshalError> { Err(MarshalError::PropertyRejected(name.to_owned())) };
    assert_eq!(object.set_property("volume", 20.0f64), rejected("volume"));
    assert_eq!(object.set_property("volume", 3i32), rejected("volume"));
    assert_eq!(object.set_property("latency", 5u32), rejected("latency"));
    assert_eq!(object.set_property("missing", 1i32), rejected("missing"));
    assert_eq!(object.set_property("bad\0name", 1i32), Err(MarshalError::InteriorNul));
    assert_eq!(object.property("volume"), Ok(Value::Double(1.0)));
}

#[test]
fn read_only_property_is_answered_by_the_host() {
    let object = tunable();
    assert_eq!(object.property("latency"), Ok(Value::UInt(42)));
}

#[test]
fn mistyped_answer_falls_back_to_the_default() {
    common::capture_logs();
    let object = tunable();

    let value = object.property("broken").unwrap();
    assert_eq!(value, Value::default_for(ValueType::Int));
    assert!(!common::logged(Level::Warn, "broken").is_empty());
}

#[test]
fn constructed_runs_once_per_instance() {
    let first = tunable();
    let second = tunable();
    assert_eq!(first.imp::<Tunable>().unwrap().constructed.load(Ordering::SeqCst), 1);
    assert_eq!(second.imp::<Tunable>().unwrap().constructed.load(Ordering::SeqCst), 1);
    assert_eq!(first.name().as_deref(), Some("tunable"));
}
