use std::ffi::{CStr, CString};
use std::ops::BitOr;
use std::ptr;

use element_sys as sys;

use crate::config::config;
use crate::error::MarshalError;

/// Logs a marshaling fallback when the configuration asks for it.
pub(crate) fn marshal_warning(context: &str, error: &dyn std::fmt::Display) {
    if config().warn_on_marshal {
        log::warn!(target: "element_subclass::marshal", "{context}: {error}");
    }
}

/// Copies a foreign string, replacing invalid UTF-8.
pub(crate) unsafe fn string_from_ptr(ptr: *const std::ffi::c_char, context: &str) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let bytes = CStr::from_ptr(ptr).to_bytes();
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s.to_owned()),
        Err(err) => {
            marshal_warning(context, &err);
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Converts to a C string, cutting at the first interior nul.
pub(crate) fn cstring_lossy(s: &str, context: &str) -> CString {
    match CString::new(s) {
        Ok(s) => s,
        Err(err) => {
            let end = err.nul_position();
            marshal_warning(context, &MarshalError::InteriorNul);
            let mut bytes = err.into_vec();
            bytes.truncate(end);
            CString::new(bytes).unwrap_or_default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    Double,
    String,
}

impl ValueType {
    pub fn into_raw(self) -> sys::el_value_type {
        match self {
            ValueType::Bool => sys::EL_VALUE_BOOLEAN,
            ValueType::Int => sys::EL_VALUE_INT,
            ValueType::UInt => sys::EL_VALUE_UINT,
            ValueType::Int64 => sys::EL_VALUE_INT64,
            ValueType::UInt64 => sys::EL_VALUE_UINT64,
            ValueType::Float => sys::EL_VALUE_FLOAT,
            ValueType::Double => sys::EL_VALUE_DOUBLE,
            ValueType::String => sys::EL_VALUE_STRING,
        }
    }

    pub fn from_raw(raw: sys::el_value_type) -> Result<Self, MarshalError> {
        Ok(match raw {
            sys::EL_VALUE_BOOLEAN => ValueType::Bool,
            sys::EL_VALUE_INT => ValueType::Int,
            sys::EL_VALUE_UINT => ValueType::UInt,
            sys::EL_VALUE_INT64 => ValueType::Int64,
            sys::EL_VALUE_UINT64 => ValueType::UInt64,
            sys::EL_VALUE_FLOAT => ValueType::Float,
            sys::EL_VALUE_DOUBLE => ValueType::Double,
            sys::EL_VALUE_STRING => ValueType::String,
            other => return Err(MarshalError::UnknownType(other)),
        })
    }
}

/// Host form of `el_value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(Option<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::UInt(_) => ValueType::UInt,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
        }
    }

    pub fn get<T: FromValue>(&self) -> Result<T, MarshalError> {
        T::from_value(self)
    }

    /// Zero value of `value_type`.
    pub fn default_for(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::UInt => Value::UInt(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::UInt64 => Value::UInt64(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Double => Value::Double(0.0),
            ValueType::String => Value::String(None),
        }
    }

    /// Reads an initialized foreign value. Strings are copied.
    ///
    /// # Safety
    /// `raw` must point to a valid `el_value`.
    pub unsafe fn from_raw(raw: *const sys::el_value) -> Result<Self, MarshalError> {
        let data = (*raw).data;
        Ok(match ValueType::from_raw((*raw).value_type)? {
            ValueType::Bool => Value::Bool(data.v_int != 0),
            ValueType::Int => Value::Int(data.v_int),
            ValueType::UInt => Value::UInt(data.v_uint),
            ValueType::Int64 => Value::Int64(data.v_int64),
            ValueType::UInt64 => Value::UInt64(data.v_uint64),
            ValueType::Float => Value::Float(data.v_float),
            ValueType::Double => Value::Double(data.v_double),
            ValueType::String => Value::String(string_from_ptr(
                data.v_pointer as *const std::ffi::c_char,
                "string value",
            )),
        })
    }

    /// Builds a foreign value owning a copy of any string. Release it with
    /// `el_value_unset`.
    pub fn to_raw(&self) -> sys::el_value {
        let mut raw = sys::el_value::zeroed();
        unsafe {
            sys::el_value_init(&mut raw, self.value_type().into_raw());
            match self {
                Value::Bool(v) => raw.data.v_int = i32::from(*v),
                Value::Int(v) => raw.data.v_int = *v,
                Value::UInt(v) => raw.data.v_uint = *v,
                Value::Int64(v) => raw.data.v_int64 = *v,
                Value::UInt64(v) => raw.data.v_uint64 = *v,
                Value::Float(v) => raw.data.v_float = *v,
                Value::Double(v) => raw.data.v_double = *v,
                Value::String(Some(s)) => {
                    let s = cstring_lossy(s, "string value");
                    sys::el_value_set_string(&mut raw, s.as_ptr());
                }
                Value::String(None) => {}
            }
        }
        raw
    }

    /// Overwrites an initialized foreign value, releasing what it held.
    ///
    /// # Safety
    /// `raw` must point to a valid, initialized `el_value`.
    pub unsafe fn write_raw(&self, raw: *mut sys::el_value) {
        sys::el_value_unset(raw);
        ptr::write(raw, self.to_raw());
    }
}

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, MarshalError>;
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, MarshalError> {
                    match value {
                        Value::$variant(v) => Ok(*v),
                        other => Err(MarshalError::TypeMismatch {
                            expected: ValueType::$variant,
                            found: other.value_type(),
                        }),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool,
    i32 => Int,
    u32 => UInt,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Some(v.to_owned()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Some(v))
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        Value::String(v)
    }
}

impl FromValue for Option<String> {
    fn from_value(value: &Value) -> Result<Self, MarshalError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(MarshalError::TypeMismatch {
                expected: ValueType::String,
                found: other.value_type(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamFlags(u32);

impl ParamFlags {
    pub const READABLE: ParamFlags = ParamFlags(sys::EL_PARAM_READABLE);
    pub const WRITABLE: ParamFlags = ParamFlags(sys::EL_PARAM_WRITABLE);
    pub const READWRITE: ParamFlags = ParamFlags(sys::EL_PARAM_READWRITE);

    pub fn contains(self, other: ParamFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for ParamFlags {
    type Output = ParamFlags;

    fn bitor(self, rhs: Self) -> Self {
        ParamFlags(self.0 | rhs.0)
    }
}

/// Declared property of a host type. Properties are installed in
/// declaration order with runtime ids starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: String,
    nick: String,
    blurb: String,
    value_type: ValueType,
    minimum: f64,
    maximum: f64,
    default: Value,
    flags: ParamFlags,
}

impl ParamSpec {
    fn numeric(name: &str, default: Value, minimum: f64, maximum: f64) -> Self {
        Self {
            name: name.to_owned(),
            nick: name.to_owned(),
            blurb: String::new(),
            value_type: default.value_type(),
            minimum,
            maximum,
            default,
            flags: ParamFlags::READWRITE,
        }
    }

    pub fn boolean(name: &str, default: bool) -> Self {
        Self::numeric(name, Value::Bool(default), 0.0, 1.0)
    }

    pub fn int(name: &str, minimum: i32, maximum: i32, default: i32) -> Self {
        Self::numeric(name, Value::Int(default), f64::from(minimum), f64::from(maximum))
    }

    pub fn uint(name: &str, minimum: u32, maximum: u32, default: u32) -> Self {
        Self::numeric(name, Value::UInt(default), f64::from(minimum), f64::from(maximum))
    }

    pub fn int64(name: &str, minimum: i64, maximum: i64, default: i64) -> Self {
        Self::numeric(name, Value::Int64(default), minimum as f64, maximum as f64)
    }

    pub fn uint64(name: &str, minimum: u64, maximum: u64, default: u64) -> Self {
        Self::numeric(name, Value::UInt64(default), minimum as f64, maximum as f64)
    }

    pub fn double(name: &str, minimum: f64, maximum: f64, default: f64) -> Self {
        Self::numeric(name, Value::Double(default), minimum, maximum)
    }

    pub fn string(name: &str, default: Option<&str>) -> Self {
        Self::numeric(name, Value::String(default.map(str::to_owned)), 0.0, 0.0)
    }

    pub fn nick(mut self, nick: &str) -> Self {
        self.nick = nick.to_owned();
        self
    }

    pub fn blurb(mut self, blurb: &str) -> Self {
        self.blurb = blurb.to_owned();
        self
    }

    pub fn flags(mut self, flags: ParamFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn read_only(self) -> Self {
        self.flags(ParamFlags::READABLE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nick_str(&self) -> &str {
        &self.nick
    }

    pub fn blurb_str(&self) -> &str {
        &self.blurb
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn range(&self) -> (f64, f64) {
        (self.minimum, self.maximum)
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn param_flags(&self) -> ParamFlags {
        self.flags
    }

    /// Allocates the foreign description; ownership passes to the caller.
    pub(crate) fn to_raw(&self) -> *mut sys::el_param_spec {
        let name = cstring_lossy(&self.name, "property name");
        let nick = cstring_lossy(&self.nick, "property nick");
        let blurb = cstring_lossy(&self.blurb, "property blurb");
        let mut default = self.default.to_raw();
        let pspec = unsafe {
            sys::el_param_spec_new(
                name.as_ptr(),
                nick.as_ptr(),
                blurb.as_ptr(),
                self.value_type.into_raw(),
                self.flags.bits(),
                self.minimum,
                self.maximum,
                &default,
            )
        };
        unsafe { sys::el_value_unset(&mut default) };
        pspec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn typed_access_checks_the_variant() {
        let value = Value::from(5i32);
        assert_eq!(value.get::<i32>(), Ok(5));
        assert_eq!(
            value.get::<u64>(),
            Err(MarshalError::TypeMismatch {
                expected: ValueType::UInt64,
                found: ValueType::Int,
            })
        );
    }

    #[test]
    fn strings_cross_the_boundary_by_copy() {
        let value = Value::from("sink-0");
        let mut raw = value.to_raw();
        let back = unsafe { Value::from_raw(&raw) }.unwrap();
        unsafe { sys::el_value_unset(&mut raw) };
        assert_eq!(back, value);
    }

    #[test]
    fn interior_nul_is_cut() {
        let value = Value::from("abc\0def");
        let mut raw = value.to_raw();
        let back = unsafe { Value::from_raw(&raw) }.unwrap();
        unsafe { sys::el_value_unset(&mut raw) };
        assert_eq!(back, Value::from("abc"));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut raw = sys::el_value::zeroed();
        raw.value_type = 99;
        assert_eq!(unsafe { Value::from_raw(&raw) }, Err(MarshalError::UnknownType(99)));
    }

    fn any_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::Int),
            any::<u32>().prop_map(Value::UInt),
            any::<i64>().prop_map(Value::Int64),
            any::<u64>().prop_map(Value::UInt64),
            any::<u32>().prop_map(|bits| Value::Float(f32::from_bits(bits))),
            any::<u64>().prop_map(|bits| Value::Double(f64::from_bits(bits))),
            proptest::option::of("[^\\x00]{0,24}").prop_map(Value::String),
        ]
    }

    /// Equality with floats compared by bit pattern, so NaN payloads count.
    fn identical(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            _ => a == b,
        }
    }

    proptest! {
        #[test]
        fn every_value_survives_the_raw_form(value in any_value()) {
            let mut raw = value.to_raw();
            let back = unsafe { Value::from_raw(&raw) };
            unsafe { sys::el_value_unset(&mut raw) };
            let back = back.unwrap();
            prop_assert!(identical(&back, &value), "{:?} came back as {:?}", value, back);
        }

        #[test]
        fn write_raw_replaces_the_held_value(first in any_value(), second in any_value()) {
            let mut raw = first.to_raw();
            unsafe { second.write_raw(&mut raw) };
            let back = unsafe { Value::from_raw(&raw) };
            unsafe { sys::el_value_unset(&mut raw) };
            prop_assert!(identical(&back.unwrap(), &second));
        }
    }

    #[test]
    fn param_spec_builders_keep_flags() {
        let spec = ParamSpec::uint("volume", 0, 100, 50).nick("Volume").read_only();
        assert_eq!(spec.value_type(), ValueType::UInt);
        assert_eq!(spec.range(), (0.0, 100.0));
        assert!(spec.param_flags().contains(ParamFlags::READABLE));
        assert!(!spec.param_flags().contains(ParamFlags::WRITABLE));
        assert_eq!(spec.nick_str(), "Volume");
    }
}
