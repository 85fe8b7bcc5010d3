use element_sys as sys;
use thiserror::Error;

use crate::error::MarshalError;
use crate::value::marshal_warning;

/// Successful data-flow result. Positive raw values other than `OK` are
/// carried through as custom successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowSuccess {
    Ok,
    /// Only codes above zero can be reported. Use [`FlowSuccess::custom`]
    /// to build one from an untrusted code.
    Custom(i32),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowError {
    #[error("not linked")]
    NotLinked,
    #[error("flushing")]
    Flushing,
    #[error("end of stream")]
    Eos,
    #[error("not negotiated")]
    NotNegotiated,
    #[error("error")]
    Error,
    #[error("not supported")]
    NotSupported,
    /// Only codes below `EL_FLOW_NOT_SUPPORTED` can be reported. Use
    /// [`FlowError::custom`] to build one from an untrusted code.
    #[error("custom flow error {0}")]
    Custom(i32),
}

impl FlowSuccess {
    /// `None` unless `code` is a positive custom success code.
    pub fn custom(code: i32) -> Option<Self> {
        (code > sys::EL_FLOW_OK).then_some(FlowSuccess::Custom(code))
    }

    /// Whether the runtime reads [`into_raw`](Self::into_raw) back as `self`.
    pub fn is_representable(self) -> bool {
        match self {
            FlowSuccess::Ok => true,
            FlowSuccess::Custom(code) => code > sys::EL_FLOW_OK,
        }
    }

    /// An out-of-range custom code is reported as `EL_FLOW_OK` with a warning.
    pub fn into_raw(self) -> sys::el_flow_return {
        match self {
            FlowSuccess::Ok => sys::EL_FLOW_OK,
            FlowSuccess::Custom(code) if code > sys::EL_FLOW_OK => code,
            FlowSuccess::Custom(code) => {
                marshal_warning("flow return", &MarshalError::FlowCode { kind: "success", code });
                sys::EL_FLOW_OK
            }
        }
    }
}

impl FlowError {
    /// `None` unless `code` lies below every named error code.
    pub fn custom(code: i32) -> Option<Self> {
        (code < sys::EL_FLOW_NOT_SUPPORTED).then_some(FlowError::Custom(code))
    }

    pub fn is_representable(self) -> bool {
        match self {
            FlowError::Custom(code) => code < sys::EL_FLOW_NOT_SUPPORTED,
            _ => true,
        }
    }

    /// An out-of-range custom code is reported as `EL_FLOW_ERROR` with a
    /// warning, never as a success or another named error.
    pub fn into_raw(self) -> sys::el_flow_return {
        match self {
            FlowError::NotLinked => sys::EL_FLOW_NOT_LINKED,
            FlowError::Flushing => sys::EL_FLOW_FLUSHING,
            FlowError::Eos => sys::EL_FLOW_EOS,
            FlowError::NotNegotiated => sys::EL_FLOW_NOT_NEGOTIATED,
            FlowError::Error => sys::EL_FLOW_ERROR,
            FlowError::NotSupported => sys::EL_FLOW_NOT_SUPPORTED,
            FlowError::Custom(code) if code < sys::EL_FLOW_NOT_SUPPORTED => code,
            FlowError::Custom(code) => {
                marshal_warning("flow return", &MarshalError::FlowCode { kind: "error", code });
                sys::EL_FLOW_ERROR
            }
        }
    }
}

pub fn flow_from_raw(raw: sys::el_flow_return) -> Result<FlowSuccess, FlowError> {
    match raw {
        sys::EL_FLOW_OK => Ok(FlowSuccess::Ok),
        code if code > 0 => Ok(FlowSuccess::Custom(code)),
        sys::EL_FLOW_NOT_LINKED => Err(FlowError::NotLinked),
        sys::EL_FLOW_FLUSHING => Err(FlowError::Flushing),
        sys::EL_FLOW_EOS => Err(FlowError::Eos),
        sys::EL_FLOW_NOT_NEGOTIATED => Err(FlowError::NotNegotiated),
        sys::EL_FLOW_ERROR => Err(FlowError::Error),
        sys::EL_FLOW_NOT_SUPPORTED => Err(FlowError::NotSupported),
        code => Err(FlowError::Custom(code)),
    }
}

pub fn flow_into_raw(result: Result<FlowSuccess, FlowError>) -> sys::el_flow_return {
    match result {
        Ok(success) => success.into_raw(),
        Err(error) => error.into_raw(),
    }
}
