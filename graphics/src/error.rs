//! Graphics error types.

use crate::types::TextureFormat;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// The backend cannot produce the requested format/sample combination.
    #[error("unsupported render target: color {color:?}, depth {depth:?}, {samples}x samples")]
    UnsupportedFormat {
        color: TextureFormat,
        depth: Option<TextureFormat>,
        samples: u32,
    },
    /// Device memory allocation failed.
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfDeviceMemory { requested: u64, available: u64 },
    /// A scene procedure was invoked while it was already running.
    #[error("procedure '{0}' is already in progress")]
    AlreadyInProgress(String),
    /// A parameter could not be resolved from the render context.
    #[error("atom '{atom}': parameter '{parameter}' is unbound")]
    UnboundParameter { atom: String, parameter: String },
    /// Two atoms of one effect bind the same parameter name differently.
    #[error(
        "parameter '{parameter}' is bound differently by atoms '{first_atom}' and '{second_atom}'"
    )]
    DuplicateParameterBinding {
        parameter: String,
        first_atom: String,
        second_atom: String,
    },
    /// A pass reads a target that no earlier pass produces.
    #[error("pass '{pass}' reads target '{target}' before it is produced")]
    InvalidOrdering { pass: String, target: String },
    /// A pass references a target the procedure does not declare.
    #[error("pass '{pass}' references undeclared target '{target}'")]
    UndeclaredTarget { pass: String, target: String },
    /// No effect is registered under this name.
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    /// The backend refused to bind a render target.
    #[error("failed to bind target '{target}': {reason}")]
    BindFailed { target: String, reason: String },
    /// A draw call could not be issued.
    #[error("draw failed: {0}")]
    DrawFailed(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfDeviceMemory {
            requested: 64,
            available: 32,
        };
        assert_eq!(
            err.to_string(),
            "out of device memory: requested 64 bytes, 32 available"
        );

        let err = GraphicsError::InvalidOrdering {
            pass: "bloom".into(),
            target: "scene".into(),
        };
        assert_eq!(
            err.to_string(),
            "pass 'bloom' reads target 'scene' before it is produced"
        );
    }
}
