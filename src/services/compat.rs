// Model-name compatibility mapping
//
// The worker's inference stack supports a fixed set of model names. Newer
// names the UI may offer are mapped to their closest supported equivalent;
// anything unknown falls back to "gpt-4" rather than failing the request.
// The silent fallback is deliberate - see DESIGN.md.

/// Models the worker's inference stack accepts directly.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-3.5-turbo-0613",
    "gpt-3.5-turbo-16k-0613",
    "gpt-4",
    "gpt-4-0613",
    "gpt-4-32k",
    "gpt-4-32k-0613",
    "gpt-4-turbo",
    "text-davinci-003",
    "text-davinci-002",
    "code-davinci-002",
];

/// Used when the requested model is unknown.
const FALLBACK_MODEL: &str = "gpt-4";

/// Known unsupported-to-supported substitutions.
fn mapped_alternative(requested: &str) -> Option<&'static str> {
    match requested {
        "gpt-5" | "gpt-5-mini" | "gpt-5.0" | "gpt-5.0-mini" => Some("gpt-4"),
        "gpt-5-turbo" => Some("gpt-4-turbo"),
        _ => None,
    }
}

/// Check whether a model is directly supported.
pub fn is_model_supported(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}

/// Resolve a requested model name to one the worker accepts.
///
/// Supported names pass through unchanged; known substitutions and the
/// final fallback are logged.
pub fn compatible_model_name(requested: &str) -> &str {
    if is_model_supported(requested) {
        return requested;
    }

    if let Some(alternative) = mapped_alternative(requested) {
        tracing::info!(
            "Model '{}' not supported; using compatible alternative '{}'",
            requested,
            alternative
        );
        return alternative;
    }

    tracing::warn!(
        "Unknown model '{}'; falling back to '{}'",
        requested,
        FALLBACK_MODEL
    );
    FALLBACK_MODEL
}

/// Compatibility status for a requested model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub original_model: String,
    pub compatible_model: String,
    pub is_mapped: bool,
    pub is_supported: bool,
}

/// Describe how a requested model will be handled.
pub fn model_info(requested: &str) -> ModelInfo {
    let compatible = compatible_model_name(requested);
    ModelInfo {
        original_model: requested.to_string(),
        compatible_model: compatible.to_string(),
        is_mapped: requested != compatible,
        is_supported: is_model_supported(requested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_models_pass_through() {
        assert_eq!(compatible_model_name("gpt-3.5-turbo"), "gpt-3.5-turbo");
        assert_eq!(compatible_model_name("gpt-4"), "gpt-4");
        assert_eq!(compatible_model_name("gpt-4-turbo"), "gpt-4-turbo");
    }

    #[test]
    fn test_gpt5_family_maps_to_gpt4() {
        assert_eq!(compatible_model_name("gpt-5"), "gpt-4");
        assert_eq!(compatible_model_name("gpt-5-mini"), "gpt-4");
        assert_eq!(compatible_model_name("gpt-5.0"), "gpt-4");
        assert_eq!(compatible_model_name("gpt-5.0-mini"), "gpt-4");
        assert_eq!(compatible_model_name("gpt-5-turbo"), "gpt-4-turbo");
    }

    #[test]
    fn test_unknown_model_falls_back() {
        assert_eq!(compatible_model_name("claude-unknown"), "gpt-4");
        assert_eq!(compatible_model_name(""), "gpt-4");
    }

    #[test]
    fn test_is_model_supported() {
        assert!(is_model_supported("gpt-4"));
        assert!(!is_model_supported("gpt-5"));
        assert!(!is_model_supported("made-up-model"));
    }

    #[test]
    fn test_model_info_mapped() {
        let info = model_info("gpt-5");
        assert_eq!(info.original_model, "gpt-5");
        assert_eq!(info.compatible_model, "gpt-4");
        assert!(info.is_mapped);
        assert!(!info.is_supported);
    }

    #[test]
    fn test_model_info_supported() {
        let info = model_info("gpt-4");
        assert!(!info.is_mapped);
        assert!(info.is_supported);
    }
}
