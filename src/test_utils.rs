//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    use crate::config::defaults::MAX_BUILD_NAME_LEN;
    use crate::core::implant::{ImplantConfig, OutputFormat, TargetPlatform};

    /// Generate a name the allow-list accepts
    pub fn build_name() -> impl Strategy<Value = String> {
        proptest::string::string_regex(&format!("[A-Za-z0-9_-]{{1,{MAX_BUILD_NAME_LEN}}}"))
            .expect("Invalid build name regex")
    }

    /// Generate a name that would escape or nest inside the artifact directory
    pub fn unsafe_build_name() -> impl Strategy<Value = String> {
        (
            "[a-z0-9]{0,8}",
            prop_oneof![Just("/"), Just(".."), Just("\\"), Just("."), Just("\0")],
            "[a-z0-9]{0,8}",
        )
            .prop_map(|(head, sep, tail)| format!("{head}{sep}{tail}"))
    }

    /// Generate any output format
    pub fn output_format() -> impl Strategy<Value = OutputFormat> {
        proptest::sample::select(OutputFormat::ALL.to_vec())
    }

    /// Generate a supported-looking target platform
    pub fn target_platform() -> impl Strategy<Value = TargetPlatform> {
        (
            prop_oneof![Just("windows"), Just("linux"), Just("darwin")],
            prop_oneof![Just("amd64"), Just("386"), Just("arm64")],
        )
            .prop_map(|(os, arch)| TargetPlatform::new(os, arch))
    }

    /// Generate a valid implant config with a random id and no name
    pub fn implant_config() -> impl Strategy<Value = ImplantConfig> {
        (
            target_platform(),
            output_format(),
            proptest::collection::btree_set("[a-z]{2,8}", 0..4),
            any::<bool>(),
        )
            .prop_map(|(target, format, features, debug)| {
                let mut config = ImplantConfig::new(target, format)
                    .with_features(features.into_iter().collect());
                config.debug = debug;
                config
            })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::config::defaults::{MAX_BUILD_NAME_LEN, MIN_PROPTEST_ITERATIONS};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn test_build_name_generator(name in build_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.len() <= MAX_BUILD_NAME_LEN);
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }

        #[test]
        fn test_unsafe_build_name_generator(name in unsafe_build_name()) {
            prop_assert!(name.chars().any(|c| matches!(c, '/' | '\\' | '.' | '\0')));
        }

        #[test]
        fn test_implant_config_generator(config in implant_config()) {
            prop_assert!(config.validate().is_ok());
        }
    }
}
