//! Plugin-side configuration: the `plugin.yaml` manifest, the variables it
//! declares, and template expansion of their defaults.

pub mod expand;
pub mod manifest;
pub mod variables;

pub use expand::{current_arch, current_os, expand_templates, Expander};
pub use manifest::{is_semver, ManifestConfig, PluginManifest};
pub use variables::{ConfigVariable, ConfigVariableType, ManifestVariable};
