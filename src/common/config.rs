use serde::Deserialize;

/// Runtime settings for the overview tweaks. Nothing here is persisted by
/// this crate; embedders that want on-disk settings hand us the parsed TOML.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Brightness the background dims to as the overview transition
    /// completes. The background starts at 1.0 and interpolates here.
    pub dim_brightness: f64,
    /// Vignette sharpness applied to overview backgrounds. The stock shell
    /// darkens the edges; we flatten the effect entirely.
    pub vignette_sharpness: f64,
    pub static_background: bool,
    pub scaling_workspace_container: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dim_brightness: 0.75,
            vignette_sharpness: 0.0,
            static_background: true,
            scaling_workspace_container: true,
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Settings, toml::de::Error> { toml::from_str(text) }
}
