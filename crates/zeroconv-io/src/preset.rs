//! TOML presets bundling an impulse response with its convolver setup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use zeroconv_core::{
    ConvolutionEngine, Convolver, IrChannelConfig, IrLoader, IrSettings, SchedulingHints,
};

use crate::{Error, Result};

/// Impulse-response preset.
///
/// # TOML Format
///
/// ```toml
/// name = "Small Hall"
/// description = "Bright, short tail"
/// path = "irs/small_hall.wav"
/// channel_config = "stereo"
///
/// [settings]
/// gain = 0.8
/// pre_delay = 240
/// channel_gain = [1.0, 0.7, 1.0, 0.7]
///
/// [scheduling]
/// policy = "fifo"
/// priority = 40
/// ```
///
/// Every table except `name` and `path` is optional; missing fields take
/// their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IrPreset {
    /// Name of the preset.
    pub name: String,

    /// Optional description of the preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Impulse-response resource path handed to the loader.
    pub path: String,

    /// Requested channel layout.
    #[serde(default)]
    pub channel_config: IrChannelConfig,

    /// Gain and delay settings.
    #[serde(default)]
    pub settings: IrSettings,

    /// Reconfiguration worker scheduling.
    #[serde(default)]
    pub scheduling: SchedulingHints,
}

impl IrPreset {
    /// Create a preset for the IR at `path` with default settings.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            path: path.into(),
            channel_config: IrChannelConfig::default(),
            settings: IrSettings::default(),
            scheduling: SchedulingHints::default(),
        }
    }

    /// Create a preset with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the channel layout.
    pub fn with_channel_config(mut self, config: IrChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Set the IR settings.
    pub fn with_settings(mut self, settings: IrSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Load a preset from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        let preset: IrPreset = toml::from_str(&content)?;
        tracing::debug!("preset_load: '{}' from {}", preset.name, path.display());
        Ok(preset)
    }

    /// Load a preset from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the preset to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| Error::file(path, e))?;
        Ok(())
    }

    /// Convert the preset to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The arguments [`Convolver::new`] takes from a preset.
    pub fn to_convolver_parts(&self) -> (String, SchedulingHints, IrChannelConfig, IrSettings) {
        (
            self.path.clone(),
            self.scheduling,
            self.channel_config,
            self.settings.clone(),
        )
    }

    /// Creates an unconfigured convolver for this preset.
    pub fn convolver<E: ConvolutionEngine>(
        &self,
        sample_rate: u32,
        loader: Arc<dyn IrLoader>,
    ) -> Convolver<E> {
        let (path, hints, config, settings) = self.to_convolver_parts();
        Convolver::new(path, sample_rate, hints, config, settings, loader)
    }
}
