// ABOUTME: Data model for presentations, slides and the reveal.js configuration block
// ABOUTME: Loads the presentation metadata file and serializes the reveal.js settings

use crate::errors::{Result, ShowError};
use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A presentation as described by the metadata file.
///
/// `slides` is never read from the metadata file; it is replaced wholesale
/// every time the slide folder is rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(skip)]
    pub slides: Vec<Slide>,

    #[serde(
        default = "RevealConfiguration::standard",
        deserialize_with = "standard_if_null"
    )]
    pub reveal_config: RevealConfiguration,
}

/// An explicit null `reveal_config` means the same as a missing one
fn standard_if_null<'de, D>(deserializer: D) -> std::result::Result<RevealConfiguration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RevealConfiguration>::deserialize(deserializer)?
        .unwrap_or_else(RevealConfiguration::standard))
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            slides: Vec::new(),
            reveal_config: RevealConfiguration::standard(),
        }
    }
}

impl Presentation {
    /// Create a presentation with the standard reveal.js configuration.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Load a presentation from a YAML metadata file
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading presentation metadata: {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| ShowError::io(path, e))?;
        Self::from_yaml(&content).map_err(|source| ShowError::MetadataParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a presentation from YAML text
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Copy of the presentation settings without any rendered slides.
    pub fn detached(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            slides: Vec::new(),
            reveal_config: self.reveal_config.clone(),
        }
    }
}

/// One node of the slide tree.
///
/// A node is either a leaf carrying rendered `content` or a group carrying
/// `sub_slides`, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Slide {
    pub content: String,
    pub source_file: PathBuf,
    pub section_id: String,
    pub notes: String,
    pub transition: Option<String>,
    pub transition_speed: Option<String>,
    pub sub_slides: Vec<Slide>,
}

impl Slide {
    pub fn has_notes(&self) -> bool {
        !self.notes.is_empty()
    }

    pub fn is_group(&self) -> bool {
        !self.sub_slides.is_empty()
    }
}

/// Per-file front-matter. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlideMeta {
    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub transition: Option<String>,

    #[serde(default, rename = "transitionSpeed", alias = "transition_speed")]
    pub transition_speed: Option<String>,
}

impl SlideMeta {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

/// The values a slide body and a slide parser can see while rendering.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlideContext<'a> {
    pub slide: &'a Slide,
    pub presentation: &'a Presentation,
}

/// A script the reveal.js runtime loads on start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealDependency {
    #[serde(rename = "src")]
    pub relative_source: String,

    #[serde(rename = "async", default)]
    pub load_async: bool,
}

impl RevealDependency {
    pub fn new(relative_source: &str, load_async: bool) -> Self {
        Self {
            relative_source: relative_source.to_string(),
            load_async,
        }
    }
}

/// reveal.js settings. Every field left unset is omitted from the
/// serialized payload so the runtime applies its own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevealConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls_tutorial: Option<bool>,
    /// "edges" or "bottom-right"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls_layout: Option<String>,
    /// "faded", "hidden" or "visible"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls_back_arrows: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch: Option<bool>,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_slides: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragments: Option<bool>,
    #[serde(rename = "fragmentInURL", skip_serializing_if = "Option::is_none")]
    pub fragment_in_url: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_notes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_play_media: Option<bool>,
    #[serde(rename = "preloadIframes", skip_serializing_if = "Option::is_none")]
    pub preload_iframes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_slide: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_slide_stoppable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timing: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_wheel: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_inactive_cursor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_cursor_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_address_bar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_links: Option<bool>,
    /// none/fade/slide/convex/concave/zoom
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    /// default/fast/slow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_transition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_distance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallax_background_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallax_background_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    pub dependencies: Vec<RevealDependency>,
}

impl RevealConfiguration {
    /// The configuration used when the metadata file has no `reveal_config`
    pub fn standard() -> Self {
        Self {
            controls: Some(true),
            progress: Some(true),
            history: Some(true),
            center: Some(true),
            dependencies: vec![
                RevealDependency::new("plugin/notes/notes.js", true),
                RevealDependency::new("plugin/zoom-js/zoom.js", true),
                RevealDependency::new("plugin/highlight/highlight.js", true),
            ],
            ..Self::default()
        }
    }

    /// Serialize to the object literal handed to `Reveal.initialize`.
    ///
    /// `</` is escaped so the payload can be embedded in a script element.
    pub fn to_json(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        json.replace("</", "<\\/")
    }
}
