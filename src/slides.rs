// ABOUTME: Slide tree builder for the showtell application
// ABOUTME: Walks a slide folder, splits front-matter, derives section ids and renders each slide

use crate::errors::{Result, ShowError};
use crate::parser::{ParserRegistry, markdown_to_html};
use crate::presentation::{Presentation, Slide, SlideContext, SlideMeta};
use crate::template;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Marks the start and end of a front-matter block
pub const FRONT_MATTER_DELIMITER: &str = "+++";

/// Split a slide file into `(front_matter, body)`.
///
/// Without a leading delimiter the whole input is the body. With one
/// delimiter only, everything after it is front-matter and the body is empty.
pub fn split_front_matter(input: &str) -> (&str, &str) {
    if !input.starts_with(FRONT_MATTER_DELIMITER) {
        return ("", input);
    }

    let mut parts = input.splitn(3, FRONT_MATTER_DELIMITER).skip(1);
    let front_matter = parts.next().unwrap_or("");
    let body = parts.next().unwrap_or("");
    (front_matter, body)
}

/// Lowercased file name without extension, spaces replaced by underscores.
pub fn section_id(path: &Path) -> String {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    name.to_lowercase().replace(' ', "_")
}

/// Prefix the section id of every node in `slides`, descendants included.
fn prefix_section_ids(prefix: &str, slides: Vec<Slide>) -> Vec<Slide> {
    slides
        .into_iter()
        .map(|slide| Slide {
            section_id: format!("{}-{}", prefix, slide.section_id),
            sub_slides: prefix_section_ids(prefix, slide.sub_slides),
            ..slide
        })
        .collect()
}

/// Builds the slide tree of a presentation from a folder.
pub struct SlideTreeBuilder<'a> {
    presentation: &'a Presentation,
    registry: &'a ParserRegistry,
}

impl<'a> SlideTreeBuilder<'a> {
    pub fn new(presentation: &'a Presentation, registry: &'a ParserRegistry) -> Self {
        Self {
            presentation,
            registry,
        }
    }

    /// Build the ordered slides of `folder`. The first error aborts the build.
    pub fn build_tree(&self, folder: &Path) -> Result<Vec<Slide>> {
        let mut slides = Vec::new();
        for entry in list_entries(folder)? {
            let slide = if entry.is_dir() {
                self.build_group(&entry)?
            } else {
                self.build_leaf(&entry)?
            };
            slides.push(slide);
        }
        Ok(slides)
    }

    fn build_group(&self, folder: &Path) -> Result<Slide> {
        let id = section_id(folder);
        let children = self.build_tree(folder)?;
        debug!("Built group {:?} with {} slides", id, children.len());

        Ok(Slide {
            source_file: folder.to_path_buf(),
            sub_slides: prefix_section_ids(&id, children),
            section_id: id,
            ..Slide::default()
        })
    }

    fn build_leaf(&self, path: &Path) -> Result<Slide> {
        // Invalid UTF-8 is replaced, not rejected
        let bytes = fs::read(path).map_err(|e| ShowError::io(path, e))?;
        let raw = String::from_utf8_lossy(&bytes);
        let (front_matter, body) = split_front_matter(&raw);

        let meta = SlideMeta::from_yaml(front_matter).map_err(|source| {
            ShowError::MetadataParseError {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut slide = Slide {
            source_file: path.to_path_buf(),
            section_id: section_id(path),
            notes: meta.notes.as_deref().map(markdown_to_html).unwrap_or_default(),
            transition: meta.transition,
            transition_speed: meta.transition_speed,
            ..Slide::default()
        };

        let ctx = SlideContext {
            slide: &slide,
            presentation: self.presentation,
        };
        let composed =
            template::render(body, &ctx).map_err(|e| ShowError::TemplateCompositionError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let format = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = self.registry.dispatch(&format, &ctx, &composed)?;

        debug!("Parsed slide {:?} as {:?}", path, format);
        slide.content = content;
        Ok(slide)
    }
}

/// Build the slides of `folder` for `presentation`.
pub fn build_tree(
    presentation: &Presentation,
    registry: &ParserRegistry,
    folder: &Path,
) -> Result<Vec<Slide>> {
    SlideTreeBuilder::new(presentation, registry).build_tree(folder)
}

/// Every folder entry, ordered by file name.
fn list_entries(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(folder).map_err(|e| ShowError::io(folder, e))? {
        let entry = entry.map_err(|e| ShowError::io(folder, e))?;
        entries.push(entry.path());
    }
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}
