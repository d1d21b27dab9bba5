// ABOUTME: Document composer for the showtell application
// ABOUTME: Expands the main, base, comboSlide, subSlides and slide fragments into one HTML page

use crate::errors::{Result, ShowError};
use crate::parser::ParserRegistry;
use crate::presentation::{Presentation, Slide};
use crate::slides;
use crate::utils;
use log::info;
use std::fs;
use std::path::Path;

const LIVERELOAD_SCRIPT: &str = r#"<script>
function tryConnectToReload() {
	var url = window.location.host + "/livereload";
	if (window.location.protocol === "http:") {
		url = "ws://" + url;
	} else {
		url = "wss://" + url;
	}
	var conn = new WebSocket(url);

	conn.onclose = function(evt) {
		setTimeout(function() { tryConnectToReload(); }, 2000);
	};

	conn.onmessage = function(evt) {
		console.log("Refresh received!");
		location.reload();
	};
}

try {
	if (window["WebSocket"]) {
		tryConnectToReload();
	} else {
		console.log("Your browser does not support WebSocket, cannot connect to the reload service.");
	}
} catch (ex) {
	console.log("Exception during connecting to reload:", ex);
}
</script>"#;

/// Compose the full document for the presentation's current slide tree.
pub fn compose(presentation: &Presentation) -> String {
    let mut out = String::new();
    render_main(&mut out, presentation);
    out
}

/// Build the slide tree of `slide_root`, store it on the presentation and
/// compose the document.
pub fn render_index(
    presentation: &mut Presentation,
    registry: &ParserRegistry,
    slide_root: &Path,
) -> Result<String> {
    info!("Rendering slides from {:?}", slide_root);
    presentation.slides = slides::build_tree(presentation, registry, slide_root)?;
    Ok(compose(presentation))
}

fn render_main(out: &mut String, presentation: &Presentation) {
    render_base(out, presentation);
}

fn render_base(out: &mut String, presentation: &Presentation) {
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str("<meta charset=\"UTF-8\">\n");
    out.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no\">\n",
    );
    if !presentation.name.is_empty() {
        out.push_str(&format!("<title>{}</title>\n", escape(&presentation.name)));
    }
    if !presentation.description.is_empty() {
        out.push_str(&format!(
            "<meta name=\"description\" content=\"{}\">\n",
            escape(&presentation.description)
        ));
    }
    out.push_str("<link rel=\"stylesheet\" href=\"css/reveal.css\">\n");
    out.push_str("<link rel=\"stylesheet\" href=\"css/theme/white.css\">\n");
    out.push_str("</head>\n<body>\n");

    out.push_str("<div class=\"reveal\">\n<div class=\"slides\">\n");
    for slide in &presentation.slides {
        render_combo_slide(out, slide);
    }
    out.push_str("</div>\n</div>\n");

    out.push_str("<script src=\"js/reveal.js\"></script>\n");
    out.push_str(&format!(
        "<script>\nReveal.initialize({});\n</script>\n",
        presentation.reveal_config.to_json()
    ));
    out.push_str(LIVERELOAD_SCRIPT);
    out.push_str("\n</body>\n</html>\n");
}

fn render_combo_slide(out: &mut String, slide: &Slide) {
    if slide.is_group() {
        render_sub_slides(out, slide);
    } else {
        render_slide(out, slide);
    }
}

fn render_sub_slides(out: &mut String, group: &Slide) {
    out.push_str(&format!(
        "<section id=\"{}\" class=\"chapter\">\n",
        escape(&group.section_id)
    ));
    for child in &group.sub_slides {
        render_combo_slide(out, child);
    }
    out.push_str("</section>\n");
}

fn render_slide(out: &mut String, slide: &Slide) {
    out.push_str(&format!(
        "<section class=\"slide\" id=\"{}\" data-has-notes=\"{}\"",
        escape(&slide.section_id),
        slide.has_notes()
    ));
    // The speed only applies together with a transition
    if let Some(transition) = &slide.transition {
        out.push_str(&format!(" data-transition=\"{}\"", escape(transition)));
        if let Some(speed) = &slide.transition_speed {
            out.push_str(&format!(" data-transition-speed=\"{}\"", escape(speed)));
        }
    }
    out.push_str(">\n");
    out.push_str(&slide.content);
    out.push('\n');
    if slide.has_notes() {
        out.push_str("<aside class=\"notes\">\n");
        out.push_str(&slide.notes);
        out.push_str("</aside>\n");
    }
    out.push_str("</section>\n");
}

/// Escape text for use inside element content or a quoted attribute.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Utility function to write the composed document to a file
pub fn write_html_to_file(html_content: &str, output_path: &Path) -> Result<()> {
    info!("Writing HTML to file: {:?}", output_path);

    utils::ensure_parent_directory_exists(output_path)?;
    fs::write(output_path, html_content).map_err(|e| ShowError::io(output_path, e))?;

    Ok(())
}
