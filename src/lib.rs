// ABOUTME: Library module for the showtell program.
// ABOUTME: Contains the slide tree pipeline, document composer and live presentation server.

// Reexport modules
pub mod bus;
pub mod config;
pub mod errors;
pub mod html;
pub mod livereload;
pub mod parser;
pub mod presentation;
pub mod resources;
pub mod server;
pub mod slides;
pub mod template;
pub mod utils;
pub mod watch;

// Reexport common types and functions
pub use bus::{BusClient, BusMessage, MessageBus, MessageType, SubscriptionId};
pub use config::Config;
pub use errors::{Result, ShowError};
pub use html::{compose, render_index, write_html_to_file};
pub use livereload::{LivereloadEvent, LivereloadHub};
pub use parser::{HtmlSlideParser, MarkdownSlideParser, ParserRegistry, SlideParser};
pub use presentation::{
    Presentation, RevealConfiguration, RevealDependency, Slide, SlideContext, SlideMeta,
};
pub use resources::{
    AssetGroup, AssetStore, DirAssetStore, LayeredAssetStore, MemoryAssetStore, RevealAssets,
};
pub use server::{DocumentSlot, PresentationServer, ServerOptions, ServerState};
pub use slides::{SlideTreeBuilder, build_tree, section_id, split_front_matter};
pub use watch::{WatchConfig, watch_slides};
