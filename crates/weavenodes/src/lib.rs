//! Standard node library
//!
//! Built-in node kinds for AI and media pipelines. Each kind comes as a
//! definition for the catalog and an effector for the registry.

mod ai;
mod audio;
mod debug;
mod logic;
mod media;
mod output;
mod template;
mod time;
mod transform;
mod trigger;

pub use ai::{TextGenerationEffector, TEXT_GENERATION};
pub use audio::{TextToSpeechEffector, TEXT_TO_SPEECH};
pub use debug::{DebugEffector, DEBUG};
pub use logic::{ConditionEffector, MergeEffector, CONDITION, MERGE};
pub use media::{
    ImageGenerationEffector, MediaProcessEffector, VideoGenerationEffector, IMAGE_GENERATION,
    MEDIA_PROCESS, VIDEO_GENERATION,
};
pub use output::{ExportEffector, EXPORT};
pub use template::{render, render_value};
pub use time::{DelayEffector, DELAY};
pub use transform::{SetEffector, SplitOutEffector, SET, SPLIT_OUT};
pub use trigger::{ManualTrigger, MANUAL_TRIGGER};

use std::sync::Arc;
use weavecore::{BinaryRef, EffectorContext, NodeCatalog, NodeDataItem, NodeError};
use weaveruntime::EffectorRegistry;

/// Register every built-in kind with a catalog and an effector registry
pub fn register_all(catalog: &mut NodeCatalog, registry: &mut EffectorRegistry) {
    catalog.register(trigger::definition());
    catalog.register(ai::definition());
    catalog.register(media::image_definition());
    catalog.register(media::video_definition());
    catalog.register(media::process_definition());
    catalog.register(audio::definition());
    catalog.register(transform::set_definition());
    catalog.register(transform::split_out_definition());
    catalog.register(logic::condition_definition());
    catalog.register(logic::merge_definition());
    catalog.register(time::definition());
    catalog.register(debug::definition());
    catalog.register(output::definition());

    registry.register(Arc::new(ManualTrigger));
    registry.register(Arc::new(TextGenerationEffector));
    registry.register(Arc::new(ImageGenerationEffector));
    registry.register(Arc::new(VideoGenerationEffector));
    registry.register(Arc::new(MediaProcessEffector));
    registry.register(Arc::new(TextToSpeechEffector));
    registry.register(Arc::new(SetEffector));
    registry.register(Arc::new(SplitOutEffector));
    registry.register(Arc::new(ConditionEffector));
    registry.register(Arc::new(MergeEffector));
    registry.register(Arc::new(DelayEffector));
    registry.register(Arc::new(DebugEffector));
    registry.register(Arc::new(ExportEffector));
}

/// Catalog and registry holding only the built-in kinds
pub fn builtins() -> (NodeCatalog, EffectorRegistry) {
    let mut catalog = NodeCatalog::new();
    let mut registry = EffectorRegistry::new();
    register_all(&mut catalog, &mut registry);
    (catalog, registry)
}

/// Non-empty string parameter, or a configuration error
pub(crate) fn required_text(ctx: &EffectorContext, name: &str) -> Result<String, NodeError> {
    ctx.optional_str(name)
        .ok_or_else(|| NodeError::Configuration(format!("Missing parameter: {}", name)))
}

pub(crate) fn binary<'a>(item: &'a NodeDataItem, property: &str) -> Result<&'a BinaryRef, NodeError> {
    item.binary
        .get(property)
        .ok_or_else(|| NodeError::MissingInput(format!("binary property '{}'", property)))
}
