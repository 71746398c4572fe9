//! Prompt templates for the redesign pipeline
//!
//! The redesign and negative directives are process-wide constants. The
//! only per-run input is the scene description returned by the vision model.

/// Instruction sent with the uploaded photo to the vision model
pub const ANALYSIS_INSTRUCTION: &str = "Describe this street scene image. Focus on the layout, architectural style of the buildings, number of lanes, sidewalk presence, types of trees or vegetation, and atmosphere.";

/// The transformation applied to every street
pub const REDESIGN_PROMPT: &str = "Highly detailed concept art of a redesigned urban street in the Philippines into a clean, walkable, pedestrian-first cityscape. Features include wide, tiled sidewalks with integrated drainage, shaded by native trees and benches, under elevated concrete LRT viaducts. The midground shows inclusive pedestrian activity—strolling, sitting, socializing—without vehicular obstruction. Structures follow proper urban setbacks, with unified modern facades of wood, stone, and vertical gardens, supporting small glass-front retail shops. Streetscape includes permeable paving, rain-resilient landscaping, and passive cooling through vegetation. Golden-hour sunlight and soft shadows enhance spatial comfort. Inspired by Japanese urban design, adapted to Metro Manila’s tropical, high-density context. Ultra-realistic, isometric perspective, cinematic lighting.";

/// Things the image model must leave out
pub const NEGATIVE_PROMPT: &str = "Do not include: Trash, chaotic traffic, vandalism, dark lighting, broken roads, wires, visual clutter, distorted faces, low-res textures.";

/// Build the synthesis prompt from a scene description
///
/// The description is embedded verbatim, followed by the redesign directive
/// and then the negative directive.
pub fn compose_synthesis_prompt(description: &str) -> String {
    format!(
        r#"Based on this description of a street: "{}". Now, create a new concept art image that strictly applies the following transformation: "{}". {}"#,
        description, REDESIGN_PROMPT, NEGATIVE_PROMPT
    )
}
