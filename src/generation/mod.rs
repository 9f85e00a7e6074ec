//! Image generation: the provider seam and the submission pipeline.

pub mod pipeline;
pub mod provider;

pub use pipeline::{resolve_prompt, CreativeSubmission, GenerationPipeline};
pub use provider::{GeneratedImage, GenerationRequest, ImageGenerator};
