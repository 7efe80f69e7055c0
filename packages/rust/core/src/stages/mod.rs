//! The four pipeline stages.
//!
//! Extract and Plan are fatal-to-run: any failure aborts the pipeline.
//! Execute contains adapter failures as degraded fields, and Synthesize
//! always produces an answer.

mod execute;
mod extract;
mod plan;
mod synthesize;

pub use execute::{ExecuteOptions, execute};
pub use extract::{EXTRACT_PROMPT, extract, extraction_schema, normalize_location};
pub use plan::{plan, plan_prompt, plan_schema, policy_actions};
pub use synthesize::{
    ensure_disclaimer, fallback_answer, render_hospitals, render_text, synthesis_prompt, synthesize,
};
