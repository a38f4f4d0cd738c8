//! Inference plumbing shared by the pipeline stages: the step-bounded tool
//! loop, typed decoding and session bookkeeping.

mod decode;
mod session;
mod tool_loop;

pub use decode::{decode, extract_json};
pub use session::{InferenceSession, SessionLog};
pub use tool_loop::{complete_structured, run_tool_loop, InferenceError};
