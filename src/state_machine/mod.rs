mod job;
mod state;

pub use job::{GenerationRecord, RenderJob};
pub use state::{JobSignal, JobState, StateMachine, Transition};
