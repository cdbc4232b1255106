use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::RenderJob;

/// Lifecycle of a render job on the external server.
///
/// Jobs only move forward: SUBMITTED → RUNNING → COMPLETED, or from
/// SUBMITTED/RUNNING into FAILED or TIMED_OUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Submitted,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    /// Completed, Failed and TimedOut accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Submitted => write!(f, "SUBMITTED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// What one poll tick (or the client-side deadline) observed about a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSignal {
    /// Nothing conclusive: still queued, or the poll itself failed.
    Pending,
    /// The server reports the job as executing.
    Running,
    /// Output image bytes were retrieved.
    Finished,
    /// The server reported an execution failure.
    Failed,
    /// The client-side deadline passed without a terminal response.
    Deadline,
}

/// The result of evaluating a signal against a job's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No state change; keep polling.
    Stay,
    /// Advance to a non-terminal state.
    Next(JobState),
    /// The job is in (or just reached) a terminal state.
    Complete(JobState),
}

/// Drives a `RenderJob` through its lifecycle from poll signals.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the transition for `signal`.
    ///
    /// Terminal jobs are never modified; a `Running` signal on a job that is
    /// already running is a no-op.
    pub fn next(job: &mut RenderJob, signal: JobSignal) -> Transition {
        if job.state.is_terminal() {
            return Transition::Complete(job.state);
        }

        let transition = match signal {
            JobSignal::Pending => Transition::Stay,
            JobSignal::Running => match job.state {
                JobState::Submitted => Transition::Next(JobState::Running),
                _ => Transition::Stay,
            },
            JobSignal::Finished => Transition::Complete(JobState::Completed),
            JobSignal::Failed => Transition::Complete(JobState::Failed),
            JobSignal::Deadline => Transition::Complete(JobState::TimedOut),
        };

        match transition {
            Transition::Next(state) | Transition::Complete(state) => job.advance(state),
            Transition::Stay => {}
        }

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> RenderJob {
        RenderJob::new("job-1".into(), "a prompt".into(), "blurry".into(), 512, 512, 1)
    }

    #[test]
    fn happy_path_walks_forward() {
        let mut job = make_job();
        assert_eq!(job.state, JobState::Submitted);

        assert_eq!(StateMachine::next(&mut job, JobSignal::Pending), Transition::Stay);
        assert_eq!(job.state, JobState::Submitted);

        let t = StateMachine::next(&mut job, JobSignal::Running);
        assert_eq!(t, Transition::Next(JobState::Running));
        assert_eq!(job.state, JobState::Running);

        let t = StateMachine::next(&mut job, JobSignal::Running);
        assert_eq!(t, Transition::Stay);

        let t = StateMachine::next(&mut job, JobSignal::Finished);
        assert_eq!(t, Transition::Complete(JobState::Completed));
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn submitted_can_complete_without_running() {
        let mut job = make_job();
        let t = StateMachine::next(&mut job, JobSignal::Finished);
        assert_eq!(t, Transition::Complete(JobState::Completed));
    }

    #[test]
    fn failure_and_deadline_are_terminal() {
        let mut job = make_job();
        StateMachine::next(&mut job, JobSignal::Running);
        let t = StateMachine::next(&mut job, JobSignal::Failed);
        assert_eq!(t, Transition::Complete(JobState::Failed));

        let mut job = make_job();
        let t = StateMachine::next(&mut job, JobSignal::Deadline);
        assert_eq!(t, Transition::Complete(JobState::TimedOut));
    }

    #[test]
    fn terminal_state_never_reverts() {
        let mut job = make_job();
        StateMachine::next(&mut job, JobSignal::Deadline);

        for signal in [
            JobSignal::Pending,
            JobSignal::Running,
            JobSignal::Finished,
            JobSignal::Failed,
        ] {
            let t = StateMachine::next(&mut job, signal);
            assert_eq!(t, Transition::Complete(JobState::TimedOut));
            assert_eq!(job.state, JobState::TimedOut);
        }
    }

    #[test]
    fn state_history_is_recorded() {
        let mut job = make_job();
        StateMachine::next(&mut job, JobSignal::Pending);
        StateMachine::next(&mut job, JobSignal::Running);
        StateMachine::next(&mut job, JobSignal::Finished);

        assert_eq!(
            job.state_history,
            vec![JobState::Submitted, JobState::Running]
        );
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn state_display() {
        assert_eq!(JobState::Submitted.to_string(), "SUBMITTED");
        assert_eq!(JobState::Running.to_string(), "RUNNING");
        assert_eq!(JobState::Completed.to_string(), "COMPLETED");
        assert_eq!(JobState::Failed.to_string(), "FAILED");
        assert_eq!(JobState::TimedOut.to_string(), "TIMED_OUT");
    }
}
