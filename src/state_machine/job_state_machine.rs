use super::{events::JobEvent, states::JobState};
use crate::error::{ChargenError, Result};
use crate::models::{Job, JobOutcome};

/// Pure, in-memory state machine for job lifecycle management.
///
/// The monitor (and, for submission failures, the submitter) drive all
/// transitions through here; applying an event both validates the move and
/// writes the matching outcome, so state and outcome cannot drift apart.
pub struct JobStateMachine;

impl JobStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(current: JobState, event: &JobEvent) -> Result<JobState> {
        let target = match (current, event) {
            (JobState::Pending, JobEvent::Start) => JobState::Running,

            (JobState::Running, JobEvent::Succeed(_)) => JobState::Succeeded,

            // Submission exhaustion fails a job that never started running
            (JobState::Pending | JobState::Running, JobEvent::Fail(_)) => JobState::Failed,

            // The wait budget applies from submission, not from pickup
            (JobState::Pending | JobState::Running, JobEvent::Expire(_)) => JobState::Expired,

            (from, event) => {
                return Err(ChargenError::StateTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Validate and apply an event to a job, updating state and outcome
    /// together. Returns the new state.
    pub fn apply(job: &mut Job, event: JobEvent) -> Result<JobState> {
        let target = Self::determine_target_state(job.state, &event)?;

        job.outcome = match event {
            JobEvent::Start => JobOutcome::Unresolved,
            JobEvent::Succeed(output) => JobOutcome::Succeeded { output },
            JobEvent::Fail(reason) => JobOutcome::Failed { reason },
            JobEvent::Expire(reason) => JobOutcome::Expired { reason },
        };
        job.state = target;

        Ok(target)
    }
}
