//! Shared test doubles for the pipeline tests.
//!
//! `ScriptedService` plays the external batch service: submissions are
//! answered from a queue of behaviors (accept, rate limit, reject) and each
//! accepted job replays a scripted sequence of poll snapshots, repeating the
//! last one once the script is exhausted.

use async_trait::async_trait;
use chargen_core::service::{
    ClassificationService, JobHandle, PollSnapshot, ServiceError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// How the service answers one submission attempt.
#[derive(Debug, Clone)]
pub enum SubmitBehavior {
    /// Accept and hand out the next handle.
    Accept,
    /// Answer with a rate limit error.
    RateLimit,
    /// Reject permanently.
    Reject(&'static str),
}

pub struct ScriptedService {
    submit_behaviors: Mutex<Vec<SubmitBehavior>>,
    /// Poll scripts attached to handles in acceptance order.
    poll_scripts: Mutex<Vec<Vec<PollSnapshot>>>,
    active: Mutex<HashMap<String, Vec<PollSnapshot>>>,
    submit_calls: AtomicUsize,
    accepted: AtomicUsize,
    bodies: Mutex<Vec<String>>,
}

impl ScriptedService {
    /// A service that accepts every submission and replays one poll script
    /// per accepted job, in order.
    pub fn accepting(poll_scripts: Vec<Vec<PollSnapshot>>) -> Self {
        Self {
            submit_behaviors: Mutex::new(Vec::new()),
            poll_scripts: Mutex::new(poll_scripts),
            active: Mutex::new(HashMap::new()),
            submit_calls: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
        }
    }

    /// Prepend scripted submission behaviors; once drained, submissions
    /// are accepted.
    pub fn with_submit_behaviors(mut self, behaviors: Vec<SubmitBehavior>) -> Self {
        self.submit_behaviors = Mutex::new(behaviors);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn accepted_jobs(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Bodies of accepted submissions, in order.
    pub fn submitted_bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClassificationService for ScriptedService {
    async fn submit(&self, body: &str) -> Result<JobHandle, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        let behavior = {
            let mut behaviors = self.submit_behaviors.lock().unwrap();
            if behaviors.is_empty() {
                SubmitBehavior::Accept
            } else {
                behaviors.remove(0)
            }
        };

        match behavior {
            SubmitBehavior::Accept => {
                let index = self.accepted.fetch_add(1, Ordering::SeqCst);
                let handle = format!("job-{index}");

                let script = {
                    let mut scripts = self.poll_scripts.lock().unwrap();
                    if scripts.is_empty() {
                        vec![PollSnapshot::completed("")]
                    } else {
                        scripts.remove(0)
                    }
                };
                self.active.lock().unwrap().insert(handle.clone(), script);
                self.bodies.lock().unwrap().push(body.to_string());

                Ok(JobHandle::new(handle))
            }
            SubmitBehavior::RateLimit => Err(ServiceError::RateLimited {
                message: "too many requests".to_string(),
            }),
            SubmitBehavior::Reject(message) => Err(ServiceError::Rejected {
                message: message.to_string(),
            }),
        }
    }

    async fn poll(&self, handle: &JobHandle) -> Result<PollSnapshot, ServiceError> {
        let mut active = self.active.lock().unwrap();
        let script = active
            .get_mut(handle.as_str())
            .ok_or_else(|| ServiceError::UnknownHandle {
                handle: handle.to_string(),
            })?;
        if script.len() > 1 {
            Ok(script.remove(0))
        } else {
            Ok(script[0].clone())
        }
    }
}

/// An output line in the shape succeeded jobs carry.
pub fn output_line(custom_id: &str, content: &str) -> String {
    serde_json::json!({ "custom_id": custom_id, "content": content }).to_string()
}
