//! Submission bookkeeping.
//!
//! Every provider call gets a fresh [`TaskId`]. A result is applied only while
//! its task is still the active one, so results superseded by a pushed
//! session event or a sign-out are dropped.

use crate::providers::OAuthProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Default)]
pub struct TaskSeq {
    next: u64,
}

impl TaskSeq {
    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Probe,
    Password,
    SignUp,
    OtpRequest,
    OtpVerify,
    OAuth(OAuthProvider),
    SignOut,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Probe => "probe",
            TaskKind::Password => "password",
            TaskKind::SignUp => "sign_up",
            TaskKind::OtpRequest => "otp_request",
            TaskKind::OtpVerify => "otp_verify",
            TaskKind::OAuth(_) => "oauth",
            TaskKind::SignOut => "sign_out",
        }
    }

    /// Generic message for failures the provider did not explain.
    pub fn failure_message(self) -> String {
        match self {
            TaskKind::Probe => "Could not restore your session.".to_string(),
            TaskKind::Password => "Login failed. Please try again.".to_string(),
            TaskKind::SignUp => "Sign up failed. Please try again.".to_string(),
            TaskKind::OtpRequest => {
                "Could not send the verification code. Please try again.".to_string()
            }
            TaskKind::OtpVerify => "Verification failed. Please try again.".to_string(),
            TaskKind::OAuth(provider) => {
                format!("{} login failed. Please try again.", provider.display_name())
            }
            TaskKind::SignOut => "Logout failed. Please try again.".to_string(),
        }
    }
}

/// The in-flight task, if any.
#[derive(Debug, Default, Clone)]
pub struct TaskState {
    active: Option<(TaskId, TaskKind)>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_kind(&self) -> Option<TaskKind> {
        self.active.map(|(_, kind)| kind)
    }

    pub fn on_started(&mut self, id: TaskId, kind: TaskKind) {
        self.active = Some((id, kind));
    }

    /// Clears the task if `id` is the active one and returns its kind.
    pub fn finish_if_active(&mut self, id: TaskId) -> Option<TaskKind> {
        match self.active {
            Some((active, kind)) if active == id => {
                self.active = None;
                Some(kind)
            }
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut seq = TaskSeq::default();
        assert_eq!(seq.next_id(), TaskId(0));
        assert_eq!(seq.next_id(), TaskId(1));
    }

    #[test]
    fn test_only_active_task_finishes() {
        let mut seq = TaskSeq::default();
        let mut state = TaskState::default();
        let first = seq.next_id();
        let second = seq.next_id();

        state.on_started(second, TaskKind::Password);
        assert_eq!(state.finish_if_active(first), None);
        assert!(state.is_running());
        assert_eq!(state.finish_if_active(second), Some(TaskKind::Password));
        assert!(!state.is_running());
        assert_eq!(state.finish_if_active(second), None);
    }

    #[test]
    fn test_oauth_failure_message_names_provider() {
        assert_eq!(
            TaskKind::OAuth(OAuthProvider::Github).failure_message(),
            "GitHub login failed. Please try again."
        );
    }
}
