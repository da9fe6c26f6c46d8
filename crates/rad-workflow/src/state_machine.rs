//! 检查与预约状态机
//!
//! 检查和预约使用两套独立的状态词汇，各自维护转换表。状态只能向前推进，
//! 取消可以从任一未终止状态进入。

use rad_core::{AppointmentStatus, RadError, Result, StudyStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 检查状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StudyEvent {
    Start,
    Complete,
    Cancel,
    Report,
    Verify,
}

impl StudyEvent {
    /// 该事件是否需要先通过安全检查单
    pub fn requires_checklist(&self) -> bool {
        matches!(self, StudyEvent::Complete)
    }
}

/// 检查状态机
#[derive(Debug)]
pub struct StudyStateMachine {
    transitions: HashMap<(StudyStatus, StudyEvent), StudyStatus>,
}

impl StudyStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((StudyStatus::Scheduled, StudyEvent::Start), StudyStatus::InProgress);
        transitions.insert((StudyStatus::InProgress, StudyEvent::Complete), StudyStatus::Completed);
        transitions.insert((StudyStatus::Scheduled, StudyEvent::Cancel), StudyStatus::Cancelled);
        transitions.insert((StudyStatus::InProgress, StudyEvent::Cancel), StudyStatus::Cancelled);
        // 报告流程
        transitions.insert((StudyStatus::Completed, StudyEvent::Report), StudyStatus::Reported);
        transitions.insert((StudyStatus::Reported, StudyEvent::Verify), StudyStatus::Verified);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: StudyStatus, event: StudyEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: StudyStatus, event: StudyEvent) -> Result<StudyStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| RadError::InvalidStateTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            })
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: StudyStatus) -> Vec<StudyEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for StudyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 预约状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentEvent {
    CheckIn,
    Start,
    Complete,
    Cancel,
    MarkNoShow,
}

/// 预约状态机
#[derive(Debug)]
pub struct AppointmentStateMachine {
    transitions: HashMap<(AppointmentStatus, AppointmentEvent), AppointmentStatus>,
}

impl AppointmentStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        use rad_core::AppointmentStatus as S;
        use self::AppointmentEvent as E;

        let mut transitions = HashMap::new();

        transitions.insert((S::Scheduled, E::CheckIn), S::CheckedIn);
        transitions.insert((S::CheckedIn, E::Start), S::InProgress);
        transitions.insert((S::InProgress, E::Complete), S::Completed);
        transitions.insert((S::Scheduled, E::MarkNoShow), S::NoShow);

        for from in [S::Scheduled, S::CheckedIn, S::InProgress] {
            transitions.insert((from, E::Cancel), S::Cancelled);
        }

        Self { transitions }
    }

    pub fn can_transition(&self, from: AppointmentStatus, event: AppointmentEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(
        &self,
        from: AppointmentStatus,
        event: AppointmentEvent,
    ) -> Result<AppointmentStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| RadError::InvalidStateTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            })
    }

    pub fn get_possible_events(&self, current_state: AppointmentStatus) -> Vec<AppointmentEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for AppointmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_forward_transitions() {
        let sm = StudyStateMachine::new();

        let steps = [
            (StudyStatus::Scheduled, StudyEvent::Start, StudyStatus::InProgress),
            (StudyStatus::InProgress, StudyEvent::Complete, StudyStatus::Completed),
            (StudyStatus::Completed, StudyEvent::Report, StudyStatus::Reported),
            (StudyStatus::Reported, StudyEvent::Verify, StudyStatus::Verified),
        ];
        for (from, event, to) in steps {
            assert_eq!(sm.transition(from, event).unwrap(), to);
        }
    }

    #[test]
    fn test_study_invalid_transitions() {
        let sm = StudyStateMachine::new();

        assert!(!sm.can_transition(StudyStatus::Scheduled, StudyEvent::Complete));
        assert!(!sm.can_transition(StudyStatus::Completed, StudyEvent::Cancel));
        assert!(!sm.can_transition(StudyStatus::Cancelled, StudyEvent::Start));

        let err = sm.transition(StudyStatus::Cancelled, StudyEvent::Start).unwrap_err();
        assert!(matches!(err, RadError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_study_cancel_from_open_states() {
        let sm = StudyStateMachine::new();

        assert!(sm.can_transition(StudyStatus::Scheduled, StudyEvent::Cancel));
        assert!(sm.can_transition(StudyStatus::InProgress, StudyEvent::Cancel));
        assert!(StudyEvent::Complete.requires_checklist());
        assert!(!StudyEvent::Cancel.requires_checklist());
    }

    #[test]
    fn test_appointment_forward_only() {
        let sm = AppointmentStateMachine::new();

        let checked_in = sm
            .transition(AppointmentStatus::Scheduled, AppointmentEvent::CheckIn)
            .unwrap();
        let started = sm.transition(checked_in, AppointmentEvent::Start).unwrap();
        let completed = sm.transition(started, AppointmentEvent::Complete).unwrap();
        assert_eq!(completed, AppointmentStatus::Completed);

        assert!(!sm.can_transition(AppointmentStatus::InProgress, AppointmentEvent::CheckIn));
        assert!(!sm.can_transition(AppointmentStatus::Scheduled, AppointmentEvent::Start));
        assert!(!sm.can_transition(AppointmentStatus::CheckedIn, AppointmentEvent::MarkNoShow));
    }

    #[test]
    fn test_appointment_cancel_is_terminal() {
        let sm = AppointmentStateMachine::new();

        for from in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::CheckedIn,
            AppointmentStatus::InProgress,
        ] {
            assert_eq!(
                sm.transition(from, AppointmentEvent::Cancel).unwrap(),
                AppointmentStatus::Cancelled
            );
        }

        for terminal in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(terminal.is_terminal());
            assert!(sm.get_possible_events(terminal).is_empty());
        }
    }
}
