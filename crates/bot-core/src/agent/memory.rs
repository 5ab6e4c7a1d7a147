use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

pub const HISTORY_LIMIT: usize = 10;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are controlling a Minecraft bot in a Survival world. Your background data includes your inventory, nearby players, current biome, and more. Remember the last 9 steps to inform your decisions.";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Roles that may be appended after construction; the system entry is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Conversation fed to the model: the system entry followed by the most recent turns.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            entries: vec![HistoryEntry {
                role: Role::System,
                content: system_prompt.into(),
            }],
        }
    }

    pub fn append(&mut self, role: TurnRole, content: impl Into<String>) {
        self.entries.push(HistoryEntry {
            role: role.into(),
            content: content.into(),
        });
        while self.entries.len() > HISTORY_LIMIT {
            self.entries.remove(1);
        }
    }

    pub fn snapshot_for_inference(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Latest human-readable command outcome.
///
/// Both the tick and background completions write here; whoever writes last wins.
#[derive(Debug, Clone)]
pub struct ResultRecord(Arc<Mutex<String>>);

impl Default for ResultRecord {
    fn default() -> Self {
        Self(Arc::new(Mutex::new("None".to_string())))
    }
}

impl ResultRecord {
    pub fn set(&self, text: impl Into<String>) {
        *lock(&self.0) = text.into();
    }

    pub fn get(&self) -> String {
        lock(&self.0).clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GoalProgress {
    pub houses_built: u32,
    pub other_goals_completed: bool,
}

/// Shared, monotonic handle on [`GoalProgress`].
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<Mutex<GoalProgress>>);

impl ProgressHandle {
    /// Returns the new total.
    pub fn record_house_built(&self) -> u32 {
        let mut p = lock(&self.0);
        p.houses_built = p.houses_built.saturating_add(1);
        p.houses_built
    }

    pub fn mark_other_goals_completed(&self) {
        lock(&self.0).other_goals_completed = true;
    }

    pub fn get(&self) -> GoalProgress {
        *lock(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_keeps_system_entry() {
        for n in 0..40 {
            let mut h = ConversationHistory::new("sys");
            for i in 0..n {
                let role = if i % 2 == 0 {
                    TurnRole::User
                } else {
                    TurnRole::Assistant
                };
                h.append(role, format!("m{i}"));
                assert!(h.len() <= HISTORY_LIMIT);
            }
            let entries = h.snapshot_for_inference();
            assert_eq!(entries.len(), (n + 1).min(HISTORY_LIMIT));
            assert_eq!(entries[0].role, Role::System);
            assert_eq!(entries[0].content, "sys");
            assert_eq!(
                entries.iter().filter(|e| e.role == Role::System).count(),
                1
            );
        }
    }

    #[test]
    fn history_evicts_oldest_turns_first() {
        let mut h = ConversationHistory::new("sys");
        for i in 0..12 {
            h.append(TurnRole::User, format!("m{i}"));
        }
        let contents: Vec<&str> = h
            .snapshot_for_inference()
            .iter()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(
            contents,
            vec!["sys", "m3", "m4", "m5", "m6", "m7", "m8", "m9", "m10", "m11"]
        );
    }

    #[test]
    fn result_record_is_last_writer_wins() {
        let r = ResultRecord::default();
        assert_eq!(r.get(), "None");
        let other = r.clone();
        r.set("first");
        other.set("second");
        assert_eq!(r.get(), "second");
    }

    #[test]
    fn progress_only_moves_forward() {
        let p = ProgressHandle::default();
        assert_eq!(p.record_house_built(), 1);
        assert_eq!(p.record_house_built(), 2);
        p.mark_other_goals_completed();
        p.mark_other_goals_completed();
        assert_eq!(
            p.get(),
            GoalProgress {
                houses_built: 2,
                other_goals_completed: true
            }
        );
    }
}
