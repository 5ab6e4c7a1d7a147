use super::goal::GoalThresholds;
use super::observation::Snapshot;
use super::tools::render_menu;

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub goal_text: String,
    pub command_contract: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let goals = GoalThresholds::default();
        Self::for_thresholds(goals.dirt_required, goals.wood_required)
    }
}

impl PromptConfig {
    pub fn for_thresholds(dirt_required: u32, wood_required: u32) -> Self {
        Self {
            goal_text: format!(
                "Your goals are:\n1. Collect at least {dirt_required} blocks of dirt.\n2. Collect at least {wood_required} logs or wood.\n3. Complete any other assigned tasks.\nComplete your goals as fast as possible."
            ),
            command_contract: "What should the bot do next? Respond with one clear command. Return only the command, with no additional response.\nDo not wrap the command in quotes or any other special characters.\nYou can only use the commands listed above, exactly in the form shown.".to_string(),
        }
    }
}

pub fn build_user_prompt(snapshot: &Snapshot, cfg: &PromptConfig) -> String {
    let state_json = serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are controlling a Minecraft bot. The current state is:\n{state_json}\n\n{}\n\nYou can instruct the bot to:\n{}\n\n{}\n",
        cfg.goal_text,
        render_menu(),
        cfg.command_contract
    )
}
