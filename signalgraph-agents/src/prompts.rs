//! ABOUTME: State-specific Router stage instructions
//! ABOUTME: Ported from agent/lib/prompts.py

use crate::loop_state::ExecutionState;

const BASE_DECISION: &str = "Decide the next action: 'call_tool' to use a tool, or 'finish' if task is complete.";

pub fn state_instructions(state: ExecutionState) -> String {
    match state {
        ExecutionState::Initial => format!(
            "{BASE_DECISION}\n\n\
INITIAL EXECUTION:\n\
1. Analyze the task and available context\n\
2. Determine if you need additional information from tools\n\
3. If tools are needed, choose 'call_tool' and specify which tool\n\
4. If you have enough information to complete the task, choose 'finish'\n\n\
IMPORTANT: Only call tools that are NECESSARY. Be selective."
        ),
        ExecutionState::ToolResponse => format!(
            "{BASE_DECISION}\n\n\
TOOL RESPONSE RECEIVED:\n\
Your previous tool call was successful. Review the results in conversation history.\n\n\
NEXT STEPS:\n\
1. Analyze if the tool response provides what you need\n\
2. If more information is needed, call another tool\n\
3. If task can now be completed, choose 'finish'\n\n\
Do NOT re-call tools that already succeeded."
        ),
        ExecutionState::ToolError => format!(
            "{BASE_DECISION}\n\n\
TOOL ERROR OCCURRED:\n\
Your previous tool call failed. Review the error in conversation history.\n\n\
RECOVERY:\n\
1. Understand what went wrong\n\
2. Fix parameters and retry the failed tool, OR\n\
3. Try a different approach with another tool\n\
4. If task can be completed despite the error, choose 'finish'"
        ),
        ExecutionState::Retry => format!(
            "{BASE_DECISION}\n\n\
RETRY NEEDED:\n\
A system error occurred (e.g., invalid tool name). Review the error.\n\n\
RECOVERY:\n\
1. Check that tool names match available tools exactly\n\
2. Use a valid tool name and try again\n\
3. If no tools are needed, choose 'finish'"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_mentions_the_base_decision() {
        for state in [ExecutionState::Initial, ExecutionState::ToolResponse, ExecutionState::ToolError, ExecutionState::Retry] {
            assert!(state_instructions(state).contains(BASE_DECISION));
        }
    }
}
