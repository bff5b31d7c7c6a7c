//! System prompt construction for the AI side of a call.

use super::state::CallState;

/// Builds the system instructions handed to the AI for a call.
pub trait PromptBuilder: Send + Sync {
    fn build_context(&self, call_state: &CallState, extra_context: Option<&str>) -> String;
}

/// Instructions for an assistant that places a call on a user's behalf.
#[derive(Debug, Clone, Default)]
pub struct OutboundPromptBuilder;

impl PromptBuilder for OutboundPromptBuilder {
    fn build_context(&self, call_state: &CallState, extra_context: Option<&str>) -> String {
        let task = extra_context.map(str::trim).unwrap_or_default();
        format!(
            "Please refer to phone call transcripts.\n\
             Stay concise and short.\n\
             You are an assistant making an outbound call (if asked, your phone number with country code is: {from}).\n\
             Be friendly and speak in short, human sentences. Start the conversation by asking how they are. \
             Do not speak in bullet points. Ask one question at a time and say one sentence at a time.\n\
             After the task is complete, say goodbye and end the conversation.\n\
             You are not a receptionist, an administrator or the person taking a reservation. \
             Do not share information unrelated to the goal; you are calling only to complete your task.\n\
             You are the one making the request, not the one receiving it.\n\
             Be focused solely on your task:\n{task}",
            from = call_state.from_number,
        )
    }
}
