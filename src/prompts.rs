//! Prompt text and canned tool-result messages

use crate::models::CustomerIdentity;

pub const EMAIL_SYSTEM_PROMPT: &str = "You are a conversational and friendly assistant. \
Your only goal is to get the user to provide you their email address. \
Once you have received their email address, always retrieve their customer info. \
Thank them, refer to them by their name and ask them how you can help. \
You do not know what you can help them with, just ask them how you can help. \
You may only speak in English unless directed otherwise.";

pub const SQL_SYSTEM_PROMPT: &str = "You are a conversational and friendly assistant for a physical-copy music store. \
You are equipped to help the customer do the following things, upon request:\n\
 - look up information about their account and past purchases\n\
 - browse our store's music catalogue\n\
 - suggest music and build playlists for the customer\n\
 - facilitate transactions on behalf of the customer\n\
If the customer asks you to do something outside this scope try to redirect them towards the topic of music. \
Please use the customer's name and only speak English unless otherwise prompted.";

pub const LOOKUP_FAILED_MESSAGE: &str =
    "Error signing in! Please ask the user to recheck the spelling of their email!";

pub const CONFIRMATION_REJECTED_MESSAGE: &str =
    "Please ask the user to recheck the spelling of their email";

pub const EXTRA_LOOKUP_MESSAGE: &str =
    "Only one account lookup is processed at a time. Ignoring this call.";

/// Query-flow system prompt with the live customer and schema context
pub fn sql_system_prompt(
    identity: &CustomerIdentity,
    table_names: &[String],
    summary: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{}\n\n\
The current customer's ID is {}.\n\
The current customer's name is {}.\n\
The valid database tables are: {}.\n\
Always use the customer's ID from state when making queries.\n\
Do not ask the user for their ID.\n",
        SQL_SYSTEM_PROMPT,
        identity.customer_id,
        identity.customer_name,
        table_names.join(", "),
    );

    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\nSummary of the conversation so far:\n");
        prompt.push_str(summary);
        prompt.push('\n');
    }

    prompt
}

/// Instruction appended to the log when compacting it
pub fn summary_instruction(prior_summary: Option<&str>) -> String {
    match prior_summary.filter(|s| !s.is_empty()) {
        Some(summary) => format!(
            "This is summary of the conversation to date: {}\n\n\
Extend the summary by taking into account the new messages above:",
            summary
        ),
        None => "Create a summary of the conversation above:".to_string(),
    }
}

/// Tool result for a failed query-flow tool call
pub fn tool_error_message(detail: &str) -> String {
    format!("Error: {}\n Please fix your mistakes.", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_system_prompt_includes_state() {
        let identity = CustomerIdentity {
            customer_id: 7,
            customer_name: "Ana".to_string(),
        };
        let tables = vec!["Album".to_string(), "Customer".to_string()];

        let prompt = sql_system_prompt(&identity, &tables, None);
        assert!(prompt.starts_with(SQL_SYSTEM_PROMPT));
        assert!(prompt.contains("The current customer's ID is 7."));
        assert!(prompt.contains("The current customer's name is Ana."));
        assert!(prompt.contains("The valid database tables are: Album, Customer."));
        assert!(!prompt.contains("Summary of the conversation"));

        let with_summary = sql_system_prompt(&identity, &tables, Some("Ana likes AC/DC."));
        assert!(with_summary.ends_with("Ana likes AC/DC.\n"));
    }

    #[test]
    fn test_summary_instruction() {
        assert_eq!(
            summary_instruction(None),
            "Create a summary of the conversation above:"
        );
        assert_eq!(
            summary_instruction(Some("")),
            "Create a summary of the conversation above:"
        );

        let extend = summary_instruction(Some("Ana bought two tracks."));
        assert!(extend.starts_with("This is summary of the conversation to date: Ana bought two tracks."));
        assert!(extend.ends_with("Extend the summary by taking into account the new messages above:"));
    }
}
