//! Bot commands answered without consulting the model.

use relaybot_conversation::ToolCatalog;

/// A recognized bot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Clear,
    Help,
}

impl Command {
    /// Recognizes a command. Matching is exact and case-sensitive, so
    /// `/start@bot`, `/Start` or `/start now` are not commands.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "/start" => Some(Self::Start),
            "/clear" => Some(Self::Clear),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Confirmation sent after `/clear`.
pub const CLEARED_TEXT: &str = "🔄 Conversation history cleared!";

const COMMAND_LIST: &str = "Commands:
/start - Show this welcome message
/clear - Clear conversation history
/help - Get help";

/// Welcome text for `/start`.
#[must_use]
pub fn welcome_text(tools_enabled: bool) -> String {
    let capabilities = if tools_enabled {
        "I'm your AI assistant with access to your Notion workspace. I can:

🔍 Search and query your databases
📝 Create and update pages
➕ Append content to existing pages
📊 Summarize what's in your workspace

Just chat with me and I'll use my Notion tools when they help."
    } else {
        "I'm your AI assistant. I can:

💡 Brainstorm and plan ideas
📝 Draft content for your Notion pages
🎯 Organize tasks and projects
💬 Answer questions

Just chat with me naturally!"
    };

    format!("Welcome! 🤖\n\n{capabilities}\n\n{COMMAND_LIST}")
}

/// Help text for `/help`, listing the available tools when there are any.
#[must_use]
pub fn help_text(catalog: &ToolCatalog) -> String {
    let body = if catalog.is_empty() {
        "I can help you with:

✨ Ideas and planning
📝 Drafting agendas, outlines and templates
🎯 Prioritizing and organizing tasks

💬 Just chat naturally, for example \"Help me plan my week\"."
            .to_string()
    } else {
        let tools = catalog
            .iter()
            .map(|tool| format!("• {}: {}", tool.name, tool.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "🔧 Available tools:\n{tools}\n\n💬 Just chat naturally, for example \"What databases do I have?\""
        )
    };

    format!("🤖 Help\n\n{body}\n\n{COMMAND_LIST}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_conversation::ToolDescriptor;

    #[test]
    fn commands_match_exactly() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/clear"), Some(Command::Clear));
        assert_eq!(Command::parse("/help"), Some(Command::Help));

        assert_eq!(Command::parse("/Start"), None);
        assert_eq!(Command::parse("/start now"), None);
        assert_eq!(Command::parse("/start@relay_bot"), None);
        assert_eq!(Command::parse("/settings"), None);
        assert_eq!(Command::parse("start"), None);
    }

    #[test]
    fn help_lists_tools_in_catalog_order() {
        let catalog = ToolCatalog::new(vec![
            ToolDescriptor::new("notion_search", "Search pages"),
            ToolDescriptor::new("notion_create_page", "Create a page"),
        ]);

        let text = help_text(&catalog);
        let search = text.find("• notion_search: Search pages").expect("search listed");
        let create = text
            .find("• notion_create_page: Create a page")
            .expect("create listed");
        assert!(search < create);
        assert!(text.contains("/clear"));
    }

    #[test]
    fn help_without_tools_is_static() {
        let text = help_text(&ToolCatalog::default());
        assert!(!text.contains('•'));
        assert!(text.contains("/help"));
    }

    #[test]
    fn welcome_mentions_commands() {
        assert!(welcome_text(true).starts_with("Welcome!"));
        assert!(welcome_text(false).contains("/clear - Clear conversation history"));
    }
}
