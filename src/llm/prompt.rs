//! Prompt rendering for instruct-tuned llama models

/// Render a user message into the llama-2 instruct chat format
#[must_use]
pub fn render_prompt(system: &str, user: &str) -> String {
    format!("[INST] <<SYS>>\n{system}\n<</SYS>>\n{user}[/INST]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt() {
        let prompt = render_prompt("You are a helpful assistant.", "What time is it?");
        assert_eq!(
            prompt,
            "[INST] <<SYS>>\nYou are a helpful assistant.\n<</SYS>>\nWhat time is it?[/INST]"
        );
    }

    #[test]
    fn test_render_prompt_keeps_user_text_verbatim() {
        let prompt = render_prompt("sys", "line one\nline two");
        assert!(prompt.contains("line one\nline two"));
        assert!(prompt.ends_with("[/INST]"));
    }
}
