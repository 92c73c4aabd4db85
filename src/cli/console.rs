use colored::*;
use std::io::{self, Write};

use crate::core::DoneSummary;

/// Longest tool result shown before truncation
const MAX_TOOL_OUTPUT: usize = 500;

/// Console handles all terminal I/O with colored formatting
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            tool_color: Color::Magenta,
        }
    }

    /// Print the name of the answering agent (without newline)
    pub fn print_agent_prefix(&self, agent: &str) {
        print!("{} ", format!("{}:", agent).color(self.assistant_color).bold());
        flush();
    }

    /// Print a chunk of streamed reply
    pub fn print_token(&self, chunk: &str) {
        print!("{}", chunk.color(self.assistant_color));
        flush();
    }

    pub fn println(&self) {
        println!();
    }

    /// Print a system message (routing notices, command output)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Read a line of input from the user
    pub fn read_input(&self) -> io::Result<Option<String>> {
        print!("{} ", ">".color(self.user_color).bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }

    pub fn print_banner(&self, session_id: &str, user_id: &str) {
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "  Agent Switchboard".bright_blue().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!("Session {} for user {}", session_id.bold(), user_id.bold());
        println!("Commands:");
        println!("  /agent <name> <message>  route to a specific agent");
        println!("  /lock on|off             keep the current agent");
        println!("  /share                   share this session with your other sessions");
        println!("  /memory <query>          search your sessions");
        println!("  exit | quit              end the session");
        println!();
    }

    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }

    /// Print a tool invocation
    pub fn print_tool_action(&self, tool_name: &str, action: &str) {
        println!(
            "{} {} {}",
            "Tool:".color(self.tool_color).bold(),
            format!("[{}]", tool_name).color(self.tool_color),
            action
        );
    }

    /// Print a tool result, truncating long output
    pub fn print_tool_result(&self, result: &str, is_error: bool) {
        if is_error {
            println!("{} {}", "Tool Error:".red().bold(), result);
            return;
        }

        println!("{}", truncate(result, MAX_TOOL_OUTPUT).bright_black());
    }

    /// Print the routing footer for a finished turn
    pub fn print_done(&self, summary: &DoneSummary) {
        let mut line = format!(
            "{} ({}) confidence {:.2} | {} | agent {} ms, total {} ms",
            summary.agent_name,
            summary.agent_type,
            summary.confidence,
            summary.reason,
            summary.execution_time_ms,
            summary.total_time_ms,
        );
        if let Some(ttft) = summary.time_to_first_token_ms {
            line.push_str(&format!(", first token {} ms", ttft));
        }
        if summary.fallback_used {
            line.push_str(" [fallback]");
        }
        println!("{}", line.bright_black());
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn flush() {
    let _ = io::stdout().flush();
}

/// Cut `text` to at most `max` bytes on a char boundary
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n(output truncated)", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert!(truncate(&"x".repeat(20), 10).starts_with("xxxxxxxxxx..."));
        // multi-byte char straddling the cut
        let text = format!("{}é", "a".repeat(9));
        assert!(truncate(&text, 10).starts_with(&"a".repeat(9)));
    }
}
