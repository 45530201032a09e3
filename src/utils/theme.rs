use colored::Colorize;
use std::collections::HashMap;

type Style = Box<dyn Fn(String) -> String>;

pub struct Theme {
    messages: HashMap<&'static str, String>,
    pub prompt_style: Style,
    pub error_style: Style,
    pub warning_style: Style,
    pub success_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            messages: default_messages("$ "),
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
            success_style: Box::new(|s| s.bright_magenta().to_string()),
        }
    }
}

fn default_messages(prompt: &str) -> HashMap<&'static str, String> {
    HashMap::from([
        ("prompt", prompt.to_string()),
        ("welcome", "tinysh: pipes and redirections, nothing else".to_string()),
        ("exit", "bye".to_string()),
        ("eof_signal", "end of input, bye".to_string()),
        ("interrupt_signal", "interrupted".to_string()),
        ("error_symbol", "✗".to_string()),
        ("error", "error".to_string()),
    ])
}

impl Theme {
    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "plain" => Theme {
                messages: default_messages("$ "),
                prompt_style: Box::new(|s| s),
                error_style: Box::new(|s| s),
                warning_style: Box::new(|s| s),
                success_style: Box::new(|s| s),
            },
            "dark" => Theme {
                messages: default_messages("➤ "),
                prompt_style: Box::new(|s| s.bright_purple().to_string()),
                error_style: Box::new(|s| s.red().to_string()),
                warning_style: Box::new(|s| s.bright_blue().to_string()),
                success_style: Box::new(|s| s.magenta().to_string()),
            },
            _ => Theme::default(),
        }
    }

    pub fn get_message(&self, key: &str) -> String {
        self.messages.get(key).cloned().unwrap_or_default()
    }
}
