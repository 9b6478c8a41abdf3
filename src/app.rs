use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{agent_reply, AgentClient, ExecuteResponse, RunResponse};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    System,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Python,
    Javascript,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Javascript => "JavaScript",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Language::Python => Language::Javascript,
            Language::Javascript => Language::Python,
        }
    }
}

/// Tone of the code output pane: executed output vs. an error report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTone {
    #[default]
    Normal,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Code,
    Browser,
    Search,
    Analyze,
}

impl Tool {
    /// Unknown identifiers map to `None` and are ignored by callers.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "code" => Some(Tool::Code),
            "browser" => Some(Tool::Browser),
            "search" => Some(Tool::Search),
            "analyze" => Some(Tool::Analyze),
            _ => None,
        }
    }
}

const BROWSER_TOOL_TIP: &str =
    "To use the browser tool, type a task like: \"Look up how Python handles list slicing\"";
const SEARCH_TOOL_TIP: &str =
    "To use the code search tool, type a task like: \"Find how to read a file in Python\"";
const ANALYZE_TOOL_TIP: &str =
    "To use the code analysis tool, type a task like: \"Analyze this code and suggest improvements\"";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat state
    pub chat_messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub waiting_for_response: bool,
    pub agent_task: Option<JoinHandle<Result<RunResponse>>>,

    // Settings popup state
    pub show_settings: bool,
    pub settings_input: String,
    pub settings_cursor: usize,

    // Code popup state
    pub show_code_modal: bool,
    pub code_input: String,
    pub code_cursor: usize,
    pub language: Language,
    pub code_output: String,
    pub output_tone: OutputTone,
    code_results_tx: mpsc::UnboundedSender<Result<ExecuteResponse>>,
    code_results_rx: mpsc::UnboundedReceiver<Result<ExecuteResponse>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Session state
    pub api_key: String,
    pub config: Config,
    pub client: AgentClient,
}

impl App {
    pub fn new(config: Config, client: AgentClient) -> Self {
        let api_key = config.api_key.clone().unwrap_or_default();
        let (code_results_tx, code_results_rx) = mpsc::unbounded_channel();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            chat_messages: Vec::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            waiting_for_response: false,
            agent_task: None,

            // First launch without a stored key opens the settings popup
            show_settings: api_key.is_empty(),
            settings_input: api_key.clone(),
            settings_cursor: api_key.chars().count(),

            show_code_modal: false,
            code_input: String::new(),
            code_cursor: 0,
            language: Language::default(),
            code_output: String::new(),
            output_tone: OutputTone::default(),
            code_results_tx,
            code_results_rx,

            animation_frame: 0,

            api_key,
            config,
            client,
        }
    }

    fn push_message(&mut self, role: ChatRole, content: impl Into<String>) {
        self.chat_messages.push(ChatMessage {
            role,
            content: content.into(),
        });
        self.scroll_chat_to_bottom();
    }

    /// Take the pending task text for dispatch. Empty input and an in-flight
    /// request are both silent no-ops.
    pub fn send_message(&mut self) -> Option<String> {
        let task = self.chat_input.trim().to_string();
        if task.is_empty() || self.waiting_for_response {
            return None;
        }

        self.push_message(ChatRole::User, task.clone());
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.waiting_for_response = true;

        Some(task)
    }

    /// Settle the in-flight agent exchange. The waiting flag clears before
    /// the reply is chosen so a new send is allowed no matter the outcome.
    pub fn finish_agent_request(&mut self, outcome: Result<RunResponse>) {
        self.waiting_for_response = false;

        let reply = match outcome {
            Ok(response) => agent_reply(&response),
            Err(e) => format!("Communication error: {e:#}"),
        };
        self.push_message(ChatRole::System, reply);
    }

    pub fn agent_task_finished(&self) -> bool {
        self.agent_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false)
    }

    /// Take the code to run, flipping the output pane into its interim state.
    /// Overlapping runs are allowed; the last response to arrive wins.
    pub fn start_code_run(&mut self) -> Option<(String, Language)> {
        let code = self.code_input.trim().to_string();
        if code.is_empty() {
            return None;
        }

        self.code_output = "Running...".to_string();
        self.output_tone = OutputTone::Normal;

        Some((code, self.language))
    }

    pub fn code_results_sender(&self) -> mpsc::UnboundedSender<Result<ExecuteResponse>> {
        self.code_results_tx.clone()
    }

    /// Drain finished code runs in arrival order.
    pub fn poll_code_results(&mut self) {
        while let Ok(outcome) = self.code_results_rx.try_recv() {
            self.apply_code_outcome(outcome);
        }
    }

    pub fn apply_code_outcome(&mut self, outcome: Result<ExecuteResponse>) {
        match outcome {
            Ok(response) if response.success => match response.result {
                Some(result) if result.success => {
                    self.code_output = result
                        .output
                        .filter(|output| !output.is_empty())
                        .unwrap_or_else(|| "(no output)".to_string());
                    self.output_tone = OutputTone::Normal;
                }
                Some(result) => {
                    self.code_output = result
                        .error
                        .filter(|error| !error.is_empty())
                        .unwrap_or_else(|| "An error occurred".to_string());
                    self.output_tone = OutputTone::Error;
                }
                None => {
                    self.code_output = "(no output)".to_string();
                    self.output_tone = OutputTone::Normal;
                }
            },
            Ok(response) => {
                self.code_output = response
                    .error
                    .filter(|error| !error.is_empty())
                    .unwrap_or_else(|| "An error occurred".to_string());
                self.output_tone = OutputTone::Error;
            }
            Err(e) => {
                self.code_output = format!("Communication error: {e:#}");
                self.output_tone = OutputTone::Error;
            }
        }
    }

    pub fn open_settings(&mut self) {
        self.show_settings = true;
        self.settings_input = self.api_key.clone();
        self.settings_cursor = self.settings_input.chars().count();
    }

    pub fn close_settings(&mut self) {
        self.show_settings = false;
    }

    /// Save the key from the settings popup. An empty or whitespace-only key
    /// is rejected and the popup stays open. Returns true when the key was
    /// accepted, so the caller can persist the config.
    pub fn save_api_key(&mut self) -> bool {
        let key = self.settings_input.trim().to_string();
        if key.is_empty() {
            return false;
        }

        self.api_key = key.clone();
        self.config.api_key = Some(key);
        self.show_settings = false;
        self.push_message(ChatRole::System, "API key saved.");
        true
    }

    pub fn dispatch_tool(&mut self, tool: Tool) {
        match tool {
            Tool::Code => self.show_code_modal = true,
            Tool::Browser => self.push_message(ChatRole::System, BROWSER_TOOL_TIP),
            Tool::Search => self.push_message(ChatRole::System, SEARCH_TOOL_TIP),
            Tool::Analyze => self.push_message(ChatRole::System, ANALYZE_TOOL_TIP),
        }
    }

    pub fn close_code_modal(&mut self) {
        // Editor content and prior output survive for the next open
        self.show_code_modal = false;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.waiting_for_response {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    /// Scroll so the latest message (and the thinking indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You" or "Pocket AI")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        // Room for the thinking indicator
        total_lines += 2;

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_app() -> App {
        App::new(
            Config {
                api_key: Some("abc123".to_string()),
                server_url: None,
            },
            AgentClient::new("http://localhost:54656"),
        )
    }

    fn run_response(value: serde_json::Value) -> RunResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn startup_without_key_opens_settings() {
        let app = App::new(Config::new(), AgentClient::new("http://localhost:54656"));
        assert!(app.show_settings);
    }

    #[test]
    fn startup_with_key_keeps_settings_hidden() {
        let app = test_app();
        assert!(!app.show_settings);
        assert_eq!(app.api_key, "abc123");
    }

    #[test]
    fn send_appends_exactly_one_user_message() {
        let mut app = test_app();
        app.chat_input = "  do a thing  ".to_string();

        let task = app.send_message();

        assert_eq!(task.as_deref(), Some("do a thing"));
        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].role, ChatRole::User);
        assert_eq!(app.chat_messages[0].content, "do a thing");
        assert!(app.chat_input.is_empty());
        assert!(app.waiting_for_response);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut app = test_app();
        app.chat_input = "   ".to_string();

        assert!(app.send_message().is_none());
        assert!(app.chat_messages.is_empty());
        assert!(!app.waiting_for_response);
    }

    #[test]
    fn send_while_waiting_is_a_no_op() {
        let mut app = test_app();
        app.chat_input = "first".to_string();
        app.send_message().unwrap();

        app.chat_input = "second".to_string();
        assert!(app.send_message().is_none());
        assert_eq!(app.chat_messages.len(), 1);
        // The typed text stays in the input for a later send
        assert_eq!(app.chat_input, "second");
    }

    #[test]
    fn settlement_appends_one_message_and_clears_the_flag() {
        let mut app = test_app();
        app.chat_input = "task".to_string();
        app.send_message().unwrap();

        app.finish_agent_request(Ok(run_response(json!({
            "success": true,
            "result": {"evaluation": {"feedback": "X"}}
        }))));

        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[1].role, ChatRole::System);
        assert_eq!(app.chat_messages[1].content, "X");
        assert!(!app.waiting_for_response);

        // A new send is permitted immediately
        app.chat_input = "next".to_string();
        assert!(app.send_message().is_some());
    }

    #[test]
    fn transport_failure_clears_the_flag_and_reports_it() {
        let mut app = test_app();
        app.chat_input = "task".to_string();
        app.send_message().unwrap();

        app.finish_agent_request(Err(anyhow::anyhow!("timeout")));

        assert!(!app.waiting_for_response);
        assert!(app.chat_messages[1].content.contains("timeout"));
    }

    #[test]
    fn server_failure_clears_the_flag_and_reports_it() {
        let mut app = test_app();
        app.chat_input = "task".to_string();
        app.send_message().unwrap();

        app.finish_agent_request(Ok(run_response(json!({
            "success": false,
            "error": "boom"
        }))));

        assert!(!app.waiting_for_response);
        assert!(app.chat_messages[1].content.contains("boom"));
    }

    #[test]
    fn empty_code_editor_is_a_no_op() {
        let mut app = test_app();
        app.code_input = "  \n  ".to_string();

        assert!(app.start_code_run().is_none());
        assert!(app.code_output.is_empty());
    }

    #[test]
    fn starting_a_run_sets_the_interim_state() {
        let mut app = test_app();
        app.code_input = "print(1)".to_string();
        app.language = Language::Python;

        let (code, language) = app.start_code_run().unwrap();

        assert_eq!(code, "print(1)");
        assert_eq!(language, Language::Python);
        assert_eq!(app.code_output, "Running...");
        assert_eq!(app.output_tone, OutputTone::Normal);
    }

    #[test]
    fn code_success_renders_output_in_normal_tone() {
        let mut app = test_app();

        let response = serde_json::from_value(json!({
            "success": true,
            "result": {"success": true, "output": "42\n"}
        }))
        .unwrap();
        app.apply_code_outcome(Ok(response));

        assert_eq!(app.code_output, "42\n");
        assert_eq!(app.output_tone, OutputTone::Normal);
    }

    #[test]
    fn code_success_without_output_renders_placeholder() {
        let mut app = test_app();

        let response = serde_json::from_value(json!({
            "success": true,
            "result": {"success": true}
        }))
        .unwrap();
        app.apply_code_outcome(Ok(response));

        assert_eq!(app.code_output, "(no output)");
        assert_eq!(app.output_tone, OutputTone::Normal);
    }

    #[test]
    fn inner_failure_renders_error_tone() {
        let mut app = test_app();

        let response = serde_json::from_value(json!({
            "success": true,
            "result": {"success": false, "error": "SyntaxError"}
        }))
        .unwrap();
        app.apply_code_outcome(Ok(response));

        assert_eq!(app.code_output, "SyntaxError");
        assert_eq!(app.output_tone, OutputTone::Error);
    }

    #[test]
    fn outer_failure_renders_error_tone() {
        let mut app = test_app();

        let response = serde_json::from_value(json!({
            "success": false,
            "error": "no interpreter"
        }))
        .unwrap();
        app.apply_code_outcome(Ok(response));

        assert_eq!(app.code_output, "no interpreter");
        assert_eq!(app.output_tone, OutputTone::Error);
    }

    #[test]
    fn code_transport_failure_renders_error_tone() {
        let mut app = test_app();

        app.apply_code_outcome(Err(anyhow::anyhow!("connection refused")));

        assert!(app.code_output.contains("connection refused"));
        assert_eq!(app.output_tone, OutputTone::Error);
    }

    #[test]
    fn later_code_result_overwrites_the_pane() {
        let mut app = test_app();

        let first = serde_json::from_value(json!({
            "success": true,
            "result": {"success": true, "output": "first"}
        }))
        .unwrap();
        let second = serde_json::from_value(json!({
            "success": true,
            "result": {"success": true, "output": "second"}
        }))
        .unwrap();

        app.code_results_sender().send(Ok(first)).unwrap();
        app.code_results_sender().send(Ok(second)).unwrap();
        app.poll_code_results();

        assert_eq!(app.code_output, "second");
    }

    #[test]
    fn saving_an_empty_key_keeps_the_popup_open() {
        let mut app = App::new(Config::new(), AgentClient::new("http://localhost:54656"));
        app.settings_input = "   ".to_string();

        assert!(!app.save_api_key());
        assert!(app.show_settings);
        assert!(app.api_key.is_empty());
        assert!(app.config.api_key.is_none());
        assert!(app.chat_messages.is_empty());
    }

    #[test]
    fn saving_a_key_updates_state_and_confirms() {
        let mut app = App::new(Config::new(), AgentClient::new("http://localhost:54656"));
        app.settings_input = " abc123 ".to_string();

        assert!(app.save_api_key());
        assert!(!app.show_settings);
        assert_eq!(app.api_key, "abc123");
        assert_eq!(app.config.api_key.as_deref(), Some("abc123"));
        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].content, "API key saved.");
    }

    #[test]
    fn unknown_tool_ids_are_ignored() {
        assert!(Tool::from_id("shell").is_none());
        assert_eq!(Tool::from_id("code"), Some(Tool::Code));
    }

    #[test]
    fn code_tool_opens_the_modal_without_messages() {
        let mut app = test_app();
        app.dispatch_tool(Tool::Code);

        assert!(app.show_code_modal);
        assert!(app.chat_messages.is_empty());
    }

    #[test]
    fn instructional_tools_append_one_system_message() {
        let mut app = test_app();
        for tool in [Tool::Browser, Tool::Search, Tool::Analyze] {
            app.dispatch_tool(tool);
        }

        assert_eq!(app.chat_messages.len(), 3);
        assert!(app
            .chat_messages
            .iter()
            .all(|msg| msg.role == ChatRole::System));
        assert!(!app.show_code_modal);
    }

    #[test]
    fn closing_the_code_modal_keeps_editor_and_output() {
        let mut app = test_app();
        app.show_code_modal = true;
        app.code_input = "print(1)".to_string();
        app.code_output = "1".to_string();

        app.close_code_modal();
        app.dispatch_tool(Tool::Code);

        assert_eq!(app.code_input, "print(1)");
        assert_eq!(app.code_output, "1");
    }

    #[test]
    fn animation_only_advances_while_waiting() {
        let mut app = test_app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.waiting_for_response = true;
        app.tick_animation();
        assert_eq!(app.animation_frame, 1);
    }
}
