//! Terminal shell: one toggle, one status line, one scrolling log.
//!
//! Log lines scroll on stderr; the last line is a live status bar that is
//! redrawn in place. Enter toggles listening, `q` quits.

use crate::clock::Clock;
use crate::events::ShellEvent;
use crate::session::Listener;
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};
use std::thread;

/// Keyboard command read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellInput {
    Toggle,
    Quit,
}

impl ShellInput {
    /// Map one line of keyboard input to a command. Unknown input is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "" => Some(Self::Toggle),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// What the shell currently shows.
#[derive(Debug, Clone)]
pub struct ShellView {
    status: String,
    listening: bool,
    log: Vec<String>,
}

impl Default for ShellView {
    fn default() -> Self {
        Self {
            status: "Idle".to_string(),
            listening: false,
            log: Vec::new(),
        }
    }
}

impl ShellView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event, returning the log line it appended, if any.
    pub fn apply(&mut self, event: ShellEvent) -> Option<&str> {
        match event {
            ShellEvent::Status(status) => {
                self.status = status;
                None
            }
            ShellEvent::Listening(listening) => {
                self.listening = listening;
                None
            }
            ShellEvent::Log(line) => {
                self.log.push(line);
                self.log.last().map(String::as_str)
            }
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.listening {
            "Stop Listening"
        } else {
            "Start Listening"
        }
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }
}

/// Clear the current terminal line (the status bar)
fn clear_line() {
    eprint!("\r\x1b[2K");
}

fn render_status(view: &ShellView) {
    clear_line();
    eprint!(
        "[Enter] {}  {} {}",
        view.toggle_label().bold(),
        "Status:".dimmed(),
        view.status()
    );
    io::stderr().flush().ok();
}

/// Print one log line above the status bar.
pub fn render_log_line(line: &str) {
    clear_line();
    if line.starts_with("> Query:") {
        eprintln!("{}", line.cyan());
    } else if line.starts_with("LLM Response:") {
        eprintln!("{}", line.green());
    } else if line.starts_with("Error") || line.starts_with("Initialization Error") {
        eprintln!("{}", line.red());
    } else {
        eprintln!("{line}");
    }
}

/// Read stdin lines on a helper thread and forward them as commands.
/// End of input counts as quit.
pub fn spawn_input_reader() -> Receiver<ShellInput> {
    let (tx, rx) = unbounded();
    thread::spawn(move || read_input(io::stdin().lock(), &tx));
    rx
}

fn read_input(reader: impl BufRead, tx: &Sender<ShellInput>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if let Some(input) = ShellInput::parse(&line) {
            if tx.send(input).is_err() || input == ShellInput::Quit {
                return;
            }
        }
    }
    tx.send(ShellInput::Quit).ok();
}

/// Run the interactive shell until the user quits. Stops any running
/// session on the way out.
pub fn run_shell<C: Clock + Clone + 'static>(
    listener: &mut Listener<C>,
    events: &Receiver<ShellEvent>,
    input: &Receiver<ShellInput>,
) {
    let mut view = ShellView::new();
    eprintln!(
        "{}",
        "Press Enter to start or stop listening, q then Enter to quit.".dimmed()
    );
    render_status(&view);

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    if let Some(line) = view.apply(event) {
                        render_log_line(line);
                    }
                    render_status(&view);
                }
                Err(_) => break,
            },
            recv(input) -> command => match command {
                Ok(ShellInput::Toggle) => listener.toggle(),
                Ok(ShellInput::Quit) | Err(_) => break,
            },
        }
    }

    listener.stop();
    clear_line();
    io::stderr().flush().ok();
}
