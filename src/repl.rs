use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{Result, ScriptError},
    engine::ScriptEngine,
};

/// Interactive session over a stack of engines. `:fork` pushes a
/// duplicate of the current engine, `:drop` returns to its parent.
pub struct Repl {
    engines: Vec<ScriptEngine>,
}

enum Command {
    Quit,
    Vars,
    Types,
    Fork,
    Drop,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let command = line.strip_prefix(':')?;
    Some(match command {
        "quit" | "exit" => Command::Quit,
        "vars" => Command::Vars,
        "types" => Command::Types,
        "fork" => Command::Fork,
        "drop" => Command::Drop,
        other => Command::Unknown(other.to_string()),
    })
}

impl Repl {
    pub fn new(engine: ScriptEngine) -> Self {
        Self {
            engines: vec![engine],
        }
    }

    /// Depth of the fork stack; the root engine is depth 0.
    pub fn depth(&self) -> usize {
        self.engines.len().saturating_sub(1)
    }

    pub fn current(&self) -> Option<&ScriptEngine> {
        self.engines.last()
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        loop {
            let prompt = format!("fork[{}]> ", self.depth());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    if !self.handle_line(trimmed) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }

    /// Processes one line. Returns `false` when the session should end.
    pub fn handle_line(&mut self, line: &str) -> bool {
        let Some(command) = parse_command(line) else {
            self.execute(line);
            return true;
        };
        match command {
            Command::Quit => return false,
            Command::Vars => {
                if let Some(engine) = self.current() {
                    match serde_json::to_string_pretty(&engine.variables().to_json()) {
                        Ok(json) => println!("{json}"),
                        Err(err) => eprintln!("error: {err}"),
                    }
                }
            }
            Command::Types => {
                if let Some(engine) = self.current() {
                    for (name, tag) in engine.namespace().entries() {
                        println!("{name}: {tag}");
                    }
                }
            }
            Command::Fork => {
                if let Some(fork) = self.current().map(ScriptEngine::duplicate) {
                    self.engines.push(fork);
                }
            }
            Command::Drop => {
                if self.engines.len() > 1 {
                    self.engines.pop();
                } else {
                    eprintln!("error: already at the root engine");
                }
            }
            Command::Unknown(name) => eprintln!("error: unknown command `:{name}`"),
        }
        true
    }

    fn execute(&mut self, line: &str) {
        let Some(engine) = self.engines.last_mut() else {
            return;
        };
        if let Err(err) = engine.execute(line) {
            report(&err);
        }
    }
}

fn report(err: &ScriptError) {
    match err {
        ScriptError::Syntax(diag) | ScriptError::Runtime(diag) => {
            eprintln!("{:?}: {}", diag.kind, diag.message);
            for note in &diag.notes {
                eprintln!("  note: {note}");
            }
        }
        other => eprintln!("{:?}: {other}", other.kind()),
    }
}

fn readline_error(err: ReadlineError) -> ScriptError {
    ScriptError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
