use rustyline::{error::ReadlineError, Editor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error<E> {
    #[error(transparent)]
    Readline(ReadlineError),
    #[error("Command failed: {0:?}")]
    Command(E),
}

pub trait Repl {
    type Error: std::fmt::Debug;
    const HISTORY: Option<&'static str> = None;
    const PROMPT: &'static str = ">> ";
    fn evaluate(&mut self, input: String) -> Result<(), Self::Error>;
}

/// Reads lines until EOF or Ctrl-C. A line ending with `\` is joined with the next one.
pub fn start_repl<R: Repl>(mut repl: R) -> Result<(), Error<R::Error>> {
    let mut editor = Editor::<()>::new();
    if let Some(history) = R::HISTORY {
        if let Err(e) = editor.load_history(history) {
            tracing::debug!(history, "no history loaded: {e}");
        }
    }
    let mut pending: Option<String> = None;
    loop {
        let prompt = if pending.is_some() { ".. " } else { R::PROMPT };
        match editor.readline(prompt) {
            Ok(mut line) if line.ends_with('\\') => {
                line.pop();
                line.push('\n');
                match pending.as_mut() {
                    Some(pending) => pending.push_str(&line),
                    None => pending = Some(line),
                }
            }
            Ok(line) => {
                let input = match pending.take() {
                    Some(mut pending) => {
                        pending.push_str(&line);
                        pending
                    }
                    None => line,
                };
                if input.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(input.as_str());
                repl.evaluate(input).map_err(Error::Command)?;
                if let Some(history) = R::HISTORY {
                    editor.save_history(history).map_err(Error::Readline)?;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("Bye!");
                break Ok(());
            }
            Err(e) => break Err(Error::Readline(e)),
        }
    }
}
