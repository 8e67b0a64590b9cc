use anyhow::{anyhow, Result};
use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use lambda_engine::{
    codec::{encode, Document},
    engine::{self, Outcome},
    parser,
    prelude::*,
};
use tracing_subscriber::EnvFilter;
use util::repl;

fn build_report(e: Error) -> Report<Span> {
    use chumsky::error::SimpleReason;
    let report = Report::build(ReportKind::Error, (), e.span().start);
    match e.reason() {
        SimpleReason::Unexpected => {
            let found = e.found().map(String::as_str).unwrap_or("end of the input");
            let expected = e
                .expected()
                .map(|t| t.as_ref().map(String::as_str).unwrap_or("end of the input"))
                .collect::<Vec<_>>()
                .join(", ");
            let expected = if expected.is_empty() {
                "something else"
            } else {
                &expected
            };
            report
                .with_message(format!("Unexpected {found}, expected {expected}",))
                .with_label(
                    Label::new(e.span())
                        .with_message(format!("Unexpected {}", found.fg(Color::Red)))
                        .with_color(Color::Red),
                )
        }
        SimpleReason::Unclosed { span, delimiter } => report
            .with_message(format!("Unclosed delimiter {}", delimiter.fg(Color::Yellow)))
            .with_label(
                Label::new(span.clone())
                    .with_message(format!(
                        "Unclosed delimiter {}",
                        delimiter.fg(Color::Yellow)
                    ))
                    .with_color(Color::Yellow),
            )
            .with_label(
                Label::new(e.span())
                    .with_message(format!(
                        "Must be closed before this {}",
                        e.found()
                            .map(String::as_str)
                            .unwrap_or("end of the input")
                            .fg(Color::Red)
                    ))
                    .with_color(Color::Red),
            ),
        SimpleReason::Custom(msg) => report.with_message(msg).with_label(
            Label::new(e.span())
                .with_message(format!("{}", msg.fg(Color::Red)))
                .with_color(Color::Red),
        ),
    }
    .finish()
}

enum CommandError<'a> {
    /// Reported against the input with ariadne.
    Parse(&'a str, Vec<Error>),
    Other(anyhow::Error),
}
impl From<anyhow::Error> for CommandError<'_> {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Other(e)
    }
}
impl From<engine::EngineError> for CommandError<'_> {
    fn from(e: engine::EngineError) -> Self {
        CommandError::Other(e.into())
    }
}
type CommandResult<'a> = std::result::Result<(), CommandError<'a>>;

/// The caller side of the engine: it owns the current document and the history, the
/// engine itself keeps nothing between calls.
#[derive(Default)]
struct Repl {
    history: Vec<Document>,
}
impl Repl {
    fn current(&self) -> Result<&Document> {
        self.history
            .last()
            .ok_or_else(|| anyhow!("No current expression, enter one first"))
    }

    fn push(&mut self, document: Document) -> Result<()> {
        println!("{}", engine::render(&document)?);
        self.history.push(document);
        Ok(())
    }

    fn tokenize(input: &str) -> CommandResult {
        let tokens = parser::tokenize(input)
            .map_err(|e| CommandError::Parse(input, e.into_errors()))?
            .iter()
            .map(Spanned::value)
            .cloned()
            .collect::<Vec<_>>();
        println!("{tokens:?}");
        Ok(())
    }

    fn parse(input: &str) -> CommandResult {
        let term =
            parser::parse_term(input).map_err(|e| CommandError::Parse(input, e.into_errors()))?;
        println!("{}", encode(&term.readdress()).to_json_pretty());
        Ok(())
    }

    fn evaluate<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let statement = parser::parse_statement(input)
            .map_err(|e| CommandError::Parse(input, e.into_errors()))?;
        match engine::evaluate(&statement)? {
            Outcome::Expression(document) => self.push(document)?,
            Outcome::Substituted(document) | Outcome::Renamed(document) => {
                println!("{}", engine::render(&document)?)
            }
            Outcome::FreeVariables(names) => println!("{{{}}}", names.join(", ")),
        }
        Ok(())
    }

    fn step(&mut self, node_id: &str) -> Result<()> {
        let next = engine::step(self.current()?, node_id.trim())?;
        self.push(next)
    }

    fn fold(&mut self, node_id: &str) -> Result<()> {
        let next = engine::fold_arithmetic(self.current()?, node_id.trim())?;
        self.push(next)
    }

    fn show(&self) -> Result<()> {
        fn outline(document: &Document, depth: usize) {
            let label = document
                .value
                .as_deref()
                .or(document.var.as_deref())
                .unwrap_or_default();
            let beta = match document.beta {
                Some(lambda_engine::Beta::Yes) => " *",
                _ => "",
            };
            println!(
                "{:indent$}{} {} {label}{beta}",
                "",
                document.nodeid,
                document.kind,
                indent = depth * 2
            );
            for child in &document.children {
                outline(child, depth + 1);
            }
        }
        let document = self.current()?;
        println!("{}", engine::render(document)?);
        outline(document, 0);
        Ok(())
    }

    fn redexes(&self) -> Result<()> {
        for reducible in engine::reducible_nodes(self.current()?)? {
            println!("{} {}", reducible.nodeid, reducible.kind);
        }
        Ok(())
    }

    fn load(&mut self, json: &str) -> Result<()> {
        let document = engine::normalize(&Document::from_json(json)?)?;
        self.push(document)
    }

    fn back(&mut self) -> Result<()> {
        if self.history.len() > 1 {
            self.history.pop();
        }
        println!("{}", engine::render(self.current()?)?);
        Ok(())
    }

    fn show_help() {
        println!(
            "{}",
            r#"
statement           -- same as :evaluate statement
:evaluate   stmt    -- `e;` makes e current; `e[x = v];`, `fv[e];`, `alpha[e, x];` print results
:tokenize   stmt    -- show tokens
:parse      stmt    -- show the JSON document of an expression
:step       id      -- beta-reduce the application with this node id
:fold       id      -- fold the arithmetic below the operator with this node id
:redexes            -- list node ids accepted by :step and :fold
:show               -- show the current expression as a tree
:json               -- show the current JSON document on one line, as :load takes it
:load       json    -- make a JSON document current
:back               -- go back one step
:reset              -- forget everything
:help               -- show this message
        "#
            .trim()
        );
    }

    fn handle_repl_input<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let (cmd, input) = if let Some(stripped) = input.strip_prefix(':') {
            stripped
                .trim_start()
                .split_once(' ')
                .unwrap_or((stripped, ""))
        } else {
            ("", input)
        };
        match cmd {
            "to" | "tokenize" => Self::tokenize(input)?,
            "p" | "parse" => Self::parse(input)?,
            "" | "e" | "eval" | "evaluate" => self.evaluate(input)?,
            "s" | "step" => self.step(input)?,
            "f" | "fold" => self.fold(input)?,
            "r" | "redexes" => self.redexes()?,
            "show" => self.show()?,
            "j" | "json" => println!("{}", self.current()?.to_json()),
            "l" | "load" => self.load(input)?,
            "b" | "back" => self.back()?,
            "reset" => self.history.clear(),
            "h" | "help" => Self::show_help(),
            _ => {
                eprintln!("Unknown command {cmd}");
                Self::show_help();
            }
        }
        Ok(())
    }
}
impl repl::Repl for Repl {
    type Error = anyhow::Error;
    const HISTORY: Option<&'static str> = Some("/tmp/lambda-engine.history");
    const PROMPT: &'static str = "λ> ";
    fn evaluate(&mut self, input: String) -> Result<(), Self::Error> {
        match self.handle_repl_input(&input) {
            Ok(()) => {}
            Err(CommandError::Parse(input, es)) => {
                for e in es {
                    build_report(e).eprint(Source::from(input))?;
                }
            }
            Err(CommandError::Other(e)) => eprintln!("Error: {e}"),
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    println!("Hi, this is a stepwise lambda calculus REPL. :h to show help");
    println!();
    repl::start_repl(Repl::default())?;
    Ok(())
}
