//! Interactive shell: plain lines are SQL, dot-commands work on the current relation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use hexlake_core::Loader;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::{execute_and_display, print_rows};

const HELP: &str = "\
.load <source>     load a Parquet or CSV file or URL into the current relation
.relation [name]   show or switch the current relation
.year <year>       rows of the current relation for one year
.count             row count of the current relation
.json [on|off]     toggle JSON output
.help              this text
.exit              leave the shell (also: exit, quit, Ctrl-D)
Anything else is run as SQL.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Sql(String),
    Load(String),
    Relation(Option<String>),
    Year(i64),
    Count,
    Json(Option<bool>),
    Help,
    Exit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim().trim_end_matches(';').trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Ok(Some(Command::Exit));
        }
        let Some(rest) = line.strip_prefix('.') else {
            return Ok(Some(Command::Sql(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };
        let command = match (name, arg) {
            ("load", Some(source)) => Command::Load(source.to_string()),
            ("load", None) => bail!(".load needs a source"),
            ("relation", arg) => Command::Relation(arg.map(str::to_string)),
            ("year", Some(year)) => Command::Year(
                year.parse()
                    .with_context(|| format!("not a year: {year}"))?,
            ),
            ("year", None) => bail!(".year needs a year"),
            ("count", None) => Command::Count,
            ("json", None) => Command::Json(None),
            ("json", Some("on")) => Command::Json(Some(true)),
            ("json", Some("off")) => Command::Json(Some(false)),
            ("help", _) => Command::Help,
            ("exit" | "quit", _) => Command::Exit,
            _ => bail!("unknown command .{name} (try .help)"),
        };
        Ok(Some(command))
    }
}

struct Shell<'a> {
    loader: &'a Loader,
    relation: String,
    json: bool,
}

impl Shell<'_> {
    fn prompt(&self) -> String {
        format!("hexlake({})> ", self.relation)
    }

    /// Run one command. Returns `false` when the shell should stop.
    async fn dispatch(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Sql(sql) => execute_and_display(self.loader, &sql, self.json).await?,
            Command::Load(source) => {
                let start = Instant::now();
                let rows = self
                    .loader
                    .load_url(&source, &self.relation)
                    .await
                    .with_context(|| format!("failed to load {source}"))?;
                println!(
                    "Loaded {rows} rows into \"{}\" in {:.3}s",
                    self.relation,
                    start.elapsed().as_secs_f64()
                );
            }
            Command::Relation(None) => println!("{}", self.relation),
            Command::Relation(Some(name)) => self.relation = name,
            Command::Year(year) => {
                let rows = self.loader.rows_for_year(year, &self.relation).await?;
                print_rows(&rows, self.json)?;
            }
            Command::Count => println!("{}", self.loader.row_count(&self.relation).await?),
            Command::Json(setting) => {
                self.json = setting.unwrap_or(!self.json);
                println!("JSON output {}", if self.json { "on" } else { "off" });
            }
            Command::Help => println!("{HELP}"),
            Command::Exit => return Ok(false),
        }
        Ok(true)
    }
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hexlake_history"))
}

pub(crate) async fn run(loader: &Loader, relation: String, json: bool, debug: bool) -> Result<()> {
    println!("hexlake shell. Type .help for commands.");

    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = history.as_ref().filter(|p| p.exists()) {
        let _ = editor.load_history(path);
    }

    let mut shell = Shell {
        loader,
        relation,
        json,
    };
    loop {
        let line = match editor.readline(&shell.prompt()) {
            Ok(line) => line,
            // Ctrl-C drops the current line only.
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("failed to read input"),
        };
        let _ = editor.add_history_entry(line.trim());

        let outcome = match Command::parse(&line) {
            Ok(Some(command)) => shell.dispatch(command).await,
            Ok(None) => continue,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) if debug => eprintln!("Error: {err:?}"),
            Err(err) => eprintln!("Error: {err:#}"),
        }
    }

    if let Some(path) = history {
        let _ = editor.save_history(&path);
    }
    Ok(())
}
