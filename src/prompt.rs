//! Interactive operator input
//!
//! Every read is a suspension point that gives up with
//! [`Error::Interrupted`] as soon as the run context is cancelled.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::context::RunContext;
use crate::error::{Error, Result};

pub struct Prompter {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    cancel: CancellationToken,
}

impl Prompter {
    /// Prompter reading from the process stdin.
    pub fn stdin(ctx: &RunContext) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), ctx)
    }

    pub fn new<R>(reader: R, ctx: &RunContext) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            reader: Box::new(reader),
            cancel: ctx.token(),
        }
    }

    /// Print `question` and wait for one line of input (trimmed).
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        print!("{}", question);
        io::stdout().flush()?;

        let mut line = String::new();
        let read = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Interrupted),
            read = self.reader.read_line(&mut line) => read?,
        };

        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            )));
        }

        Ok(line.trim().to_string())
    }

    /// Two-step verification password. Input is not masked.
    pub async fn ask_password(&mut self, question: &str) -> Result<String> {
        self.ask(question).await
    }

    pub async fn ask_int(&mut self, question: &str, name: &str) -> Result<i64> {
        let answer = self.ask(question).await?;
        parse_int(&answer, name)
    }

    /// Ask for a 1-based choice among `count` items; returns a 0-based index.
    pub async fn choose(&mut self, question: &str, count: usize) -> Result<usize> {
        let num = self.ask_int(question, "choice").await?;
        choice_index(num, count)
    }

    /// Keep asking until the operator answers yes or no.
    pub async fn confirm(&mut self, question: &str) -> Result<bool> {
        loop {
            let answer = self.ask(question).await?.to_lowercase();
            match answer.as_str() {
                "yes" | "y" => return Ok(true),
                "no" | "n" => return Ok(false),
                _ => println!("Please enter yes or no."),
            }
        }
    }
}

/// Print a boxed section title.
pub fn print_header(title: &str) {
    let bar = "=".repeat(title.chars().count());
    println!("\n");
    println!("=={}==", bar);
    println!("= {} =", title);
    println!("=={}==", bar);
}

/// Parse an integer argument, naming it in the error.
pub fn parse_int(value: &str, name: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Validation(format!("'{}' should be integer.", name)))
}

fn choice_index(num: i64, count: usize) -> Result<usize> {
    if num < 1 || num as u64 > count as u64 {
        return Err(Error::Validation(format!(
            "choice should be between 1 and {}, got {}",
            count, num
        )));
    }
    Ok(num as usize - 1)
}
