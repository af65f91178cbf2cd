//! Interactive input
//!
//! Prompts go to stderr so stdout stays free for `hermes alias` output.

use anyhow::{anyhow, bail, Context, Result};
use std::io::{self, BufRead, Write};

/// Source of interactive answers
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Ask for an access token for `remote`
    fn token(&self, remote: &str) -> Result<String>;

    /// Ask the user to pick one of `options`, returning its index
    fn select(&self, message: &str, options: &[String]) -> Result<usize>;
}

/// Prompter backed by the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn token(&self, remote: &str) -> Result<String> {
        let token = rpassword::prompt_password(format!("Access token for {}: ", remote))
            .context("Failed to read token")?;

        let token = token.trim().to_string();
        if token.is_empty() {
            bail!("No token entered for {}", remote);
        }
        Ok(token)
    }

    fn select(&self, message: &str, options: &[String]) -> Result<usize> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        read_selection(&mut input, &mut io::stderr(), message, options)
    }
}

/// Print a numbered menu and read a 1-based choice, asking again on bad input
pub(crate) fn read_selection<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
    options: &[String],
) -> Result<usize> {
    if options.is_empty() {
        bail!("Nothing to choose from");
    }

    writeln!(output, "{}", message)?;
    for (i, option) in options.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, option)?;
    }

    loop {
        write!(output, "Select [1-{}]: ", options.len())?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(anyhow!("Input closed before a choice was made"));
        }

        match line.trim().parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
            _ => writeln!(output, "Invalid choice: {}", line.trim())?,
        }
    }
}
