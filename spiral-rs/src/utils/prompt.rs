//! Interactive choice between ambiguous companion resources

use spiral_archive::{CompanionRole, Disambiguator, Selection};
use std::io::{self, BufRead, Write};

/// Disambiguator that asks the user on a line-oriented stream
///
/// A candidate is chosen by its number or its full name. Typing `exit` or
/// closing the input cancels; anything else asks again.
#[derive(Debug)]
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr, reading answers from stdin
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, role: CompanionRole, candidates: &[String]) -> io::Result<Selection> {
        writeln!(self.output, "Multiple {role} resources found:")?;
        for (i, candidate) in candidates.iter().enumerate() {
            writeln!(self.output, "  {}. {candidate}", i + 1)?;
        }

        loop {
            write!(self.output, "Select one (number or name, 'exit' to cancel): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Selection::Cancelled);
            }
            let answer = line.trim();

            if answer.eq_ignore_ascii_case("exit") {
                return Ok(Selection::Cancelled);
            }
            if let Ok(n) = answer.parse::<usize>()
                && (1..=candidates.len()).contains(&n)
            {
                return Ok(Selection::Selected(candidates[n - 1].clone()));
            }
            if let Some(name) = candidates.iter().find(|c| c.as_str() == answer) {
                return Ok(Selection::Selected(name.clone()));
            }
            writeln!(self.output, "'{answer}' is not one of the candidates")?;
        }
    }
}

impl<R: BufRead, W: Write> Disambiguator for Prompt<R, W> {
    fn choose(&mut self, role: CompanionRole, candidates: &[String]) -> Selection {
        self.ask(role, candidates).unwrap_or_else(|e| {
            log::warn!("Prompt failed, cancelling selection: {e}");
            Selection::Cancelled
        })
    }
}
