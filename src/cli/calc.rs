//! `trellis calc`: interactive addition or a one-shot expression

use std::io::{self, BufRead, Write};

use crate::error::{Result, TrellisError};
use crate::operations::calculator::{Calculator, Operator};

/// Entry point; `expression` is empty (interactive) or `A OP B`
pub fn execute(expression: Vec<String>) -> Result<()> {
    let mut calc = Calculator::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match expression.as_slice() {
        [] => run_interactive(&mut calc, io::stdin().lock(), &mut out)?,
        [a, op, b] => {
            evaluate(&mut calc, a, op, b)?;
            for entry in calc.history() {
                writeln!(out, "{}", entry)?;
            }
        }
        _ => {
            return Err(TrellisError::invalid_data(
                "expected `trellis calc` or `trellis calc <A> <OP> <B>`",
            ))
        }
    }
    Ok(())
}

fn parse_number(raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|_| TrellisError::invalid_data(format!("'{}' is not a number", raw)))
}

/// Evaluate `a op b`, recording it in the calculator history
pub fn evaluate(calc: &mut Calculator, a: &str, op: &str, b: &str) -> Result<f64> {
    let a = parse_number(a)?;
    let op: Operator = op.parse()?;
    let b = parse_number(b)?;
    calc.apply(op, a, b)
}

fn prompt_number<R: BufRead, W: Write>(
    label: &str,
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<f64>> {
    write!(out, "Enter the {} number: ", label)?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().parse().ok())
}

/// Prompt for two numbers and print their sum
pub fn run_interactive<R: BufRead, W: Write>(
    calc: &mut Calculator,
    mut input: R,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "Welcome to Simple Calculator!")?;
    writeln!(out, "{}", "=".repeat(50))?;

    let Some(a) = prompt_number("first", &mut input, out)? else {
        writeln!(out, "Error: Please enter valid numbers.")?;
        return Ok(());
    };
    let Some(b) = prompt_number("second", &mut input, out)? else {
        writeln!(out, "Error: Please enter valid numbers.")?;
        return Ok(());
    };

    let result = calc.add(a, b);
    writeln!(out)?;
    writeln!(out, "Result: {:?} + {:?} = {:?}", a, b, result)?;
    Ok(())
}
