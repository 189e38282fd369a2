// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Query loader for the plain-text query format.
//!
//! This module turns whitespace-delimited text streams into a validated
//! `InputQuery`. The format is deliberately flat: a header with the problem
//! dimensions, the input and output variable lists, one bound pair per
//! variable, then the equations and ReLU constraints.
//!
//! ```raw
//! num_variables num_equations num_relus num_inputs num_outputs
//! input_1 ... input_|inputs|
//! output_1 ... output_|outputs|
//! lower_1 upper_1            (one line per variable, `inf` / `-inf` accepted)
//! ...
//! k scalar c_1 v_1 ... c_k v_k   (one line per equation)
//! ...
//! b f                        (one line per ReLU, `f = max(0, b)`)
//! ```
//!
//! Line breaks carry no meaning; only the token order matters. Comments start
//! with `#` and run to the end of the line. Every variable reference is checked
//! against `num_variables`, and errors name the offending token or index.

use crate::{
    equation::Equation,
    index::VariableIndex,
    query::{InputQuery, QueryBuilder},
};
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
    str::FromStr,
};

/// The error type for the query loading process.
#[derive(Debug, thiserror::Error)]
pub enum QueryLoaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("could not parse token '{token}' as {type_name} while reading {context}")]
    Parse {
        token: String,
        type_name: &'static str,
        context: &'static str,
    },

    #[error("variable index {index} is out of range for a query with {num_variables} variables")]
    VariableOutOfRange { index: usize, num_variables: usize },

    #[error("invalid bounds for variable {index}: [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
}

/// A loader for queries in the plain-text format described in the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLoader {
    validate_bounds: bool,
}

impl Default for QueryLoader {
    fn default() -> Self {
        Self {
            validate_bounds: true,
        }
    }
}

impl QueryLoader {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures whether `lower > upper` or `NaN` bounds are rejected.
    #[inline]
    pub fn validate_bounds(mut self, yes: bool) -> Self {
        self.validate_bounds = yes;
        self
    }

    /// Loads a query from a type implementing `BufRead`.
    pub fn from_bufread<R: BufRead>(&self, rdr: R) -> Result<InputQuery, QueryLoaderError> {
        let mut sc = Scanner::new(rdr);

        let num_variables: usize = sc.next("header")?;
        let num_equations: usize = sc.next("header")?;
        let num_relus: usize = sc.next("header")?;
        let num_inputs: usize = sc.next("header")?;
        let num_outputs: usize = sc.next("header")?;

        let mut builder = QueryBuilder::new(num_variables);
        let variable = |raw: usize| -> Result<VariableIndex, QueryLoaderError> {
            if raw < num_variables {
                Ok(VariableIndex::new(raw))
            } else {
                Err(QueryLoaderError::VariableOutOfRange {
                    index: raw,
                    num_variables,
                })
            }
        };

        for _ in 0..num_inputs {
            let v = variable(sc.next("input variables")?)?;
            builder.mark_input(v);
        }

        for _ in 0..num_outputs {
            let v = variable(sc.next("output variables")?)?;
            builder.mark_output(v);
        }

        for index in 0..num_variables {
            let lower: f64 = sc.next("bounds")?;
            let upper: f64 = sc.next("bounds")?;
            if self.validate_bounds && (lower.is_nan() || upper.is_nan() || lower > upper) {
                return Err(QueryLoaderError::InvalidBounds {
                    index,
                    lower,
                    upper,
                });
            }
            builder.set_bounds(VariableIndex::new(index), lower, upper);
        }

        for _ in 0..num_equations {
            let num_addends: usize = sc.next("equations")?;
            let scalar: f64 = sc.next("equations")?;
            let mut equation = Equation::new(scalar);
            for _ in 0..num_addends {
                let coefficient: f64 = sc.next("equations")?;
                let v = variable(sc.next("equations")?)?;
                equation.add_addend(coefficient, v);
            }
            builder.add_equation(equation);
        }

        for _ in 0..num_relus {
            let b = variable(sc.next("relus")?)?;
            let f = variable(sc.next("relus")?)?;
            builder.add_relu(b, f);
        }

        Ok(builder.build())
    }

    /// Loads a query from a file path.
    #[inline]
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<InputQuery, QueryLoaderError> {
        let file = File::open(path)?;
        self.from_bufread(BufReader::new(file))
    }

    /// Loads a query from a generic reader.
    #[inline]
    pub fn from_reader<R: Read>(&self, r: R) -> Result<InputQuery, QueryLoaderError> {
        self.from_bufread(BufReader::new(r))
    }

    /// Loads a query from a string slice.
    #[inline]
    pub fn from_str(&self, s: &str) -> Result<InputQuery, QueryLoaderError> {
        self.from_reader(s.as_bytes())
    }
}

/// Reads whitespace-delimited tokens from a reader, skipping `#` comments.
struct Scanner<R> {
    rdr: R,
    buf: String,
    pos: usize,
}

impl<R: BufRead> Scanner<R> {
    #[inline]
    fn new(rdr: R) -> Self {
        Self {
            rdr,
            buf: String::new(),
            pos: 0,
        }
    }

    /// Refills the line buffer. Returns `Ok(false)` on end of input.
    #[inline]
    fn fill_line(&mut self) -> Result<bool, QueryLoaderError> {
        self.buf.clear();
        self.pos = 0;
        let n = self.rdr.read_line(&mut self.buf)?;
        Ok(n > 0)
    }

    /// Returns the next raw token, or `None` at end of input.
    fn next_token(&mut self) -> Result<Option<&str>, QueryLoaderError> {
        loop {
            if self.pos >= self.buf.len() && !self.fill_line()? {
                return Ok(None);
            }

            let rest = &self.buf[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.pos = self.buf.len();
                continue;
            }

            let len = trimmed
                .find(|c: char| c.is_whitespace() || c == '#')
                .unwrap_or(trimmed.len());
            let start = self.pos;
            self.pos += len;
            return Ok(Some(&self.buf[start..start + len]));
        }
    }

    /// Reads the next token and parses it into `T`.
    fn next<T>(&mut self, context: &'static str) -> Result<T, QueryLoaderError>
    where
        T: FromStr,
    {
        let token = self
            .next_token()?
            .ok_or(QueryLoaderError::UnexpectedEof(context))?;
        token.parse::<T>().map_err(|_| QueryLoaderError::Parse {
            token: token.to_owned(),
            type_name: std::any::type_name::<T>(),
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_core::float::Tolerance;

    const SMALL_QUERY: &str = r#"
        # x0 input, x1 = 2 x0, x2 = relu(x1) output
        3 1 1 1 1
        0           # inputs
        2           # outputs
        -1 1
        -inf inf
        0 inf
        2 0  2 0  -1 1
        1 2
    "#;

    fn x(i: usize) -> VariableIndex {
        VariableIndex::new(i)
    }

    #[test]
    fn test_loads_and_maps_correctly() {
        let query = QueryLoader::new()
            .from_str(SMALL_QUERY)
            .expect("failed to load");

        assert_eq!(query.num_variables(), 3);
        assert_eq!(query.input_variables(), &[x(0)]);
        assert_eq!(query.output_variables(), &[x(2)]);
        assert_eq!(query.lower_bound(x(0)), -1.0);
        assert_eq!(query.upper_bound(x(1)), f64::INFINITY);
        assert_eq!(query.lower_bound(x(1)), f64::NEG_INFINITY);

        let eq = &query.equations()[0];
        assert_eq!(eq.coefficient_of(x(0)), 2.0);
        assert_eq!(eq.coefficient_of(x(1)), -1.0);
        assert_eq!(eq.scalar(), 0.0);

        assert_eq!(query.relus()[0].b(), x(1));
        assert_eq!(query.relus()[0].f(), x(2));
        assert!(query.is_satisfied_by(&[0.5, 1.0, 1.0], &Tolerance::default()));
    }

    #[test]
    fn test_parse_error_names_token() {
        let res = QueryLoader::new().from_str("2 0 0 0 0  0 garbage  0 1");
        match res {
            Err(QueryLoaderError::Parse {
                token,
                type_name,
                context,
            }) => {
                assert_eq!(token, "garbage");
                assert!(type_name.contains("f64"));
                assert_eq!(context, "bounds");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_eof() {
        let res = QueryLoader::new().from_str("2 1 0 0 0  0 1  0 1");
        assert!(matches!(res, Err(QueryLoaderError::UnexpectedEof("equations"))));
    }

    #[test]
    fn test_variable_out_of_range() {
        let res = QueryLoader::new().from_str("2 0 1 0 0  0 1  0 1  0 7");
        assert!(matches!(
            res,
            Err(QueryLoaderError::VariableOutOfRange {
                index: 7,
                num_variables: 2
            })
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected_unless_disabled() {
        let data = "1 0 0 0 0  3 1";
        assert!(matches!(
            QueryLoader::new().from_str(data),
            Err(QueryLoaderError::InvalidBounds { index: 0, .. })
        ));

        let query = QueryLoader::new()
            .validate_bounds(false)
            .from_str(data)
            .expect("validation disabled");
        assert_eq!(query.lower_bound(x(0)), 3.0);
    }

    #[test]
    fn test_comment_directly_after_token() {
        let query = QueryLoader::new()
            .from_str("1 0 0 0 0#header\n-2#lb\n2")
            .expect("failed to load");
        assert_eq!(query.lower_bound(x(0)), -2.0);
        assert_eq!(query.upper_bound(x(0)), 2.0);
    }
}
