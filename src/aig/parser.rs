use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::{Aig, Lit, Result, aig::error::ParserError};

fn read_u32(s: &str) -> std::result::Result<u32, ParserError> {
    s.parse::<u32>()
        .map_err(|_| ParserError::InvalidToken(s.to_string() + " expected u32"))
}

fn check_even(x: u32) -> Result<()> {
    if x & 1 == 1 {
        return Err(ParserError::InvalidToken(
            "expected literal to be even, got ".to_string() + &x.to_string(),
        )
        .into());
    }
    Ok(())
}

fn check_not_const(x: u32) -> Result<()> {
    if x <= 1 {
        return Err(ParserError::InvalidToken(
            "literal ".to_string() + &x.to_string() + " would redefine the constant node",
        )
        .into());
    }
    Ok(())
}

/// Reads one line, erroring on EOF (for the counted sections of the file).
fn next_line(reader: &mut impl BufRead, line: &mut String) -> Result<()> {
    line.clear();
    let n = reader
        .read_line(line)
        .map_err(|e| ParserError::IoError(e.to_string()))?;
    if n == 0 {
        return Err(ParserError::InvalidToken("unexpected end of file".to_string()).into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    m: u32,
    i: u32,
    o: u32,
    a: u32,
}

impl TryFrom<&str> for Header {
    type Error = ParserError;

    fn try_from(line: &str) -> std::result::Result<Self, Self::Error> {
        let tokens = line.trim().split_whitespace().collect::<Vec<&str>>();

        if tokens.len() < 6 {
            return Err(ParserError::InvalidToken(
                "missing header tokens".to_string(),
            ));
        }

        if tokens[0] != "aag" && tokens[0] != "aig" {
            return Err(ParserError::InvalidToken(
                "expected aag (or at least aig)".to_string(),
            ));
        }

        let m = read_u32(tokens[1])?;
        let i = read_u32(tokens[2])?;
        let l = read_u32(tokens[3])?;
        let o = read_u32(tokens[4])?;
        let a = read_u32(tokens[5])?;

        if tokens.len() > 6 {
            return Err(ParserError::UnsupportedFeature(
                "header only supports M I L O A".to_string(),
            ));
        }

        if l != 0 {
            return Err(ParserError::UnsupportedFeature(
                "sequential circuits (latches)".to_string(),
            ));
        }

        if i as u64 + a as u64 > m as u64 {
            return Err(ParserError::InvalidToken(
                "number of variables is too small".to_string(),
            ));
        }

        Ok(Header { m, i, o, a })
    }
}

/// Reads a line holding exactly one literal.
fn read_lit(line: &str) -> Result<u32> {
    let tokens = line.trim().split_whitespace().collect::<Vec<&str>>();

    if tokens.is_empty() {
        return Err(ParserError::InvalidToken("expected a literal, got nothing".to_string()).into());
    }

    if tokens.len() > 1 {
        return Err(ParserError::InvalidToken(
            "expected nothing after literal, got ".to_string() + tokens[1],
        )
        .into());
    }

    read_u32(tokens[0]).map_err(Into::into)
}

/// Reads an AND definition line: `lhs fanin0 fanin1`.
fn read_and(line: &str) -> Result<(u32, u32, u32)> {
    let tokens = line.trim().split_whitespace().collect::<Vec<&str>>();

    if tokens.len() < 3 {
        return Err(ParserError::InvalidToken("not enough and tokens".to_string()).into());
    }

    if tokens.len() > 3 {
        return Err(ParserError::InvalidToken(
            "expected nothing after and tokens, got ".to_string() + tokens[3],
        )
        .into());
    }

    let lhs = read_u32(tokens[0])?;
    let fanin0 = read_u32(tokens[1])?;
    let fanin1 = read_u32(tokens[2])?;
    check_not_const(lhs)?;
    check_even(lhs)?;
    Ok((lhs, fanin0, fanin1))
}

/// Reads the optional symbol table (`i<idx> name` / `o<idx> name` lines),
/// stopping at the `c` comment marker or EOF.
fn read_symbols(aig: &mut Aig, reader: &mut impl BufRead) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| ParserError::IoError(e.to_string()))?;
        if n == 0 || line.trim_end() == "c" {
            return Ok(());
        }
        let body = line.trim_end_matches(['\n', '\r']);
        let (idx_str, name) = body
            .get(1..)
            .and_then(|rest| rest.split_once(' '))
            .ok_or_else(|| ParserError::InvalidToken("malformed symbol line".to_string()))?;
        if name.is_empty() {
            return Err(ParserError::InvalidToken("empty symbol name".to_string()).into());
        }
        let idx = read_u32(idx_str)? as usize;
        let id = match body.as_bytes()[0] {
            b'i' => aig.inputs.get(idx).copied(),
            b'o' => aig.outputs.get(idx).copied(),
            _ => {
                return Err(ParserError::InvalidToken(
                    "expected symbol line to start with i or o".to_string(),
                )
                .into());
            }
        }
        .ok_or_else(|| ParserError::InvalidToken("symbol index out of range".to_string()))?;
        aig.set_symbol(id, name.to_string())?;
    }
}

impl Aig {
    /// Creates an AIG from an ASCII AIGER (.aag) stream.
    ///
    /// Malformed input is rejected before the graph escapes this function:
    /// latches, odd PI/AND literals, redefinitions and literals past `2M+1`
    /// all error out. Fanins naming a variable that is never defined become
    /// [`Undef`](crate::NodeKind::Undef) placeholders, reported afterwards by
    /// [`Aig::floating`].
    pub fn from_ascii(mut reader: impl BufRead) -> Result<Self> {
        let mut line = String::new();

        next_line(&mut reader, &mut line)?;
        let header = Header::try_from(line.as_str())?;

        let mut aig = Aig::new(header.m);

        for _ in 0..header.i {
            next_line(&mut reader, &mut line)?;
            let lit = read_lit(&line)?;
            check_not_const(lit)?;
            check_even(lit)?;
            aig.add_input(lit >> 1)?;
        }

        for _ in 0..header.o {
            next_line(&mut reader, &mut line)?;
            let lit = read_lit(&line)?;
            aig.add_output(Lit::from_raw(lit))?;
        }

        for _ in 0..header.a {
            next_line(&mut reader, &mut line)?;
            let (lhs, fanin0, fanin1) = read_and(&line)?;
            aig.add_and(lhs >> 1, Lit::from_raw(fanin0), Lit::from_raw(fanin1))?;
        }

        read_symbols(&mut aig, &mut reader)?;

        aig.update_cone();
        aig.classify();
        Ok(aig)
    }

    /// Creates an AIG from an .aag file (ASCII AIGER format only).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref()).map_err(|e| ParserError::IoError(e.to_string()))?;
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("aag") => Aig::from_ascii(BufReader::new(f)),
            _ => Err(ParserError::IoError("invalid extension, expected .aag".to_string()).into()),
        }
    }

    /// Writes the network in ASCII AIGER format.
    ///
    /// Only the active cone is emitted, so the header's `A` is the cone
    /// length. `M` keeps its original value: ids are never renumbered, even
    /// after rewrites deleted nodes.
    pub fn write_ascii(&self, mut w: impl Write) -> io::Result<()> {
        writeln!(
            w,
            "aag {} {} 0 {} {}",
            self.max_var,
            self.inputs.len(),
            self.outputs.len(),
            self.cone.len()
        )?;
        for &i in &self.inputs {
            writeln!(w, "{}", Lit::new(i, false))?;
        }
        for lit in self.output_lits() {
            writeln!(w, "{}", lit)?;
        }
        for &id in &self.cone {
            if let Some(n) = self.node(id) {
                if let [f0, f1] = n.fanins() {
                    writeln!(w, "{} {} {}", Lit::new(id, false), f0, f1)?;
                }
            }
        }
        for (k, &i) in self.inputs.iter().enumerate() {
            if let Some(s) = self.node(i).and_then(|n| n.symbol()) {
                writeln!(w, "i{} {}", k, s)?;
            }
        }
        for (k, &o) in self.outputs.iter().enumerate() {
            if let Some(s) = self.node(o).and_then(|n| n.symbol()) {
                writeln!(w, "o{} {}", k, s)?;
            }
        }
        writeln!(w, "c")?;
        Ok(())
    }
}
