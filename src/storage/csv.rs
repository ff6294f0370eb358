//! CSV text codec: the first record is the header, every following record is a row.

use std::{
    io::{Read, Write},
    iter::Peekable,
    str::Chars,
};

use crate::{
    error::{Error, Result},
    sql::types::Row,
    storage::table::Table,
};

/// Reads a whole CSV document into a table
pub fn load(mut reader: impl Read) -> Result<Table> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| Error::Load(format!("unable to read CSV data: {}", e)))?;

    let mut records = Records::new(&text);
    let columns = match records.next().transpose()? {
        Some(columns) => columns,
        None => return Err(Error::Load("CSV data has no header line".into())),
    };
    let rows = records.collect::<Result<Vec<_>>>()?;
    Table::new(columns, rows)
}

/// Writes the table as CSV, quoting fields where needed
pub fn save(table: &Table, mut writer: impl Write) -> Result<()> {
    let mut out = String::new();
    push_record(&mut out, table.columns());
    for row in table.snapshot()? {
        push_record(&mut out, &row);
    }
    writer
        .write_all(out.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| Error::Save(format!("unable to write CSV data: {}", e)))
}

fn push_record(out: &mut String, fields: &[String]) {
    // A lone empty field would otherwise be a blank line, which carries no record
    let lone_empty = matches!(fields, [field] if field.is_empty());
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if lone_empty || field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Iterator over the records of a CSV document
struct Records<'a> {
    iter: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Records<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            iter: text.chars().peekable(),
            line: 0,
        }
    }

    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes one line terminator (`\n`, `\r\n` or `\r`)
    fn end_of_line(&mut self) -> bool {
        if self.next_if(|c| c == '\r').is_some() {
            self.next_if(|c| c == '\n');
            return true;
        }
        self.next_if(|c| c == '\n').is_some()
    }

    fn scan_quoted(&mut self, field: &mut String) -> Result<()> {
        loop {
            match self.iter.next() {
                Some('"') if self.next_if(|c| c == '"').is_some() => field.push('"'),
                Some('"') => return Ok(()),
                Some(c) => field.push(c),
                None => {
                    return Err(Error::Load(format!(
                        "unterminated quoted field on line {}",
                        self.line
                    )));
                }
            }
        }
    }

    fn scan_record(&mut self) -> Result<Row> {
        let mut record = Vec::new();
        let mut field = String::new();
        loop {
            match self.iter.peek() {
                Some('"') if field.is_empty() => {
                    self.iter.next();
                    self.scan_quoted(&mut field)?;
                }
                Some(',') => {
                    self.iter.next();
                    record.push(std::mem::take(&mut field));
                }
                Some('\r') | Some('\n') | None => {
                    self.end_of_line();
                    record.push(field);
                    return Ok(record);
                }
                Some(_) => field.extend(self.iter.next()),
            }
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        // Blank lines carry no record
        while self.end_of_line() {
            self.line += 1;
        }
        self.iter.peek()?;
        self.line += 1;
        Some(self.scan_record())
    }
}

#[cfg(test)]
mod tests {
    use super::{load, save};
    use crate::error::{Error, Result};

    #[test]
    fn test_load() -> Result<()> {
        let data = "id,name,city\r\n1,Alice,Oxford\r\n2,\"Bob, Jr.\",\"say \"\"hi\"\"\"\r\n\r\n";
        let table = load(data.as_bytes())?;
        assert_eq!(table.columns(), ["id", "name", "city"]);
        assert_eq!(
            table.snapshot()?,
            vec![
                vec!["1", "Alice", "Oxford"],
                vec!["2", "Bob, Jr.", "say \"hi\""],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(load("".as_bytes()), Err(Error::Load(_))));
        assert!(matches!(load("a,b\n1\n".as_bytes()), Err(Error::Load(_))));
        assert!(matches!(load("a,b\n\"1,2\n".as_bytes()), Err(Error::Load(_))));
    }

    #[test]
    fn test_save_quotes_fields() -> Result<()> {
        let table = load("a,b\n\"x,y\",\"line\nbreak\"\nplain,\"q\"\"\"\n".as_bytes())?;
        let mut out = Vec::new();
        save(&table, &mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "a,b\n\"x,y\",\"line\nbreak\"\nplain,\"q\"\"\"\n"
        );
        Ok(())
    }

    #[test]
    fn test_single_column_empty_field_round_trip() -> Result<()> {
        let table = load("a\n\"\"\nx\n".as_bytes())?;
        assert_eq!(table.snapshot()?, vec![vec![""], vec!["x"]]);

        let mut out = Vec::new();
        save(&table, &mut out)?;
        let text = String::from_utf8(out)?;
        assert_eq!(text, "a\n\"\"\nx\n");

        let reloaded = load(text.as_bytes())?;
        assert_eq!(reloaded.snapshot()?, table.snapshot()?);
        Ok(())
    }
}
