use crate::io::error::Error;
use crate::model::row::Row;
use crate::schema::Schema;
use std::io::Write;

/// Writes rows as JSON Lines, reshaping each to a fixed schema first.
pub struct RowWriter<W: Write> {
    writer: W,
    schema: Schema,
    written: usize,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W, schema: Schema) -> Self {
        Self {
            writer,
            schema,
            written: 0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn write_row(&mut self, row: &Row) -> Result<(), Error> {
        let projected = self.schema.project(row);
        serde_json::to_writer(&mut self.writer, &projected)?;
        writeln!(self.writer)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_all<'a, I>(&mut self, rows: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Number of rows written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, Error> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
