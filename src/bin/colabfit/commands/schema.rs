use std::io::{self, Write};

use anyhow::{Context, Result};
use colabfit::{Schema, Table};

use crate::cli::SchemaArgs;

pub fn run_schema(args: SchemaArgs) -> Result<()> {
    let table = Table::from(args.table);
    let schema = resolve(table, args.stringified, args.metadata);

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{table}")
        .and_then(|()| write!(stdout, "{schema}"))
        .context("Failed to write schema")?;
    Ok(())
}

fn resolve(table: Table, stringified: bool, metadata: bool) -> Schema {
    let base = table.df_schema();
    let schema = if stringified { base.stringified() } else { base };
    if metadata { schema.with_metadata() } else { schema }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colabfit::schema::ColumnType;

    #[test]
    fn stringified_configurations_have_text_arrays() {
        let schema = resolve(Table::Configurations, true, false);
        let elements = schema.column("elements").unwrap();
        assert_eq!(elements.dtype, ColumnType::String);
        assert!(schema.column("metadata").is_none());
    }

    #[test]
    fn metadata_column_is_appended() {
        let schema = resolve(Table::PropertyObjects, false, true);
        assert!(schema.column("metadata").is_some());
        assert_eq!(schema.len(), Table::PropertyObjects.df_schema().len() + 1);
    }
}
