//! SQL text helpers for the statements the loader issues itself.
//!
//! Caller-supplied queries are passed through untouched; only relation names,
//! file paths and literals that the loader splices into its own statements go
//! through here.

use std::path::Path;

use crate::error::LoaderError;
use crate::source::SourceFormat;

/// Quote an identifier for DuckDB, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Reject relation names that cannot be quoted into a statement.
pub fn validate_relation_name(name: &str) -> Result<(), LoaderError> {
    if name.trim().is_empty() {
        return Err(LoaderError::query("relation name must not be empty"));
    }
    if name.contains('\0') {
        return Err(LoaderError::query("relation name contains null bytes"));
    }
    Ok(())
}

/// `CREATE OR REPLACE TABLE <relation> AS SELECT * FROM <reader>(<file>)`.
pub fn materialize_statement(relation: &str, file: &Path, format: SourceFormat) -> String {
    let file = quote_literal(&file.to_string_lossy());
    let reader = match format {
        SourceFormat::Parquet => format!("read_parquet({file})"),
        SourceFormat::Csv => format!("read_csv_auto({file}, header = true)"),
    };
    format!(
        "CREATE OR REPLACE TABLE {} AS SELECT * FROM {}",
        quote_ident(relation),
        reader
    )
}

pub fn count_statement(relation: &str) -> String {
    format!("SELECT COUNT(*) AS count FROM {}", quote_ident(relation))
}

pub fn select_all_statement(relation: &str) -> String {
    format!("SELECT * FROM {}", quote_ident(relation))
}

pub fn select_year_statement(relation: &str, year_column: &str, year: i64) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        quote_ident(relation),
        quote_ident(year_column),
        year
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn quotes_identifiers_and_literals() {
        assert_eq!(quote_ident("data"), "\"data\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn builds_materialize_statement_per_format() {
        let file = PathBuf::from("/tmp/scratch/data.parquet");
        assert_eq!(
            materialize_statement("t", &file, SourceFormat::Parquet),
            "CREATE OR REPLACE TABLE \"t\" AS SELECT * FROM read_parquet('/tmp/scratch/data.parquet')"
        );
        let file = PathBuf::from("/tmp/scratch/data.csv");
        assert_eq!(
            materialize_statement("t", &file, SourceFormat::Csv),
            "CREATE OR REPLACE TABLE \"t\" AS SELECT * FROM read_csv_auto('/tmp/scratch/data.csv', header = true)"
        );
    }

    #[test]
    fn year_projection_quotes_column() {
        assert_eq!(
            select_year_statement("data", "year_int", 2021),
            "SELECT * FROM \"data\" WHERE \"year_int\" = 2021"
        );
    }

    #[test]
    fn rejects_empty_relation_names() {
        assert!(validate_relation_name("").is_err());
        assert!(validate_relation_name("   ").is_err());
        assert!(validate_relation_name("data").is_ok());
    }
}
