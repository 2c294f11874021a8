//! Statement builders. Every user-controlled value reaches the engine through
//! [`quote_identifier`] or [`quote_literal`]; nothing is concatenated raw.

use crate::FileFormat;

/// Wraps an identifier in double quotes, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Wraps a string literal in single quotes, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"catalog"."schema"."table"`
pub fn qualified_table(catalog: Option<&str>, schema: Option<&str>, table: &str) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(catalog) = catalog {
        parts.push(quote_identifier(catalog));
    }
    if let Some(schema) = schema {
        parts.push(quote_identifier(schema));
    }
    parts.push(quote_identifier(table));
    parts.join(".")
}

pub fn attach_statement(reference: &str, alias: &str, read_only: bool) -> String {
    let mut sql = format!(
        "ATTACH {} AS {}",
        quote_literal(reference),
        quote_identifier(alias)
    );
    if read_only {
        sql.push_str(" (READ_ONLY)");
    }
    sql
}

pub fn detach_statement(alias: &str) -> String {
    format!("DETACH {}", quote_identifier(alias))
}

/// Relation expression that reads a file in place.
pub fn file_relation(format: FileFormat, reference: &str) -> String {
    let path = quote_literal(reference);
    match format {
        FileFormat::Csv => format!("read_csv_auto({})", path),
        FileFormat::Tsv => format!("read_csv_auto({}, delim = '\\t')", path),
        FileFormat::Parquet => format!("read_parquet({})", path),
        FileFormat::Json => format!("read_json_auto({})", path),
    }
}

pub fn sheet_relation(reference: &str, sheet: &str) -> String {
    format!(
        "read_xlsx({}, sheet = {})",
        quote_literal(reference),
        quote_literal(sheet)
    )
}

/// Zero-row query: the engine reports column metadata without scanning data.
pub fn structure_statement(relation: &str) -> String {
    format!("SELECT * FROM {} LIMIT 0", relation)
}

pub fn count_statement(relation: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", relation)
}

pub fn select_preview_statement(relation: &str, limit: u32) -> String {
    format!("SELECT * FROM {} LIMIT {}", relation, limit)
}

pub fn drop_table_statement(schema: Option<&str>, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_table(None, schema, table))
}

const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "pg_catalog"];

pub fn list_schemas_statement(catalog: &str) -> String {
    let excluded: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| quote_literal(s)).collect();
    format!(
        "SELECT schema_name FROM information_schema.schemata \
         WHERE catalog_name = {} AND schema_name NOT IN ({}) ORDER BY schema_name",
        quote_literal(catalog),
        excluded.join(", ")
    )
}

pub fn list_tables_statement(catalog: &str, schema: &str) -> String {
    format!(
        "SELECT table_name, table_type FROM information_schema.tables \
         WHERE table_catalog = {} AND table_schema = {} ORDER BY table_name",
        quote_literal(catalog),
        quote_literal(schema)
    )
}

pub fn list_columns_statement(catalog: &str, schema: &str, table: &str) -> String {
    format!(
        "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
         WHERE table_catalog = {} AND table_schema = {} AND table_name = {} \
         ORDER BY ordinal_position",
        quote_literal(catalog),
        quote_literal(schema),
        quote_literal(table)
    )
}
