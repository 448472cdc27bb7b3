/// Cache key of a table, `schema.table`.
pub fn table_key<S, T>(schema: S, table: T) -> String
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    format!("{}.{}", schema.as_ref(), table.as_ref())
}

/// Quotes identifier for statements that cannot take placeholders, like `SHOW COLUMNS`.
pub fn quote_identifier(identifier: impl AsRef<str>) -> String {
    format!("`{}`", identifier.as_ref().replace('`', "``"))
}
