use crate::error::Error;
use regex::Regex;
use std::sync::OnceLock;

/// Table referenced by a DDL statement, schema is absent when unqualified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TableList {
    Single,
    /// Altered table plus the target of a `RENAME [TO|AS]` clause.
    Alter,
    Multiple,
    Renames,
}

struct StatementHead {
    pattern: Regex,
    list: TableList,
}

fn statement_heads() -> &'static [StatementHead] {
    static HEADS: OnceLock<Vec<StatementHead>> = OnceLock::new();

    HEADS.get_or_init(|| {
        [
            (
                r"(?i)^ALTER[[:space:]]+(?:ONLINE[[:space:]]+|IGNORE[[:space:]]+)*TABLE[[:space:]]+",
                TableList::Alter,
            ),
            (
                r"(?i)^CREATE[[:space:]]+(?:OR[[:space:]]+REPLACE[[:space:]]+)?(?:TEMPORARY[[:space:]]+)?TABLE[[:space:]]+(?:IF[[:space:]]+NOT[[:space:]]+EXISTS[[:space:]]+)?",
                TableList::Single,
            ),
            (
                r"(?i)^DROP[[:space:]]+(?:TEMPORARY[[:space:]]+)?TABLES?[[:space:]]+(?:IF[[:space:]]+EXISTS[[:space:]]+)?",
                TableList::Multiple,
            ),
            (
                r"(?i)^RENAME[[:space:]]+TABLES?[[:space:]]+",
                TableList::Renames,
            ),
            (
                r"(?i)^TRUNCATE[[:space:]]+(?:TABLE[[:space:]]+)?",
                TableList::Single,
            ),
        ]
        .into_iter()
        .filter_map(|(pattern, list)| {
            Regex::new(pattern)
                .ok()
                .map(|pattern| StatementHead { pattern, list })
        })
        .collect()
    })
}

/// Tables touched by each table DDL statement of a query event.
///
/// Statements other than `CREATE`, `ALTER`, `DROP`, `RENAME` and `TRUNCATE` of tables
/// produce no entry, a table statement that cannot be parsed produces an error entry.
pub fn parse_ddl(query: &str) -> Vec<Result<Vec<TableRef>, Error>> {
    split_statements(&strip_comments(query))
        .into_iter()
        .filter_map(|statement| {
            let head = statement_heads()
                .iter()
                .find_map(|head| Some((head.pattern.find(&statement)?.end(), head.list)));

            head.map(|(offset, list)| {
                parse_table_list(&statement[offset..], list)
                    .ok_or_else(|| Error::DdlParse(statement.clone()))
            })
        })
        .collect()
}

fn rename_clause() -> Option<&'static Regex> {
    static RENAME: OnceLock<Option<Regex>> = OnceLock::new();

    RENAME
        .get_or_init(|| Regex::new(r"(?i)(?:^|,)[[:space:]]*RENAME[[:space:]]+").ok())
        .as_ref()
}

/// New name given by the rename clause of an `ALTER TABLE`, column and index renames are skipped.
fn renamed_table(clauses: &str) -> Option<TableRef> {
    rename_clause()?.find_iter(clauses).find_map(|clause| {
        let target = &clauses[clause.end()..];
        let (word, _) = parse_identifier(target)?;

        if ["COLUMN", "INDEX", "KEY"]
            .iter()
            .any(|keyword| word.eq_ignore_ascii_case(keyword))
        {
            return None;
        }

        let target = expect_keyword(target, "TO")
            .or_else(|| expect_keyword(target, "AS"))
            .unwrap_or(target);

        parse_table_ref(target).map(|(table, _)| table)
    })
}

fn parse_table_list(input: &str, list: TableList) -> Option<Vec<TableRef>> {
    let (first, mut rest) = parse_table_ref(input)?;
    let mut tables = vec![first];

    if list == TableList::Alter {
        tables.extend(renamed_table(rest));
        return Some(tables);
    }

    loop {
        if list == TableList::Renames {
            rest = expect_keyword(rest, "TO")?;
            let (target, remaining) = parse_table_ref(rest)?;
            tables.push(target);
            rest = remaining;
        }

        if list == TableList::Single {
            return Some(tables);
        }

        match rest.trim_start().strip_prefix(',') {
            Some(remaining) => {
                let (table, remaining) = parse_table_ref(remaining)?;
                tables.push(table);
                rest = remaining;
            }
            None => return Some(tables),
        }
    }
}

fn expect_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let input = input.trim_start();
    let word = input.get(..keyword.len())?;
    let rest = &input[keyword.len()..];

    let boundary = rest
        .chars()
        .next()
        .map_or(true, |char| !(char.is_alphanumeric() || char == '_' || char == '$'));

    match word.eq_ignore_ascii_case(keyword) && boundary {
        true => Some(rest),
        false => None,
    }
}

fn parse_table_ref(input: &str) -> Option<(TableRef, &str)> {
    let (first, rest) = parse_identifier(input)?;

    match rest.strip_prefix('.') {
        Some(rest) => {
            let (table, rest) = parse_identifier(rest)?;
            Some((
                TableRef {
                    schema: Some(first),
                    table,
                },
                rest,
            ))
        }
        None => Some((
            TableRef {
                schema: None,
                table: first,
            },
            rest,
        )),
    }
}

fn parse_identifier(input: &str) -> Option<(String, &str)> {
    let input = input.trim_start();

    if let Some(quoted) = input.strip_prefix('`') {
        let mut identifier = String::new();
        let mut chars = quoted.char_indices().peekable();

        while let Some((index, char)) = chars.next() {
            if char != '`' {
                identifier.push(char);
                continue;
            }

            match chars.peek() {
                Some((_, '`')) => {
                    identifier.push('`');
                    chars.next();
                }
                _ => return Some((identifier, &quoted[index + 1..])),
            }
        }

        return None;
    }

    let end = input
        .find(|char: char| !(char.is_alphanumeric() || char == '_' || char == '$'))
        .unwrap_or(input.len());

    match end {
        0 => None,
        end => Some((input[..end].to_owned(), &input[end..])),
    }
}

fn strip_comments(query: &str) -> String {
    let mut result = String::with_capacity(query.len());
    let mut rest = query;

    while let Some(start) = rest.find("/*") {
        result.push_str(&rest[..start]);
        result.push(' ');
        rest = match rest[start + 2..].find("*/") {
            Some(end) => &rest[start + 2 + end + 2..],
            None => "",
        };
    }

    result.push_str(rest);

    result
        .lines()
        .map(|line| match line.find("-- ") {
            Some(start) => &line[..start],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_statements(query: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = query.chars().peekable();

    while let Some(char) = chars.next() {
        match (quote, char) {
            (None, ';') => {
                statements.push(std::mem::take(&mut current));
                continue;
            }
            (None, '\'' | '"' | '`') => quote = Some(char),
            (Some('\'' | '"'), '\\') => {
                current.push(char);
                current.extend(chars.next());
                continue;
            }
            (Some(open), _) if open == char => match chars.peek() {
                Some(next) if *next == open => {
                    current.push(char);
                    current.extend(chars.next());
                    continue;
                }
                _ => quote = None,
            },
            _ => {}
        }

        current.push(char);
    }

    statements.push(current);

    statements
        .into_iter()
        .map(|statement| statement.trim().to_owned())
        .filter(|statement| !statement.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(schema: Option<&str>, table: &str) -> TableRef {
        TableRef {
            schema: schema.map(Into::into),
            table: table.into(),
        }
    }

    fn parsed(query: &str) -> Vec<Vec<TableRef>> {
        parse_ddl(query)
            .into_iter()
            .map(|statement| statement.unwrap())
            .collect()
    }

    #[test]
    fn extracts_altered_table() {
        assert_eq!(
            parsed("ALTER TABLE users ADD COLUMN age INT"),
            vec![vec![table(None, "users")]]
        );
    }

    #[test]
    fn extracts_qualified_and_quoted_names() {
        assert_eq!(
            parsed("alter table `app`.`user``s` drop column age"),
            vec![vec![table(Some("app"), "user`s")]]
        );
    }

    #[test]
    fn extracts_created_table_with_modifiers() {
        assert_eq!(
            parsed("CREATE TEMPORARY TABLE IF NOT EXISTS app.tmp_orders (id INT)"),
            vec![vec![table(Some("app"), "tmp_orders")]]
        );
    }

    #[test]
    fn extracts_every_dropped_table() {
        assert_eq!(
            parsed("DROP TABLE IF EXISTS `orders`, app.items /* generated by server */"),
            vec![vec![table(None, "orders"), table(Some("app"), "items")]]
        );
    }

    #[test]
    fn extracts_both_sides_of_rename() {
        assert_eq!(
            parsed("RENAME TABLE users TO users_old, users_new TO app.users"),
            vec![vec![
                table(None, "users"),
                table(None, "users_old"),
                table(None, "users_new"),
                table(Some("app"), "users"),
            ]]
        );
    }

    #[test]
    fn extracts_new_name_of_table_renamed_by_alter() {
        assert_eq!(
            parsed("ALTER TABLE users RENAME TO users_old"),
            vec![vec![table(None, "users"), table(None, "users_old")]]
        );
        assert_eq!(
            parsed("ALTER TABLE app.users ADD COLUMN age INT, RENAME AS archive.users"),
            vec![vec![table(Some("app"), "users"), table(Some("archive"), "users")]]
        );
        assert_eq!(
            parsed("ALTER TABLE users RENAME tomorrow"),
            vec![vec![table(None, "users"), table(None, "tomorrow")]]
        );
    }

    #[test]
    fn ignores_column_and_index_renames() {
        assert_eq!(
            parsed("ALTER TABLE users RENAME COLUMN email TO mail, RENAME INDEX idx TO idx_mail"),
            vec![vec![table(None, "users")]]
        );
    }

    #[test]
    fn keeps_escaped_quotes_inside_string_literals() {
        assert_eq!(
            parsed("ALTER TABLE a COMMENT 'it\\'s'; ALTER TABLE users ADD c INT"),
            vec![vec![table(None, "a")], vec![table(None, "users")]]
        );
        assert_eq!(
            parsed("ALTER TABLE a COMMENT \"say \"\"hi\"\";\"; ALTER TABLE users ADD c INT"),
            vec![vec![table(None, "a")], vec![table(None, "users")]]
        );
    }

    #[test]
    fn extracts_truncated_table_with_optional_keyword() {
        assert_eq!(
            parsed("TRUNCATE TABLE users; TRUNCATE sessions"),
            vec![vec![table(None, "users")], vec![table(None, "sessions")]]
        );
    }

    #[test]
    fn ignores_non_table_statements() {
        assert!(parse_ddl("BEGIN").is_empty());
        assert!(parse_ddl("CREATE INDEX idx ON users (email)").is_empty());
        assert!(parse_ddl("INSERT INTO log VALUES ('a;b')").is_empty());
    }

    #[test]
    fn reports_table_statement_without_name() {
        let statements = parse_ddl("ALTER TABLE .users; ALTER TABLE users ENGINE=InnoDB");

        assert!(matches!(statements[0], Err(Error::DdlParse(_))));
        assert_eq!(
            statements[1].as_ref().unwrap(),
            &vec![table(None, "users")]
        );
    }
}
