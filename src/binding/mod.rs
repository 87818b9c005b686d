//! Named-placeholder handling: scanning `:name` binds, normalizing row values, and
//! rendering positional SQL for a backend.

use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::SqlToolkitError;
use crate::params::BindRow;
use crate::types::{PlaceholderStyle, RowValues};

mod parsers;
mod scanner;

use scanner::{Token, tokenize};

lazy_static! {
    static ref LEADING_KEYWORD: Regex = Regex::new("[A-Za-z]+").expect("static regex");
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Bind { name: String, expanding: bool },
}

/// SQL text with its named placeholders located.
///
/// The text always ends with exactly one `;`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    text: String,
    pieces: Vec<Piece>,
    placeholders: Vec<String>,
    expanding: BTreeSet<String>,
}

/// Positional SQL plus the parameters for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub params: Vec<RowValues>,
}

impl PreparedStatement {
    /// Scan `sql` for `:name` placeholders.
    #[must_use]
    pub fn parse(sql: &str) -> Self {
        let terminated = terminate(sql);
        let mut pieces: Vec<Piece> = Vec::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut expanding = BTreeSet::new();

        let push_text = |pieces: &mut Vec<Piece>, fragment: &str| match pieces.last_mut() {
            Some(Piece::Text(buf)) => buf.push_str(fragment),
            _ => pieces.push(Piece::Text(fragment.to_string())),
        };

        for token in tokenize(&terminated) {
            match token {
                Token::Code(range) | Token::Quoted(range) | Token::Comment(range) => {
                    push_text(&mut pieces, &terminated[range]);
                }
                Token::EscapedColon => push_text(&mut pieces, ":"),
                Token::Terminator => push_text(&mut pieces, ";"),
                Token::Bind {
                    name,
                    expanding: is_expanding,
                } => {
                    let name = terminated[name].to_string();
                    if is_expanding {
                        expanding.insert(name.clone());
                    }
                    if !placeholders.contains(&name) {
                        placeholders.push(name.clone());
                    }
                    pieces.push(Piece::Bind {
                        name,
                        expanding: is_expanding,
                    });
                }
            }
        }

        Self {
            text: display_text(&pieces),
            pieces,
            placeholders,
            expanding,
        }
    }

    /// Normalized SQL text, still carrying `:name` placeholders. Escaped colons appear
    /// unescaped.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names in first-appearance order.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    #[must_use]
    pub fn is_placeholder(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// True when `name` appears directly after `IN` and takes a sequence.
    #[must_use]
    pub fn is_expanding(&self, name: &str) -> bool {
        self.expanding.contains(name)
    }

    /// Replace placeholders with SQL fragments, e.g. `:created` with `NOW()`.
    pub fn inline_raw(&mut self, fragments: &[(String, String)]) {
        if fragments.is_empty() {
            return;
        }
        for piece in &mut self.pieces {
            if let Piece::Bind { name, .. } = piece
                && let Some((_, fragment)) = fragments.iter().find(|(key, _)| key == name)
            {
                *piece = Piece::Text(fragment.clone());
            }
        }
        self.placeholders
            .retain(|name| !fragments.iter().any(|(key, _)| key == name));
        self.expanding
            .retain(|name| !fragments.iter().any(|(key, _)| key == name));
        self.text = display_text(&self.pieces);
    }

    /// Apply value normalization to every non-empty row.
    pub fn normalize_rows(&self, rows: &mut [BindRow]) {
        for row in rows.iter_mut().filter(|row| !row.is_empty()) {
            self.normalize_row(row);
        }
    }

    /// Normalize the placeholder values present in `row`.
    ///
    /// Empty text becomes NULL, tagged values become their inner value, and lists or JSON
    /// containers become JSON text unless the placeholder is expanding.
    pub fn normalize_row(&self, row: &mut BindRow) {
        for name in &self.placeholders {
            let expanding = self.is_expanding(name);
            if let Some(value) = row.get_mut(name) {
                let current = std::mem::replace(value, RowValues::Null).into_inner();
                *value = match current {
                    RowValues::Text(text) if text.is_empty() => RowValues::Null,
                    composite if composite.is_composite() && !expanding => {
                        RowValues::Text(composite.to_json_text())
                    }
                    other => other,
                };
            }
        }
    }

    /// Render positional SQL for one row.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ParameterError` when a placeholder has no value in `row`.
    pub fn render(
        &self,
        row: &BindRow,
        style: PlaceholderStyle,
    ) -> Result<RenderedStatement, SqlToolkitError> {
        let mut sql = String::with_capacity(self.text.len() + 8);
        let mut params = Vec::new();
        let mut rendered: HashMap<&str, String> = HashMap::new();

        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => sql.push_str(text),
                Piece::Bind { name, expanding } => {
                    if let Some(done) = rendered.get(name.as_str()) {
                        sql.push_str(done);
                        continue;
                    }
                    let value = row.get(name).ok_or_else(|| {
                        SqlToolkitError::ParameterError(format!(
                            "no value bound for placeholder :{name}"
                        ))
                    })?;
                    let mut fragment = String::new();
                    if *expanding {
                        let items: Vec<RowValues> = match value.clone().into_inner() {
                            RowValues::List(items) => items,
                            RowValues::JSON(JsonValue::Array(items)) => {
                                items.into_iter().map(RowValues::from_json_element).collect()
                            }
                            scalar => vec![scalar],
                        };
                        if items.is_empty() {
                            fragment.push_str("(NULL)");
                        } else {
                            fragment.push('(');
                            for (i, item) in items.into_iter().enumerate() {
                                if i > 0 {
                                    fragment.push_str(", ");
                                }
                                params.push(item.into_inner());
                                style.push(&mut fragment, params.len());
                            }
                            fragment.push(')');
                        }
                    } else {
                        params.push(value.clone().into_inner());
                        style.push(&mut fragment, params.len());
                    }
                    sql.push_str(&fragment);
                    rendered.insert(name.as_str(), fragment);
                }
            }
        }

        Ok(RenderedStatement { sql, params })
    }
}

fn display_text(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|piece| match piece {
            Piece::Text(text) => text.clone(),
            Piece::Bind { name, .. } => format!(":{name}"),
        })
        .collect()
}

/// Trim trailing whitespace and terminators, then append exactly one `;`.
fn terminate(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    let mut text = String::with_capacity(trimmed.len() + 1);
    text.push_str(trimmed);
    text.push(';');
    text
}

/// Parse `sql` and normalize `rows` against its placeholders.
#[must_use]
pub fn normalize(sql: &str, mut rows: Vec<BindRow>) -> (PreparedStatement, Vec<BindRow>) {
    let statement = PreparedStatement::parse(sql);
    statement.normalize_rows(&mut rows);
    (statement, rows)
}

/// Upper-cased leading keyword of each statement in `sql`, skipping comments and literals.
#[must_use]
pub fn statement_kinds(sql: &str) -> Vec<String> {
    let mut kinds = Vec::new();
    let mut current: Option<String> = None;
    let mut has_content = false;

    for token in tokenize(sql) {
        match token {
            Token::Terminator => {
                if has_content {
                    kinds.push(current.take().unwrap_or_default());
                }
                current = None;
                has_content = false;
            }
            Token::Code(range) => {
                let code = &sql[range];
                if !code.trim().is_empty() {
                    has_content = true;
                }
                if current.is_none()
                    && let Some(word) = LEADING_KEYWORD.find(code)
                {
                    current = Some(word.as_str().to_ascii_uppercase());
                }
            }
            Token::Quoted(_) | Token::Bind { .. } | Token::EscapedColon => has_content = true,
            Token::Comment(_) => {}
        }
    }
    if has_content {
        kinds.push(current.unwrap_or_default());
    }
    kinds
}

/// True when `sql` holds more than one statement.
#[must_use]
pub fn is_multi_statement(sql: &str) -> bool {
    statement_kinds(sql).len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind_row;

    #[test]
    fn escaped_colon_is_not_a_bind() {
        let stmt = PreparedStatement::parse(r"SELECT '1' AS a WHERE b = 'x\:y' OR c = \:name");
        assert!(stmt.placeholders().is_empty());
        assert_eq!(stmt.text(), "SELECT '1' AS a WHERE b = 'x:y' OR c = :name;");
    }

    #[test]
    fn terminator_is_normalized_to_one() {
        assert_eq!(PreparedStatement::parse("SELECT 1 ;; \n").text(), "SELECT 1;");
        assert_eq!(PreparedStatement::parse("SELECT 1").text(), "SELECT 1;");
    }

    #[test]
    fn expanding_binds_keep_lists() {
        let (stmt, rows) = normalize(
            "SELECT * FROM t WHERE id IN :ids AND tags = :tags",
            vec![bind_row! { "ids" => vec![1_i64, 2], "tags" => vec!["a", "b"] }],
        );
        assert!(stmt.is_expanding("ids"));
        assert_eq!(rows[0].get("ids"), Some(&RowValues::from(vec![1_i64, 2])));
        assert_eq!(rows[0].get("tags"), Some(&RowValues::Text(r#"["a","b"]"#.into())));
    }

    #[test]
    fn normalization_is_idempotent() {
        let stmt = PreparedStatement::parse("INSERT INTO t VALUES (:a, :b, :c, :d)");
        let mut row = bind_row! {
            "a" => "",
            "b" => RowValues::tagged("Color::Red", 1_i64),
            "c" => serde_json::json!({"k": [1]}),
            "d" => "kept",
            "unused" => "",
        };
        stmt.normalize_row(&mut row);
        let once = row.clone();
        stmt.normalize_row(&mut row);
        assert_eq!(row, once);
        assert_eq!(row.get("a"), Some(&RowValues::Null));
        assert_eq!(row.get("b"), Some(&RowValues::Int(1)));
        assert_eq!(row.get("c"), Some(&RowValues::Text(r#"{"k":[1]}"#.into())));
        assert_eq!(row.get("unused"), Some(&RowValues::Text(String::new())));
    }

    #[test]
    fn renders_positional_sql() {
        let stmt = PreparedStatement::parse("SELECT :a, :b, :a WHERE x IN :xs");
        let row = bind_row! { "a" => 1_i64, "b" => "two", "xs" => vec![3_i64, 4] };
        let pg = stmt.render(&row, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(pg.sql, "SELECT $1, $2, $1 WHERE x IN ($3, $4);");
        assert_eq!(pg.params.len(), 4);
        let lite = stmt.render(&row, PlaceholderStyle::Sqlite).unwrap();
        assert_eq!(lite.sql, "SELECT ?1, ?2, ?1 WHERE x IN (?3, ?4);");
    }

    #[test]
    fn empty_expanding_list_renders_null() {
        let stmt = PreparedStatement::parse("DELETE FROM t WHERE id IN :ids");
        let rendered = stmt
            .render(&bind_row! { "ids" => Vec::<i64>::new() }, PlaceholderStyle::Sqlite)
            .unwrap();
        assert_eq!(rendered.sql, "DELETE FROM t WHERE id IN (NULL);");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn json_arrays_expand_like_lists() {
        let stmt = PreparedStatement::parse("SELECT * FROM t WHERE id IN :ids");
        let mut rows = vec![bind_row! { "ids" => serde_json::json!([1, 2.5, "x", null]) }];
        stmt.normalize_rows(&mut rows);
        let rendered = stmt.render(&rows[0], PlaceholderStyle::Postgres).unwrap();
        assert_eq!(rendered.sql, "SELECT * FROM t WHERE id IN ($1, $2, $3, $4);");
        assert_eq!(
            rendered.params,
            vec![
                RowValues::Int(1),
                RowValues::Float(2.5),
                RowValues::Text("x".into()),
                RowValues::Null,
            ]
        );
    }

    #[test]
    fn missing_value_is_a_parameter_error() {
        let stmt = PreparedStatement::parse("SELECT :a");
        let err = stmt.render(&BindRow::new(), PlaceholderStyle::Sqlite).unwrap_err();
        assert!(matches!(err, SqlToolkitError::ParameterError(_)));
    }

    #[test]
    fn raw_fragments_replace_placeholders() {
        let mut stmt = PreparedStatement::parse("UPDATE t SET at = :at WHERE id = :id");
        stmt.inline_raw(&[("at".into(), "CURRENT_TIMESTAMP".into())]);
        assert_eq!(stmt.text(), "UPDATE t SET at = CURRENT_TIMESTAMP WHERE id = :id;");
        assert_eq!(stmt.placeholders(), ["id".to_string()]);
    }

    #[test]
    fn statement_kinds_per_segment() {
        let sql = "-- leading\nselect 1; /* x */ insert into t values (';'); ;";
        assert_eq!(statement_kinds(sql), vec!["SELECT", "INSERT"]);
        assert!(is_multi_statement(sql));
        assert!(!is_multi_statement("SELECT 1;"));
    }
}
