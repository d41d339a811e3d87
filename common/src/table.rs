//! CSV表の読み込み
//!
//! 引用符で囲まれたフィールド（カンマ・改行・`""` を含む）に対応する。
//! 列名の検索は設定された候補名のうち最初に見つかったものを使う。

use crate::error::{Error, Result};
use std::path::Path;

/// 見出しのない列に付ける名前の接頭辞
pub const UNNAMED_PREFIX: &str = "Unnamed: ";

/// 見出し付きの表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// CSVファイルから読み込み
    pub fn from_csv(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_csv_str(&content))
    }

    /// CSV文字列から読み込み（1行目が見出し）
    ///
    /// データ行が見出しより多い列を持つ場合、足りない見出しは
    /// `Unnamed: N` で補う。
    pub fn from_csv_str(content: &str) -> Self {
        let mut records = split_records(content);
        if records.is_empty() {
            return Self::default();
        }
        let header_record = records.remove(0);
        let mut headers: Vec<String> = parse_csv_record(&header_record)
            .into_iter()
            .enumerate()
            .map(|(i, h)| if h.is_empty() { unnamed(i) } else { h })
            .collect();

        let rows: Vec<Vec<String>> = records.iter().map(|r| parse_csv_record(r)).collect();

        let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
        while headers.len() < widest {
            headers.push(unnamed(headers.len()));
        }

        Self { headers, rows }
    }

    /// 見出し行を読み飛ばし、指定した列名を使う
    ///
    /// 見出しの列数がデータと合わないCSV（末尾の列名が欠けている等）の補正用。
    pub fn from_csv_str_with_names(content: &str, names: &[String]) -> Self {
        let rows = split_records(content)
            .iter()
            .skip(1)
            .map(|r| parse_csv_record(r))
            .collect();
        Self {
            headers: names.to_vec(),
            rows,
        }
    }

    /// 見出しと行から直接作成
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 候補名のうち最初に存在する列の位置（大文字小文字・前後空白は無視）
    pub fn column(&self, aliases: &[String]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let alias = alias.trim();
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    /// 必須列の位置。見つからなければ `MissingColumn`
    pub fn require_column(&self, field: &str, aliases: &[String]) -> Result<usize> {
        self.column(aliases).ok_or_else(|| Error::MissingColumn {
            field: field.to_string(),
            available: self.headers.join(", "),
        })
    }

    /// セル値（範囲外は空文字）、前後の空白を除去
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// 見出しのない列（`Unnamed: N`）のうち最初のもの
    pub fn first_unnamed_column(&self) -> Option<usize> {
        self.headers.iter().position(|h| h.starts_with(UNNAMED_PREFIX))
    }
}

fn unnamed(index: usize) -> String {
    format!("{}{}", UNNAMED_PREFIX, index)
}

/// レコード単位に分割（引用符内の改行はレコード区切りにしない）
fn split_records(content: &str) -> Vec<String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in content.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\n' if !in_quotes => {
                push_record(&mut records, &mut current);
            }
            _ => current.push(c),
        }
    }
    push_record(&mut records, &mut current);

    records
}

fn push_record(records: &mut Vec<String>, current: &mut String) {
    let record = current.trim_end_matches('\r');
    if !record.trim().is_empty() {
        records.push(record.to_string());
    }
    current.clear();
}

/// 1レコードをフィールドに分割
fn parse_csv_record(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                // エスケープされた引用符
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_quoted_fields() {
        let fields = parse_csv_record(r#"1,"Gray, Jessica","say ""hi""",x"#);
        assert_eq!(fields, vec!["1", "Gray, Jessica", r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_multiline_quoted_field() {
        let csv = "Student,Dietary\n\"Jessica Gray\",\"Nuts\nDairy\"\nBob Bell,None\n";
        let table = Table::from_csv_str(csv);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), "Nuts\nDairy");
        assert_eq!(table.cell(1, 0), "Bob Bell");
    }

    #[test]
    fn test_missing_headers_padded() {
        let csv = "Email,Student\r\na@x,Jessica Gray,Submitted,Strong swimmer\r\n";
        let table = Table::from_csv_str(csv);
        assert_eq!(table.headers().to_vec(), names(&["Email", "Student", "Unnamed: 2", "Unnamed: 3"]));
        assert_eq!(table.first_unnamed_column(), Some(2));
    }

    #[test]
    fn test_with_names_skips_header() {
        let csv = "Email,Student\na@x,Jessica Gray,Strong swimmer\n";
        let table = Table::from_csv_str_with_names(csv, &names(&["Email", "Student", "Ability"]));
        assert_eq!(table.len(), 1);
        let col = table.column(&names(&["ability"])).unwrap();
        assert_eq!(table.cell(0, col), "Strong swimmer");
    }

    #[test]
    fn test_column_aliases_first_present_wins() {
        let table = Table::from_rows(names(&["ID", "Legal Surname", "Surname"]), vec![]);
        assert_eq!(table.column(&names(&["Family name", "surname"])), Some(2));
        assert_eq!(table.column(&names(&["Legal Surname", "Surname"])), Some(1));
    }

    #[test]
    fn test_require_column_error() {
        let table = Table::from_rows(names(&["ID", "Given"]), vec![]);
        let err = table.require_column("surname", &names(&["Surname"])).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref field, .. } if field == "surname"));
    }

    #[test]
    fn test_cell_out_of_range_is_empty() {
        let table = Table::from_csv_str("A,B\n1\n");
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn test_bom_and_blank_lines() {
        let table = Table::from_csv_str("\u{feff}A,B\n\n1,2\n\n");
        assert_eq!(table.headers()[0], "A");
        assert_eq!(table.len(), 1);
    }
}
