//! 名簿の読み込み（CSV / Excel）

use crate::config::RosterColumns;
use crate::error::{Result, RosterMatchError};
use calamine::{open_workbook_auto, Data, Reader};
use roster_match_common::{RosterEntry, Table};
use std::path::Path;

/// 拡張子で形式を判定して名簿を読み込む
///
/// # Arguments
/// * `path` - 名簿ファイル（.csv / .xlsx / .xls / .xlsm / .ods）
/// * `columns` - 列名の候補
pub fn load_roster(path: &Path, columns: &RosterColumns) -> Result<Vec<RosterEntry>> {
    if !path.exists() {
        return Err(RosterMatchError::FileNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let table = match ext.as_str() {
        "xlsx" | "xls" | "xlsm" | "ods" => read_workbook(path)?,
        _ => Table::from_csv(path)?,
    };

    let roster = roster_from_table(&table, columns)?;
    log::info!("名簿: {}人 ({})", roster.len(), path.display());
    Ok(roster)
}

/// 先頭シートを表として読む（1行目が見出し）
fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| RosterMatchError::RosterLoad(format!("{}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RosterMatchError::RosterLoad(format!("シートがありません: {}", path.display())))?
        .map_err(|e| RosterMatchError::RosterLoad(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());

    let headers = rows.next().unwrap_or_default();
    Ok(Table::from_rows(headers, rows.collect()))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // 生徒IDが数値セルの場合に "12345.0" にしない
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// 表から名簿を作る
///
/// 生徒ID・姓・名の列は必須。それ以外の列は無ければ空欄とする。
/// 生徒IDが空の行は警告して読み飛ばす。
pub fn roster_from_table(table: &Table, columns: &RosterColumns) -> Result<Vec<RosterEntry>> {
    let id_col = table.require_column("student_id", &columns.student_id)?;
    let surname_col = table.require_column("surname", &columns.surname)?;
    let first_col = table.require_column("first_name", &columns.first_name)?;

    let preferred_col = table.column(&columns.preferred_name);
    let roll_col = table.column(&columns.roll_group);
    let year_col = table.column(&columns.year);
    let house_col = table.column(&columns.house);

    let optional = |row: usize, col: Option<usize>| col.map(|c| table.cell(row, c).to_string()).unwrap_or_default();

    let mut roster = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let student_id = table.cell(row, id_col);
        if student_id.is_empty() {
            log::warn!("名簿 {}行目: 生徒IDが空のため読み飛ばし", row + 2);
            continue;
        }

        let preferred = optional(row, preferred_col);
        roster.push(RosterEntry {
            student_id: student_id.to_string(),
            surname: table.cell(row, surname_col).to_string(),
            first_name: table.cell(row, first_col).to_string(),
            preferred_name: (!preferred.is_empty()).then_some(preferred),
            roll_group: optional(row, roll_col),
            year: optional(row, year_col),
            house: optional(row, house_col),
        });
    }

    Ok(roster)
}
