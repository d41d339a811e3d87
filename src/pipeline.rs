//! 一括照合の実行とレポート
//!
//! 名簿を読み込み、写真台帳・水泳能力表・食事制限表をそれぞれ照合する。
//! 補助表の列構成エラーはその入力元だけを中断し、他の入力元は続行する。

use crate::config::{AuxTableConfig, Config};
use crate::error::{Result, RosterMatchError};
use crate::matcher::{read_aux_table, MatchResult, RosterMatcher, SourceOutcome, SpatialMatcher};
use crate::normalizer::glyph::format_code_point;
use crate::normalizer::{normalize, GlyphLog, SwimLevel, ValueDomain};
use crate::photo::{CropSink, HandleSink, ImageSink};
use crate::roster::load_roster;
use indicatif::{ProgressBar, ProgressStyle};
use roster_match_common::{PhotoDocument, RosterEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 実行の入力
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub roster: PathBuf,
    /// 写真台帳（位置付きトークン・画像のJSON）
    pub photos: Option<PathBuf>,
    pub swimming: Option<PathBuf>,
    pub dietary: Option<PathBuf>,
    /// 切り出し画像の出力先（無ければ画素を保存しない）
    pub crop_dir: Option<PathBuf>,
    /// ページ進捗バーを表示するか
    pub show_progress: bool,
}

/// 実行結果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: String,
    pub roster: Vec<RosterEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<SourceOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swimming: Option<SourceOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary: Option<SourceOutcome>,
    /// 検出したPUA文字（U+XXXX）
    #[serde(default)]
    pub glyphs: Vec<String>,
}

/// 手動割当（入力元ごと）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualOverrides {
    pub photos: MatchResult,
    pub swimming: MatchResult,
    pub dietary: MatchResult,
}

impl ManualOverrides {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RosterMatchError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty() && self.swimming.is_empty() && self.dietary.is_empty()
    }
}

/// 生徒ごとの集約結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub name: String,
    pub roll_group: String,
    pub photo: Option<String>,
    pub swimming: Option<String>,
    pub swim_level: Option<String>,
    pub dietary: Option<String>,
}

impl RunReport {
    pub fn new(roster: Vec<RosterEntry>) -> Self {
        Self {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            roster,
            photos: None,
            swimming: None,
            dietary: None,
            glyphs: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RosterMatchError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// 手動割当を重ねる（元の自動照合結果は `manual` と区別して残る）
    pub fn apply_manual(&mut self, overrides: &ManualOverrides) {
        let sources = [
            (&mut self.photos, &overrides.photos),
            (&mut self.swimming, &overrides.swimming),
            (&mut self.dietary, &overrides.dietary),
        ];
        for (outcome, manual) in sources {
            if manual.is_empty() {
                continue;
            }
            outcome.get_or_insert_with(SourceOutcome::default).apply_manual(manual);
        }
    }

    /// 未照合レコードの総数
    pub fn unmatched_count(&self) -> usize {
        self.sources().map(|(_, o)| o.unmatched.len()).sum()
    }

    /// (名前, 結果) を写真・水泳・食事の順に
    pub fn sources(&self) -> impl Iterator<Item = (&'static str, &SourceOutcome)> {
        [
            ("photos", self.photos.as_ref()),
            (ValueDomain::Swimming.label(), self.swimming.as_ref()),
            (ValueDomain::Dietary.label(), self.dietary.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, outcome)| outcome.map(|o| (name, o)))
    }

    /// 名簿順の生徒ごとの集約
    pub fn students(&self) -> Vec<StudentSummary> {
        let project = |outcome: &Option<SourceOutcome>| outcome.as_ref().map(SourceOutcome::by_student).unwrap_or_default();
        let photos = project(&self.photos);
        let mut swimming = project(&self.swimming);
        let mut dietary = project(&self.dietary);

        self.roster
            .iter()
            .map(|entry| {
                let swim = swimming.remove(&entry.student_id);
                StudentSummary {
                    student_id: entry.student_id.clone(),
                    name: entry.display_name(),
                    roll_group: entry.roll_group.clone(),
                    photo: photos.get(&entry.student_id).cloned(),
                    swim_level: self
                        .swimming
                        .as_ref()
                        .map(|_| format!("{:?}", SwimLevel::classify(swim.as_deref().unwrap_or("")))),
                    swimming: swim,
                    dietary: dietary.remove(&entry.student_id),
                }
            })
            .collect()
    }
}

/// 全入力元を照合する
pub fn run(inputs: &RunInputs, config: &Config) -> Result<RunReport> {
    let roster = load_roster(&inputs.roster, &config.roster_columns)?;
    let mut report = RunReport::new(roster);
    let mut glyphs = GlyphLog::new();

    if let Some(path) = &inputs.photos {
        let outcome = reconcile_photos(&report.roster, path, inputs, config);
        glyphs.extend(&outcome.glyphs);
        report.photos = Some(outcome);
    }

    let aux = [
        (ValueDomain::Swimming, &inputs.swimming, &config.swimming),
        (ValueDomain::Dietary, &inputs.dietary, &config.dietary),
    ];
    for (domain, path, table_config) in aux {
        let Some(path) = path else { continue };
        let outcome = reconcile_source(domain, &report.roster, path, table_config);
        glyphs.extend(&outcome.glyphs);
        match domain {
            ValueDomain::Swimming => report.swimming = Some(outcome),
            ValueDomain::Dietary => report.dietary = Some(outcome),
        }
    }

    glyphs.dump();
    report.glyphs = glyphs.code_points();
    Ok(report)
}

/// 補助表を照合する（失敗してもエラーを記録した空の結果を返す）
pub fn reconcile_source(
    domain: ValueDomain,
    roster: &[RosterEntry],
    path: &Path,
    config: &AuxTableConfig,
) -> SourceOutcome {
    let matcher = RosterMatcher::new(domain);
    let result = read_aux_table(path, config).and_then(|table| matcher.match_table(roster, &table, config));

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("[{}] 照合を中断: {}", domain, e);
            SourceOutcome::failed(&e)
        }
    }
}

/// 写真台帳を照合する（読み込みに失敗した場合はエラーを記録した空の結果）
fn reconcile_photos(roster: &[RosterEntry], path: &Path, inputs: &RunInputs, config: &Config) -> SourceOutcome {
    let document = match PhotoDocument::from_file(path) {
        Ok(document) => document,
        Err(e) => {
            let err = RosterMatchError::Document(format!("{}: {}", path.display(), e));
            log::error!("[写真] 照合を中断: {}", err);
            return SourceOutcome::failed(&err);
        }
    };

    log::info!(
        "[写真] {}ページ / 文字列 {}件 / 画像 {}件",
        document.pages.len(),
        document.token_count(),
        document.image_count()
    );

    let progress = page_progress(document.pages.len(), inputs.show_progress);
    let mut crop_sink;
    let mut handle_sink = HandleSink;
    let sink: &mut dyn ImageSink = match &inputs.crop_dir {
        Some(dir) => {
            crop_sink = CropSink::new(dir, config.spatial.crop_dpi);
            &mut crop_sink
        }
        None => &mut handle_sink,
    };

    let outcome = SpatialMatcher::extract(roster, &document, &config.spatial, sink, &progress);
    progress.finish_and_clear();
    outcome
}

fn page_progress(pages: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(pages as u64);
    let style = ProgressStyle::with_template("{spinner} ページ {pos}/{len} [{bar:30}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// 照合結果の要約を表示用に整形
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!("名簿: {}人", report.roster.len())];
    for (name, outcome) in report.sources() {
        let line = match &outcome.error {
            Some(err) => format!("{}: 中断 ({})", name, err),
            None => format!(
                "{}: 一致 {}件 / 未照合 {}件 / 手動 {}件",
                name,
                outcome.matches.len(),
                outcome.unmatched.len(),
                outcome.manual.len()
            ),
        };
        lines.push(line);
    }
    if !report.glyphs.is_empty() {
        lines.push(format!("PUA文字: {}", report.glyphs.join(", ")));
    }
    lines
}

/// 生徒ID → 値 の対応（入力元名で選ぶ）
pub fn projection(report: &RunReport, source: &str) -> BTreeMap<String, String> {
    report
        .sources()
        .find(|(name, _)| *name == source)
        .map(|(_, outcome)| outcome.by_student())
        .unwrap_or_default()
}

/// 断片を含むトークン（文字化けの調査用）
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphProbe {
    /// 1始まりのページ番号
    pub page: usize,
    pub text: String,
    pub normalized: String,
    pub code_points: Vec<String>,
}

/// 断片を含むトークンを列挙する（元の文字列・正規化後のどちらかに含まれれば対象）
pub fn probe_glyphs(document: &PhotoDocument, fragment: &str) -> Vec<GlyphProbe> {
    let needle = fragment.to_lowercase();
    document
        .pages
        .iter()
        .flat_map(|page| page.tokens.iter().map(move |token| (page.index, token)))
        .filter_map(|(page, token)| {
            let normalized = normalize(&token.text);
            let hit = token.text.to_lowercase().contains(&needle) || normalized.to_lowercase().contains(&needle);
            hit.then(|| GlyphProbe {
                page: page + 1,
                text: token.text.clone(),
                normalized,
                code_points: token.text.chars().map(format_code_point).collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Locator, MatchKey, Payload, UnmatchedRecord};

    fn entry(id: &str, surname: &str, first: &str) -> RosterEntry {
        RosterEntry {
            student_id: id.into(),
            surname: surname.into(),
            first_name: first.into(),
            roll_group: "7A".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_source_isolates_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swim.csv");
        std::fs::write(&path, "Pupil,Level\nJessica Gray,Strong swimmer\n").unwrap();

        let outcome = reconcile_source(
            ValueDomain::Swimming,
            &[entry("1", "Gray", "Jessica")],
            &path,
            &AuxTableConfig::swimming(),
        );
        assert!(outcome.matches.is_empty());
        assert!(outcome.error.as_deref().unwrap_or("").contains("name"));
    }

    #[test]
    fn test_apply_manual_creates_missing_source() {
        let mut report = RunReport::new(vec![entry("1", "Gray", "Jessica")]);
        let overrides = ManualOverrides {
            photos: [(MatchKey::Photo("p1_img0".into()), "1".to_string())].into_iter().collect(),
            ..Default::default()
        };
        report.apply_manual(&overrides);

        let students = report.students();
        assert_eq!(students[0].photo.as_deref(), Some("p1_img0"));
        assert_eq!(students[0].swimming, None);
        assert_eq!(students[0].swim_level, None);
    }

    #[test]
    fn test_students_projection_and_swim_level() {
        let mut report = RunReport::new(vec![entry("1", "Gray", "Jessica"), entry("2", "Bell", "Tom")]);
        report.swimming = Some(SourceOutcome {
            matches: [(MatchKey::Row(0), "2".to_string())].into_iter().collect(),
            values: BTreeMap::from([(0, "Weak swimmer".to_string())]),
            unmatched: vec![UnmatchedRecord {
                source_text: "Someone Else".into(),
                payload: Payload::Value("Strong".into()),
                locator: Locator::Row(1),
            }],
            ..Default::default()
        });

        let students = report.students();
        assert_eq!(students[0].swim_level.as_deref(), Some("NotRecorded"));
        assert_eq!(students[1].swimming.as_deref(), Some("Weak swimmer"));
        assert_eq!(students[1].swim_level.as_deref(), Some("Weak"));
        assert_eq!(report.unmatched_count(), 1);
        assert_eq!(projection(&report, "swimming").len(), 1);
    }

    #[test]
    fn test_report_round_trip_keeps_manual() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = RunReport::new(vec![entry("1", "Gray", "Jessica")]);
        report.dietary = Some(SourceOutcome {
            values: BTreeMap::from([(3, "Vegan".to_string())]),
            ..Default::default()
        });
        report.apply_manual(&ManualOverrides {
            dietary: [(MatchKey::Row(3), "1".to_string())].into_iter().collect(),
            ..Default::default()
        });
        report.save(&path).unwrap();

        let loaded = RunReport::load(&path).unwrap();
        let dietary = loaded.dietary.as_ref().unwrap();
        assert_eq!(dietary.manual.get(&MatchKey::Row(3)), Some("1"));
        assert_eq!(loaded.students()[0].dietary.as_deref(), Some("Vegan"));
    }

    #[test]
    fn test_probe_glyphs_finds_ligature_tokens() {
        let document = PhotoDocument::from_json_str(
            r#"{"pages":[{"tokens":[
                {"text":"Gri\uFB03n","top":0,"bottom":10,"x0":0,"x1":30},
                {"text":"Gray","top":0,"bottom":10,"x0":40,"x1":60}
            ]}]}"#,
        )
        .unwrap();
        let probes = probe_glyphs(&document, "griff");
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].page, 1);
        assert_eq!(probes[0].normalized, "Griffin");
        assert!(probes[0].code_points.contains(&"U+FB03".to_string()));
    }

    #[test]
    fn test_summary_lines_report_errors() {
        let mut report = RunReport::new(Vec::new());
        report.dietary = Some(SourceOutcome::failed(&RosterMatchError::Config("bad".into())));
        let lines = summary_lines(&report);
        assert!(lines.iter().any(|l| l.starts_with("dietary: 中断")));
    }
}
