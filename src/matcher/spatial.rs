//! 写真台帳の空間照合
//!
//! ページごとに、トークン列から名簿の姓に一致するフレーズを探し、
//! その上にある未使用の画像を生徒の写真として割り当てる。
//!
//! ## 処理フロー（ページ単位）
//! 1. 姓フレーズ探索: 現在位置から長い順（5→1トークン）に連結して照合
//! 2. 候補の絞り込み: 同姓が複数なら、姓の下のテキストから名→ホームルームの順で判定
//! 3. 写真の選択: 姓の上・最大距離以内・中心が揃っている画像のうち最も近いもの
//! 4. 未割当画像: 一定サイズ以上で割り当てられなかった画像を手動割当用に報告
//!
//! 画像の使用済み管理はページ内だけで有効。
//! 同じ生徒が後のページでも一致した場合は後の写真で上書きする。

use super::types::{Locator, MatchKey, Payload, SourceOutcome, UnmatchedRecord};
use crate::config::SpatialParams;
use crate::normalizer::{match_key, normalize_with_log, GlyphLog};
use crate::photo::{CropName, ImageSink};
use indicatif::ProgressBar;
use roster_match_common::{BBox, PhotoDocument, PhotoPage, PositionedImage, PositionedToken, RosterEntry};
use std::collections::{BTreeMap, HashMap, HashSet};

/// 未割当画像の下にテキストが無い場合の文言
pub const NO_TEXT_BELOW: &str = "No text found immediately below";

/// 姓キーに対応する生徒
#[derive(Debug, Clone, PartialEq)]
pub struct StudentCandidate {
    pub student_id: String,
    /// 小文字化したホームルーム
    pub roll_group: String,
    /// 小文字化した名
    pub first_name: String,
    /// 表示用の元の姓
    pub surname: String,
}

/// 姓キー → 生徒候補（同姓は複数）
#[derive(Debug, Clone, Default)]
pub struct StudentMap {
    map: HashMap<String, Vec<StudentCandidate>>,
}

impl StudentMap {
    pub fn build(roster: &[RosterEntry], glyphs: &mut GlyphLog) -> Self {
        let mut map: HashMap<String, Vec<StudentCandidate>> = HashMap::new();
        for entry in roster {
            let key = match_key(&entry.surname, glyphs);
            if key.is_empty() {
                continue;
            }
            map.entry(key).or_default().push(StudentCandidate {
                student_id: entry.student_id.clone(),
                roll_group: entry.roll_group.trim().to_lowercase(),
                first_name: normalize_with_log(entry.first_name.trim(), glyphs).to_lowercase(),
                surname: entry.surname.trim().to_string(),
            });
        }
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&[StudentCandidate]> {
        self.map.get(key).map(Vec::as_slice)
    }

    /// 姓の種類数
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// 候補の絞り込み方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disambiguation {
    SingleMatch,
    FirstName,
    RollGroup,
}

impl std::fmt::Display for Disambiguation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disambiguation::SingleMatch => write!(f, "Single Match"),
            Disambiguation::FirstName => write!(f, "First Name"),
            Disambiguation::RollGroup => write!(f, "Roll Group"),
        }
    }
}

/// 1ページ分の照合結果
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    /// (生徒ID, 写真ハンドル) を一致順に
    pub photos: Vec<(String, String)>,
    pub unmatched: Vec<UnmatchedRecord>,
}

/// ページ内の照合状態（使用済み画像はページごとに作り直す）
struct PagePass<'p> {
    page: &'p PhotoPage,
    claimed: HashSet<usize>,
    outcome: PageOutcome,
}

impl<'p> PagePass<'p> {
    fn new(page: &'p PhotoPage) -> Self {
        Self {
            page,
            claimed: HashSet::new(),
            outcome: PageOutcome::default(),
        }
    }
}

/// 空間照合器
pub struct SpatialMatcher {
    params: SpatialParams,
    students: StudentMap,
    glyphs: GlyphLog,
}

impl SpatialMatcher {
    pub fn new(roster: &[RosterEntry], params: SpatialParams) -> Self {
        let mut glyphs = GlyphLog::new();
        let students = StudentMap::build(roster, &mut glyphs);
        log::debug!(
            "生徒 {}人（姓 {}種類）を読み込み",
            roster.len(),
            students.len()
        );
        Self {
            params,
            students,
            glyphs,
        }
    }

    /// ドキュメント全体を照合する
    ///
    /// # Arguments
    /// * `roster` - 名簿
    /// * `document` - 写真ドキュメント
    /// * `params` - 空間照合の定数
    /// * `sink` - 画像の保存先
    /// * `progress` - ページ単位の進捗表示
    pub fn extract(
        roster: &[RosterEntry],
        document: &PhotoDocument,
        params: &SpatialParams,
        sink: &mut dyn ImageSink,
        progress: &ProgressBar,
    ) -> SourceOutcome {
        let mut matcher = Self::new(roster, params.clone());
        let mut by_student: BTreeMap<String, String> = BTreeMap::new();
        let mut unmatched = Vec::new();

        for page in &document.pages {
            let page_outcome = matcher.match_page(page, sink);
            for (student_id, handle) in page_outcome.photos {
                if let Some(previous) = by_student.insert(student_id.clone(), handle) {
                    log::warn!(
                        "ID {} の写真を上書き（ページ{}）。以前: {}",
                        student_id,
                        page.index + 1,
                        previous
                    );
                }
            }
            unmatched.extend(page_outcome.unmatched);
            progress.inc(1);
        }

        log::info!(
            "写真 {}枚を割当 / 未割当画像 {}枚",
            by_student.len(),
            unmatched.len()
        );

        SourceOutcome {
            matches: by_student
                .into_iter()
                .map(|(student_id, handle)| (MatchKey::Photo(handle), student_id))
                .collect(),
            unmatched,
            glyphs: matcher.glyphs,
            ..Default::default()
        }
    }

    /// 1ページを照合する
    pub fn match_page(&mut self, page: &PhotoPage, sink: &mut dyn ImageSink) -> PageOutcome {
        log::debug!(
            "ページ{}: トークン {}個 / 画像 {}枚",
            page.index + 1,
            page.tokens.len(),
            page.images.len()
        );

        let mut pass = PagePass::new(page);

        let mut cursor = 0;
        while cursor < page.tokens.len() {
            cursor += self.scan_at(&mut pass, cursor, sink);
        }

        self.collect_orphans(&mut pass, sink);
        pass.outcome
    }

    /// 現在位置で姓フレーズを探し、進めるトークン数を返す
    fn scan_at(&mut self, pass: &mut PagePass<'_>, cursor: usize, sink: &mut dyn ImageSink) -> usize {
        let page = pass.page;
        let tokens = &page.tokens;

        for len in phrase_lengths(tokens, cursor, &self.params) {
            let phrase = &tokens[cursor..cursor + len];
            let raw: String = phrase.iter().map(|t| t.text.as_str()).collect();
            let key = match_key(&raw, &mut self.glyphs);

            let Some(candidates) = self.students.get(&key) else {
                continue;
            };
            let bounds = phrase_bounds(phrase);

            let nearby = nearby_text(tokens, &bounds, &self.params, &mut self.glyphs);
            let Some((candidate, how)) = resolve_candidate(candidates, &nearby) else {
                log::debug!(
                    "  AMBIGUOUS: 姓 '{}' に一致したが名/ホームルームが近くにない: '{}'",
                    key,
                    nearby
                );
                continue;
            };
            let student_id = candidate.student_id.clone();
            log::debug!("  MATCHED '{}' -> ID {} (via {})", key, student_id, how);

            match find_photo(&page.images, &pass.claimed, &bounds, &self.params) {
                Some((index, gap)) => {
                    log::debug!("    [Img {}] CLAIMED: Gap={:.1}", index, gap);
                    pass.claimed.insert(index);
                    match sink.persist(page, index, &page.images[index], &CropName::Student(student_id.clone())) {
                        Ok(handle) => pass.outcome.photos.push((student_id, handle)),
                        Err(e) => log::warn!("    画像{}の保存に失敗: {}", index, e),
                    }
                }
                None => {
                    log::debug!(
                        "    '{}' の上に写真が見つからない (最大距離 {})",
                        key,
                        self.params.max_vertical_gap
                    );
                }
            }

            return len;
        }

        1
    }

    /// 割り当てられなかった画像を未照合として記録
    fn collect_orphans(&mut self, pass: &mut PagePass<'_>, sink: &mut dyn ImageSink) {
        let page = pass.page;
        for (index, image) in page.images.iter().enumerate() {
            if pass.claimed.contains(&index) {
                continue;
            }
            let bbox = image.bbox();
            if bbox.width() < self.params.orphan_min_size || bbox.height() < self.params.orphan_min_size {
                continue;
            }

            let text = text_below(&page.tokens, &bbox, &self.params, &mut self.glyphs);
            log::debug!("  未割当画像 {}: 下のテキスト '{}'", index, text);

            let name = CropName::Orphan {
                page: page.index,
                index,
            };
            match sink.persist(page, index, image, &name) {
                Ok(handle) => pass.outcome.unmatched.push(UnmatchedRecord {
                    source_text: text,
                    payload: Payload::Image(handle),
                    locator: Locator::Page {
                        page: page.index,
                        index,
                    },
                }),
                Err(e) => log::warn!("  未割当画像{}の保存に失敗: {}", index, e),
            }
        }
    }
}

/// 試すフレーズ長（長い順）。ページ末尾を越えるもの・同一行でないものは除く
fn phrase_lengths<'t>(
    tokens: &'t [PositionedToken],
    cursor: usize,
    params: &SpatialParams,
) -> impl Iterator<Item = usize> + 't {
    let tolerance = params.same_line_tolerance;
    (1..=params.max_phrase_len)
        .rev()
        .filter(move |len| cursor + len <= tokens.len())
        .filter(move |len| on_same_line(&tokens[cursor..cursor + len], tolerance))
}

fn on_same_line(tokens: &[PositionedToken], tolerance: f64) -> bool {
    let (min, max) = tokens
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t.top), hi.max(t.top)));
    max - min <= tolerance
}

fn phrase_bounds(phrase: &[PositionedToken]) -> BBox {
    phrase
        .iter()
        .map(PositionedToken::bbox)
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| BBox::new(0.0, 0.0, 0.0, 0.0))
}

/// 姓の下（左右に余白を持たせた範囲）のテキストを小文字で連結
fn nearby_text(
    tokens: &[PositionedToken],
    bounds: &BBox,
    params: &SpatialParams,
    glyphs: &mut GlyphLog,
) -> String {
    let col_x0 = bounds.x0 - params.column_pad;
    let col_x1 = bounds.x1 + params.column_pad;

    tokens
        .iter()
        .filter(|t| t.top >= bounds.bottom - params.nearby_top_slack)
        .filter(|t| t.top <= bounds.bottom + params.lookahead_fence)
        .filter(|t| t.x1 >= col_x0 && t.x0 <= col_x1)
        .map(|t| normalize_with_log(&t.text, glyphs).to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 候補から生徒を決める（一意 → 名 → ホームルーム）
fn resolve_candidate<'c>(
    candidates: &'c [StudentCandidate],
    nearby: &str,
) -> Option<(&'c StudentCandidate, Disambiguation)> {
    if let [only] = candidates {
        return Some((only, Disambiguation::SingleMatch));
    }

    candidates
        .iter()
        .find(|c| !c.first_name.is_empty() && nearby.contains(&c.first_name))
        .map(|c| (c, Disambiguation::FirstName))
        .or_else(|| {
            candidates
                .iter()
                .find(|c| !c.roll_group.is_empty() && nearby.contains(&c.roll_group))
                .map(|c| (c, Disambiguation::RollGroup))
        })
}

/// 姓の上にある最も近い未使用画像（画像番号, 距離）
fn find_photo(
    images: &[PositionedImage],
    claimed: &HashSet<usize>,
    phrase: &BBox,
    params: &SpatialParams,
) -> Option<(usize, f64)> {
    let center = phrase.center_x();
    let allowed = phrase.width() / 2.0 + params.horizontal_margin;
    let mut best: Option<(usize, f64)> = None;

    for (index, image) in images.iter().enumerate() {
        if claimed.contains(&index) || image.bottom >= phrase.top {
            continue;
        }

        let gap = phrase.top - image.bottom;
        if gap > params.max_vertical_gap {
            if gap < params.max_vertical_gap + 20.0 {
                log::debug!(
                    "    [Img {}] REJECTED: Too high (Gap {:.1} > {})",
                    index,
                    gap,
                    params.max_vertical_gap
                );
            }
            continue;
        }

        let offset = (image.bbox().center_x() - center).abs();
        if offset > allowed {
            log::debug!(
                "    [Img {}] REJECTED: Off-center (Dist {:.1} > {:.1})",
                index,
                offset,
                allowed
            );
            continue;
        }

        if best.map_or(true, |(_, best_gap)| gap < best_gap) {
            best = Some((index, gap));
        }
    }

    best
}

/// 画像の直下にあるテキスト
fn text_below(tokens: &[PositionedToken], image: &BBox, params: &SpatialParams, glyphs: &mut GlyphLog) -> String {
    let found: Vec<String> = tokens
        .iter()
        .filter(|t| image.bottom < t.top && t.top < image.bottom + params.orphan_text_window)
        .filter(|t| t.bbox().overlaps_horizontally(image))
        .map(|t| normalize_with_log(&t.text, glyphs))
        .collect();

    if found.is_empty() {
        NO_TEXT_BELOW.to_string()
    } else {
        found.join(" ")
    }
}
