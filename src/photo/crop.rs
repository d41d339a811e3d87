//! 画像の切り出しとJPEG保存

use super::{CropName, ImageSink};
use crate::error::{Result, RosterMatchError};
use image::imageops::FilterType;
use image::DynamicImage;
use roster_match_common::{BBox, PhotoPage, PositionedImage};
use std::path::{Path, PathBuf};

/// ページ単位（1/72インチ）
const POINTS_PER_INCH: f64 = 72.0;

/// 作業ディレクトリにJPEGとして書き出す
///
/// 画像に抽出済みファイルがあればそれを、無ければページラスタから
/// 該当範囲を切り出す。出力サイズは `dpi` に合わせる。
pub struct CropSink {
    out_dir: PathBuf,
    dpi: f64,
    /// 直近に読み込んだページラスタ（ページ番号, 画像）
    raster: Option<(usize, DynamicImage)>,
}

impl CropSink {
    pub fn new(out_dir: impl Into<PathBuf>, dpi: f64) -> Self {
        Self {
            out_dir: out_dir.into(),
            dpi,
            raster: None,
        }
    }

    fn page_raster(&mut self, page: &PhotoPage, path: &Path) -> Result<&DynamicImage> {
        let cached = matches!(&self.raster, Some((index, _)) if *index == page.index);
        if !cached {
            if !path.exists() {
                return Err(RosterMatchError::FileNotFound(path.display().to_string()));
            }
            self.raster = Some((page.index, image::open(path)?));
        }
        match &self.raster {
            Some((_, img)) => Ok(img),
            None => Err(RosterMatchError::ImageCrop("ページラスタを読み込めません".into())),
        }
    }

    /// 出力解像度に合わせて拡大縮小
    fn fit_to_dpi(&self, img: DynamicImage, bbox: &BBox) -> DynamicImage {
        let scale = self.dpi / POINTS_PER_INCH;
        let width = (bbox.width() * scale).round().max(1.0) as u32;
        let height = (bbox.height() * scale).round().max(1.0) as u32;
        if img.width() == width && img.height() == height {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
    }
}

/// ページ座標の範囲をラスタから切り出す
pub(crate) fn crop_region(raster: &DynamicImage, page: &PhotoPage, bbox: &BBox) -> Result<DynamicImage> {
    if page.width <= 0.0 || page.height <= 0.0 {
        return Err(RosterMatchError::ImageCrop(format!(
            "ページ{}の寸法がありません",
            page.index + 1
        )));
    }

    let scale_x = raster.width() as f64 / page.width;
    let scale_y = raster.height() as f64 / page.height;

    let clamp = |v: f64, max: u32| (v.round().max(0.0) as u32).min(max);
    let x0 = clamp(bbox.x0 * scale_x, raster.width());
    let y0 = clamp(bbox.top * scale_y, raster.height());
    let x1 = clamp(bbox.x1 * scale_x, raster.width());
    let y1 = clamp(bbox.bottom * scale_y, raster.height());

    if x1 <= x0 || y1 <= y0 {
        return Err(RosterMatchError::ImageCrop(format!(
            "切り出し範囲が空です ({:.1}, {:.1}, {:.1}, {:.1})",
            bbox.x0, bbox.top, bbox.x1, bbox.bottom
        )));
    }

    Ok(raster.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

impl ImageSink for CropSink {
    fn persist(
        &mut self,
        page: &PhotoPage,
        index: usize,
        image: &PositionedImage,
        name: &CropName,
    ) -> Result<String> {
        let bbox = image.bbox();

        let pixels = if let Some(source) = &image.source {
            if !source.exists() {
                return Err(RosterMatchError::FileNotFound(source.display().to_string()));
            }
            image::open(source)?
        } else if let Some(raster_path) = &page.raster {
            let raster = self.page_raster(page, raster_path)?;
            crop_region(raster, page, &bbox)?
        } else {
            return Err(RosterMatchError::ImageCrop(format!(
                "ページ{} 画像{}: 画素の取得元がありません",
                page.index + 1,
                index
            )));
        };

        let pixels = self.fit_to_dpi(pixels, &bbox);

        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!("{}.jpg", name.file_stem()));
        pixels.to_rgb8().save(&path)?;

        Ok(path.display().to_string())
    }
}
