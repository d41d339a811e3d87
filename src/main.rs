use clap::Parser;
use roster_match_rust::{cli, config, error, normalizer, pipeline};
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use pipeline::{ManualOverrides, RunInputs, RunReport};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };

    match cli.command {
        Commands::Run { roster, photos, swimming, dietary, output, crop_dir } => {
            println!("🔗 roster-match - 照合\n");
            let config = Config::load_from(&config_path)?;

            if let Some(dir) = &crop_dir {
                std::fs::create_dir_all(dir)?;
            }

            println!("[1/3] 入力を照合中...");
            let inputs = RunInputs {
                roster,
                photos,
                swimming,
                dietary,
                crop_dir,
                show_progress: !cli.verbose,
            };
            let report = pipeline::run(&inputs, &config)?;
            println!("✔ 照合完了\n");

            println!("[2/3] 結果:");
            for line in pipeline::summary_lines(&report) {
                println!("  - {}", line);
            }
            println!();

            println!("[3/3] レポートを保存中...");
            report.save(&output)?;
            println!("✔ レポートを保存: {}", output.display());

            let unmatched = report.unmatched_count();
            if unmatched > 0 {
                println!("\n⚠ 未照合 {}件。手動割当JSONを作成して `merge` で反映してください", unmatched);
            }
            println!("\n✅ 完了");
        }

        Commands::Merge { report, manual, output, students } => {
            println!("🔗 roster-match - 手動割当\n");

            let mut merged = RunReport::load(&report)?;
            let overrides = ManualOverrides::from_file(&manual)?;
            if overrides.is_empty() {
                println!("- 手動割当が空です");
            }

            merged.apply_manual(&overrides);
            for line in pipeline::summary_lines(&merged) {
                println!("  - {}", line);
            }

            if students {
                println!();
                for s in merged.students() {
                    println!(
                        "  {} [{}] 写真: {} / 水泳: {} / 食事: {}",
                        s.name,
                        s.roll_group,
                        s.photo.as_deref().unwrap_or("-"),
                        s.swimming.as_deref().unwrap_or("-"),
                        s.dietary.as_deref().unwrap_or("-"),
                    );
                }
            }

            let output = output.unwrap_or(report);
            merged.save(&output)?;
            println!("\n✔ レポートを保存: {}", output.display());
        }

        Commands::Glyphs { document, fragment } => {
            let doc = roster_match_common::PhotoDocument::from_file(&document)?;
            let probes = pipeline::probe_glyphs(&doc, &fragment);
            if probes.is_empty() {
                println!("'{}' を含むトークンはありません", fragment);
            }
            for probe in probes {
                println!(
                    "p{}: {:?} -> {:?}  [{}]",
                    probe.page,
                    probe.text,
                    probe.normalized,
                    probe.code_points.join(" ")
                );
            }
        }

        Commands::Normalize { text } => {
            let mut glyphs = normalizer::GlyphLog::new();
            let normalized = normalizer::normalize_with_log(&text, &mut glyphs);
            println!("正規化: {}", normalized);
            println!("照合キー: {}", normalizer::match_key(&text, &mut glyphs));
            if !glyphs.is_empty() {
                println!("PUA文字: {}", glyphs.code_points().join(", "));
            }
        }

        Commands::Config { show, init } => {
            if init {
                Config::default().save_to(&config_path)?;
                println!("✔ 設定ファイルを作成: {}", config_path.display());
            }
            if show || !init {
                let config = Config::load_from(&config_path)?;
                println!("設定ファイル: {}", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
