use anyhow::{anyhow, Result};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BOT_COUNT_TAG: &str = "BotCount";
pub const NAME_LAYOUT_TAG: &str = "NameLayout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotCountRange {
    pub from: u32,
    pub to: u32,
    pub step: u32,
}

impl Default for BotCountRange {
    fn default() -> Self {
        Self {
            from: 10,
            to: 100,
            step: 10,
        }
    }
}

impl BotCountRange {
    pub fn counts(&self) -> Result<Vec<u32>> {
        if self.step == 0 {
            return Err(anyhow!("bot count step must be positive"));
        }
        Ok((self.from..=self.to).step_by(self.step as usize).collect())
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn element_pattern(tag: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"(<{tag}(?:\s[^>]*)?>)[^<]*(</{tag}\s*>)",
        tag = regex::escape(tag)
    ))?)
}

pub fn set_element_text(document: &str, tag: &str, value: &str) -> Result<String> {
    let pattern = element_pattern(tag)?;
    let value = escape_text(value);
    Ok(pattern
        .replace_all(document, |caps: &Captures| {
            format!("{}{}{}", &caps[1], value, &caps[2])
        })
        .into_owned())
}

pub fn variant_name(stem: &str, bot_count: u32) -> String {
    format!("{}r{}", stem, bot_count)
}

pub fn render_variant(document: &str, stem: &str, bot_count: u32) -> Result<String> {
    let with_bots = set_element_text(document, BOT_COUNT_TAG, &bot_count.to_string())?;
    set_element_text(&with_bots, NAME_LAYOUT_TAG, &variant_name(stem, bot_count))
}

pub fn generate_variants(layout_path: &Path, range: &BotCountRange) -> Result<Vec<PathBuf>> {
    let counts = range.counts()?;
    let document = fs::read_to_string(layout_path)
        .map_err(|e| anyhow!("failed to read {}: {}", layout_path.display(), e))?;
    let stem = layout_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("layout path has no file name: {}", layout_path.display()))?;
    let extension = layout_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let directory = layout_path.parent().unwrap_or(Path::new("."));

    info!(layout = %layout_path.display(), variants = counts.len(), "generating layout variants");
    let mut written = Vec::with_capacity(counts.len());
    for count in counts {
        let rendered = render_variant(&document, stem, count)?;
        let out_path = directory.join(format!("{}{}", variant_name(stem, count), extension));
        fs::write(&out_path, rendered)?;
        written.push(out_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const LAYOUT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<LayoutConfiguration>
  <NameLayout>Sv5</NameLayout>
  <BotCount>40</BotCount>
  <StationCount>4</StationCount>
</LayoutConfiguration>
"#;

    #[test]
    fn default_range_matches_sweep() {
        let counts = BotCountRange::default().counts().expect("counts");
        assert_eq!(counts, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn zero_step_is_rejected() {
        let range = BotCountRange {
            from: 10,
            to: 20,
            step: 0,
        };
        assert!(range.counts().is_err());
    }

    #[test]
    fn render_replaces_only_target_elements() {
        let out = render_variant(LAYOUT, "Sv5", 70).expect("render");
        assert!(out.contains("<BotCount>70</BotCount>"));
        assert!(out.contains("<NameLayout>Sv5r70</NameLayout>"));
        assert!(out.contains("<StationCount>4</StationCount>"));
        assert!(out.starts_with("<?xml"));
    }

    #[test]
    fn attributes_on_elements_are_kept() {
        let doc = r#"<Root><BotCount unit="bots">5</BotCount></Root>"#;
        let out = set_element_text(doc, BOT_COUNT_TAG, "30").expect("set");
        assert_eq!(out, r#"<Root><BotCount unit="bots">30</BotCount></Root>"#);
    }

    #[test]
    fn similar_tag_names_are_untouched() {
        let doc = "<Root><BotCountMax>9</BotCountMax><BotCount>1</BotCount></Root>";
        let out = set_element_text(doc, BOT_COUNT_TAG, "2").expect("set");
        assert_eq!(
            out,
            "<Root><BotCountMax>9</BotCountMax><BotCount>2</BotCount></Root>"
        );
    }

    #[test]
    fn generate_writes_one_file_per_count() {
        let dir = std::env::temp_dir().join(format!(
            "rawsim_sweep_layout_{}_{}",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("dir");
        let source = dir.join("Sv5.xlayo");
        fs::write(&source, LAYOUT).expect("write layout");

        let range = BotCountRange {
            from: 10,
            to: 30,
            step: 10,
        };
        let written = generate_variants(&source, &range).expect("generate");
        assert_eq!(
            written,
            vec![
                dir.join("Sv5r10.xlayo"),
                dir.join("Sv5r20.xlayo"),
                dir.join("Sv5r30.xlayo"),
            ]
        );
        let second = fs::read_to_string(dir.join("Sv5r20.xlayo")).expect("read");
        assert!(second.contains("<BotCount>20</BotCount>"));
        assert!(second.contains("<NameLayout>Sv5r20</NameLayout>"));
        let _ = fs::remove_dir_all(dir);
    }
}
