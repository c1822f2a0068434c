use crate::job::base_instance_name;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const FOOTPRINT_DELIMITER: u8 = b';';
pub const FOOTPRINT_FILE_NAME: &str = "footprints.csv";

pub const INSTANCE_COLUMN: &str = "Instance";
pub const SETTING_COLUMN: &str = "Setting";
pub const CONTROLLER_COLUMN: &str = "Controller";
pub const BOT_COUNT_COLUMN: &str = "NBots";

pub const REPORT_METRICS: [&str; 17] = [
    "ItemThroughputRate",
    "DistanceTraveled",
    "TimingDecisionsOverall",
    "TimingPathPlanningOverall",
    "TimingTaskAllocationOverall",
    "TimingItemStorageOverall",
    "TimingPodStorageOverall",
    "TimingRepositioningOverall",
    "TimingReplenishmentBatchingOverall",
    "TimingOrderBatchingOverall",
    "TimingPodSelectionOverall",
    "OSIdleTimeAvg",
    "ItemPileOneAvg",
    "OrderPileOneAvg",
    "OrderLatenessAvg",
    "LateOrdersFractional",
    "DistanceTraveledPerBot",
];

const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(cell: &str) -> bool {
    NA_VALUES.contains(&cell.trim())
}

#[derive(Debug, Error)]
pub enum FootprintError {
    #[error("{}: missing column(s) {}", path.display(), missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("{}: row {row}, column {column}: '{value}' is not a number", path.display())]
    NotANumber {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FootprintError>;

#[derive(Debug, Clone)]
pub struct Table {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    fn require(&self, names: &[&str]) -> Result<Vec<usize>> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| self.column(n).is_none())
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FootprintError::MissingColumns {
                path: self.path.clone(),
                missing,
            });
        }
        Ok(names.iter().filter_map(|n| self.column(n)).collect())
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> FootprintError + '_ {
    move |source| FootprintError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(FOOTPRINT_DELIMITER)
        .from_path(path)
        .map_err(csv_error(path))?;
    let headers = reader
        .headers()
        .map_err(csv_error(path))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error(path))?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(Table {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

pub fn write_rows(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(FOOTPRINT_DELIMITER)
        .from_path(path)
        .map_err(csv_error(path))?;
    writer.write_record(headers).map_err(csv_error(path))?;
    for row in rows {
        writer.write_record(row).map_err(csv_error(path))?;
    }
    writer.flush().map_err(|source| FootprintError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn fix_instances(path: &Path) -> Result<usize> {
    let mut table = read_table(path)?;
    let cols = table.require(&[BOT_COUNT_COLUMN, INSTANCE_COLUMN])?;
    let (bots, instance) = (cols[0], cols[1]);
    for row in table.rows.iter_mut() {
        let fixed = format!("{}r{}", row[instance], row[bots]);
        row[instance] = fixed;
    }
    write_rows(path, &table.headers, &table.rows)?;
    info!(file = %path.display(), rows = table.rows.len(), "instance column fixed");
    Ok(table.rows.len())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub instance: String,
    pub setting: String,
    pub controller: String,
    pub runs: usize,
    pub mean: Vec<Option<f64>>,
    pub std: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub instance: String,
    pub setting: String,
    pub controller: String,
    pub mean: Vec<Option<f64>>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

type GroupKey = (String, String, String);

pub fn aggregate(table: &Table) -> Result<Vec<GroupStats>> {
    let keys = table.require(&[INSTANCE_COLUMN, SETTING_COLUMN, CONTROLLER_COLUMN])?;
    let metrics = table.require(&REPORT_METRICS)?;

    let mut groups: BTreeMap<GroupKey, (usize, Vec<Vec<f64>>)> = BTreeMap::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        if keys.iter().any(|&k| is_missing(&row[k])) {
            warn!(file = %table.path.display(), row = row_idx + 2, "row has an empty group key, skipped");
            continue;
        }
        let key = (
            row[keys[0]].clone(),
            row[keys[1]].clone(),
            row[keys[2]].clone(),
        );
        let entry = groups
            .entry(key)
            .or_insert_with(|| (0, vec![Vec::new(); metrics.len()]));
        entry.0 += 1;
        for (m, &col) in metrics.iter().enumerate() {
            let cell = row[col].trim();
            if is_missing(cell) {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| FootprintError::NotANumber {
                path: table.path.clone(),
                row: row_idx + 2,
                column: table.headers[col].trim().to_string(),
                value: cell.to_string(),
            })?;
            entry.1[m].push(value);
        }
    }

    Ok(groups
        .into_iter()
        .map(|((instance, setting, controller), (runs, values))| GroupStats {
            instance,
            setting,
            controller,
            runs,
            mean: values.iter().map(|v| mean(v)).collect(),
            std: values.iter().map(|v| sample_std(v)).collect(),
        })
        .collect())
}

/// Averages group means across bot-count variants. Groups whose instance has
/// no `r<digits>` suffix cannot be attributed to a base instance and are dropped.
pub fn collapse_by_base_instance(groups: &[GroupStats]) -> Vec<SummaryRow> {
    let mut collapsed: BTreeMap<GroupKey, Vec<Vec<f64>>> = BTreeMap::new();
    for group in groups {
        let base = match base_instance_name(&group.instance) {
            Some(base) => base,
            None => {
                warn!(instance = %group.instance, "instance has no bot-count suffix, left out of summary");
                continue;
            }
        };
        let key = (
            base.to_string(),
            group.setting.clone(),
            group.controller.clone(),
        );
        let entry = collapsed
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); group.mean.len()]);
        for (m, value) in group.mean.iter().enumerate() {
            if let Some(v) = value {
                entry[m].push(*v);
            }
        }
    }
    collapsed
        .into_iter()
        .map(|((instance, setting, controller), values)| SummaryRow {
            instance,
            setting,
            controller,
            mean: values.iter().map(|v| mean(v)).collect(),
        })
        .collect()
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn key_headers() -> Vec<String> {
    vec![
        INSTANCE_COLUMN.to_string(),
        SETTING_COLUMN.to_string(),
        CONTROLLER_COLUMN.to_string(),
    ]
}

pub fn write_averages(path: &Path, groups: &[GroupStats]) -> Result<()> {
    let mut headers = key_headers();
    headers.push("Runs".to_string());
    for metric in REPORT_METRICS {
        headers.push(format!("{}_mean", metric));
        headers.push(format!("{}_std", metric));
    }
    let rows: Vec<Vec<String>> = groups
        .iter()
        .map(|g| {
            let mut row = vec![
                g.instance.clone(),
                g.setting.clone(),
                g.controller.clone(),
                g.runs.to_string(),
            ];
            for (m, s) in g.mean.iter().zip(g.std.iter()) {
                row.push(cell(*m));
                row.push(cell(*s));
            }
            row
        })
        .collect();
    write_rows(path, &headers, &rows)
}

pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut headers = key_headers();
    headers.extend(REPORT_METRICS.iter().map(|m| m.to_string()));
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut row = vec![r.instance.clone(), r.setting.clone(), r.controller.clone()];
            row.extend(r.mean.iter().map(|m| cell(*m)));
            row
        })
        .collect();
    write_rows(path, &headers, &body)
}

fn dir_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string())
}

pub fn averages_path_for(footprints: &Path) -> PathBuf {
    let dir = footprints.parent().unwrap_or(Path::new("."));
    dir.join(format!("averages_{}.csv", dir_label(dir)))
}

pub fn summary_path_for(root: &Path) -> PathBuf {
    root.join(format!("summary_{}.csv", dir_label(root)))
}

pub struct FileReport {
    pub averages_path: PathBuf,
    pub groups: usize,
    pub summary_rows: Vec<SummaryRow>,
}

pub fn report_file(path: &Path) -> Result<FileReport> {
    let table = read_table(path)?;
    let groups = aggregate(&table)?;
    let averages_path = averages_path_for(path);
    write_averages(&averages_path, &groups)?;
    info!(file = %path.display(), groups = groups.len(), "averages written");
    Ok(FileReport {
        averages_path,
        groups: groups.len(),
        summary_rows: collapse_by_base_instance(&groups),
    })
}
