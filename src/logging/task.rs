//! 日志维护: 跨天切换文件, 压缩历史日志, 删除过期日志.

use super::{LoggingConfig, build_current_log_path};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{error, warn};

/// 在当前 tokio 运行时中启动维护任务, 不在运行时中时只做一次清理
pub(super) fn spawn_log_maintenance_task(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!("未处于 tokio 运行时, 日志维护任务仅在启动时执行一次");
        if let Err(err) = cleanup_logs(&config, Local::now().date_naive()) {
            error!("启动时清理日志失败: {err}");
        }
        return;
    };

    handle.spawn(async move {
        let mut cleanup_interval =
            tokio::time::interval(Duration::from_secs(config.cleanup_interval_seconds.max(1)));
        let mut next_rollover_at = next_rollover_or_soon(Local::now());

        loop {
            tokio::select! {
                _ = cleanup_interval.tick() => {
                    if let Err(err) = cleanup_logs(&config, Local::now().date_naive()) {
                        error!("清理日志失败: {err}");
                    }
                }
                _ = tokio::time::sleep_until(next_rollover_at) => {
                    match ensure_current_log_file(&config) {
                        Ok(()) => rotate_requested.store(true, Ordering::Release),
                        Err(err) => error!("日志翻滚失败: {err}"),
                    }
                    if let Err(err) = cleanup_logs(&config, Local::now().date_naive()) {
                        error!("翻滚后清理日志失败: {err}");
                    }
                    next_rollover_at = next_rollover_or_soon(Local::now());
                }
            }
        }
    });
}

/// 创建当天的日志文件
fn ensure_current_log_file(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    fs::create_dir_all(directory)?;
    let today = Local::now().date_naive();
    let current_path = build_current_log_path(directory, &config.file_prefix, today);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&current_path)
        .with_context(|| format!("创建当前日志文件失败, path={}", current_path.display()))?;
    Ok(())
}

/// 删除早于保留期的日志, 按配置压缩今天以前的日志
fn cleanup_logs(config: &LoggingConfig, today: NaiveDate) -> Result<()> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(());
    }
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix)
        else {
            continue;
        };

        let path = entry.path();
        if date < cutoff {
            if let Err(err) = fs::remove_file(&path) {
                warn!("删除过期日志失败, path={}: {err}", path.display());
            }
        } else if config.compress_history && !compressed && date < today {
            if let Err(err) = compress_to_gz(&path) {
                warn!("压缩日志失败: {err}");
            }
        }
    }
    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

/// 解析 `{prefix}.{YYYY-MM-DD}.log[.gz]`, 返回 (日期, 是否已压缩)
fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (date_part, compressed) = match rest.strip_suffix(".log.gz") {
        Some(date_part) => (date_part, true),
        None => (rest.strip_suffix(".log")?, false),
    };
    if date_part.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}

fn next_rollover_or_soon(now: DateTime<Local>) -> tokio::time::Instant {
    compute_next_rollover(now).unwrap_or_else(|err| {
        error!("计算下一次翻滚时间失败: {err}");
        tokio::time::Instant::now() + Duration::from_secs(1)
    })
}

fn compute_next_rollover(now: DateTime<Local>) -> Result<tokio::time::Instant> {
    let next_date = now.date_naive() + ChronoDuration::days(1);
    let next_midnight = next_date
        .and_hms_opt(0, 0, 0)
        .context("计算下一次日志翻滚时间失败")?;
    let next_local = Local
        .from_local_datetime(&next_midnight)
        .earliest()
        .context("转换本地时间失败")?;
    let system_time = SystemTime::from(next_local.with_timezone(&Utc));
    let duration = system_time
        .duration_since(SystemTime::now())
        .unwrap_or_default();
    Ok(tokio::time::Instant::now() + duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn temp_config(temp_dir: &TempDir) -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            directory: temp_dir.path().to_string_lossy().to_string(),
            file_prefix: "yin".to_string(),
            retention_days: 7,
            compress_history: true,
            cleanup_interval_seconds: 60,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| panic!("无效日期 {y}-{m}-{d}"))
    }

    #[test]
    fn test_parse_rotated_log_name() {
        assert_eq!(
            parse_rotated_log_name("yin.2026-02-06.log", "yin"),
            Some((date(2026, 2, 6), false))
        );
        assert_eq!(
            parse_rotated_log_name("yin.2026-02-06.log.gz", "yin"),
            Some((date(2026, 2, 6), true))
        );
        assert!(parse_rotated_log_name("yin.log", "yin").is_none());
        assert!(parse_rotated_log_name("other.2026-02-06.log", "yin").is_none());
        assert!(parse_rotated_log_name("yin.2026-2-6.log", "yin").is_none());
    }

    #[test]
    fn test_清理过期日志并压缩历史日志() {
        let temp_dir = TempDir::new().unwrap_or_else(|err| panic!("创建临时目录失败: {err}"));
        let config = temp_config(&temp_dir);
        let dir = temp_dir.path();
        let today = date(2026, 3, 10);

        fs::write(dir.join("yin.2026-02-01.log"), b"old").unwrap();
        fs::write(dir.join("yin.2026-03-09.log"), b"yesterday").unwrap();
        fs::write(dir.join("yin.2026-03-10.log"), b"today").unwrap();
        fs::write(dir.join("notes.txt"), b"keep").unwrap();

        cleanup_logs(&config, today).unwrap();

        assert!(!dir.join("yin.2026-02-01.log").exists());
        assert!(!dir.join("yin.2026-03-09.log").exists());
        assert!(dir.join("yin.2026-03-10.log").exists());
        assert!(dir.join("notes.txt").exists());

        let gz = File::open(dir.join("yin.2026-03-09.log.gz")).unwrap();
        let mut text = String::new();
        flate2::read::GzDecoder::new(gz)
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "yesterday");
    }

    #[test]
    fn test_ensure_current_log_file() {
        let temp_dir = TempDir::new().unwrap_or_else(|err| panic!("创建临时目录失败: {err}"));
        let config = temp_config(&temp_dir);
        ensure_current_log_file(&config).unwrap();

        let today = Local::now().date_naive();
        let current_path =
            build_current_log_path(Path::new(&config.directory), &config.file_prefix, today);
        assert!(current_path.exists(), "当前日志文件不存在");
    }
}
