use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub fn loops_dir(log_dir: &std::path::Path) -> PathBuf {
    log_dir.join("loops")
}

pub fn trades_dir(log_dir: &std::path::Path) -> PathBuf {
    log_dir.join("trades")
}

pub fn equity_dir(log_dir: &std::path::Path) -> PathBuf {
    log_dir.join("equity")
}

pub fn loop_file(log_dir: &std::path::Path, loop_id: uuid::Uuid, ts: DateTime<Utc>) -> PathBuf {
    loops_dir(log_dir).join(format!("loop_{}_{}.json", ts.timestamp_millis(), loop_id))
}

pub fn trades_file(log_dir: &std::path::Path, ts: DateTime<Utc>) -> PathBuf {
    trades_dir(log_dir).join(format!("trades_{}.jsonl", ts.format("%Y%m%d")))
}

pub fn equity_file(log_dir: &std::path::Path, ts: DateTime<Utc>) -> PathBuf {
    equity_dir(log_dir).join(format!("equity_{}.jsonl", ts.format("%Y%m%d")))
}

pub fn decisions_csv(log_dir: &std::path::Path) -> PathBuf {
    log_dir.join("decisions.csv")
}

pub fn trades_csv(log_dir: &std::path::Path) -> PathBuf {
    log_dir.join("trades.csv")
}

pub fn equity_csv(log_dir: &std::path::Path) -> PathBuf {
    log_dir.join("equity.csv")
}
