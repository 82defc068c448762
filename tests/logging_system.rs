//! 日志系统集成测试.
//!
//! 注意: tracing 的全局订阅器每进程只能初始化一次, 涉及 init()
//! 的测试标记为 #[ignore], 需要单独运行:
//! cargo test --test logging_system -- --ignored

use shang::logging::{LoggingConfig, init};
use std::fs;
use std::path::PathBuf;

fn test_log_dir(test_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("shang_test_logs_{}", test_name))
}

fn today_log_path(dir: &PathBuf, prefix: &str) -> PathBuf {
    let today = chrono::Local::now().date_naive();
    dir.join(format!("{}.{}.log", prefix, today.format("%Y-%m-%d")))
}

#[test]
#[ignore]
fn test_logging_init_creates_daily_file() {
    let dir = test_log_dir("init_basic");
    let _ = fs::remove_dir_all(&dir);

    let config = LoggingConfig {
        level: "info".to_string(),
        directory: dir.to_string_lossy().to_string(),
        file_prefix: "decoder".to_string(),
    };
    init(config).unwrap();

    tracing::info!("日志系统集成测试消息");
    tracing::debug!("该消息不应写入文件");

    // 非阻塞写入方需要时间落盘
    std::thread::sleep(std::time::Duration::from_millis(300));

    let log_path = today_log_path(&dir, "decoder");
    assert!(log_path.exists(), "当日日志文件应已创建");
    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("日志系统集成测试消息"));
    assert!(!content.contains("该消息不应写入文件"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_logging_config_roundtrip() {
    let config = LoggingConfig {
        level: "shang_hevc=debug,info".to_string(),
        directory: "logs".to_string(),
        file_prefix: "decoder".to_string(),
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: LoggingConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.level, config.level);
    assert_eq!(back.directory, config.directory);
    assert_eq!(back.file_prefix, config.file_prefix);
}
