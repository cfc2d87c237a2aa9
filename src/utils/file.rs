use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 列出目录下的普通文件（按文件名排序，不递归）
pub fn list_source_files<P: AsRef<Path>>(dir: P) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// 拆分扩展名：在最后一个 `.` 处切开，但开头连续的 `.` 不算扩展名分隔符。
/// `..foo` 与 `...` 没有扩展名，`file.` 的扩展名为 `.`
fn split_extension(name: &str) -> (&str, &str) {
    if let Some(dot) = name.rfind('.') {
        if name[..dot].chars().any(|c| c != '.') {
            return (&name[..dot], &name[dot..]);
        }
    }
    (name, "")
}

/// 远程文件名：任务 0 保持原名，其余任务追加 `_taskid_<id>` 避免同目录冲突
pub fn remote_file_name(file_name: &str, task_id: usize) -> String {
    if task_id == 0 {
        return file_name.to_string();
    }

    let (stem, ext) = split_extension(file_name);
    format!("{}_taskid_{}{}", stem, task_id, ext)
}

pub fn remote_path(remote_dir: &str, file_name: &str, task_id: usize) -> String {
    format!("{}/{}", remote_dir, remote_file_name(file_name, task_id))
}

pub fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

// 格式化速度显示
pub fn format_speed(bytes_per_sec: u64) -> String {
    if bytes_per_sec < 1024 {
        format!("{} B/s", bytes_per_sec)
    } else if bytes_per_sec < 1024 * 1024 {
        format!("{:.2} KB/s", bytes_per_sec as f64 / 1024.0)
    } else if bytes_per_sec < 1024 * 1024 * 1024 {
        format!("{:.2} MB/s", bytes_per_sec as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB/s", bytes_per_sec as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
