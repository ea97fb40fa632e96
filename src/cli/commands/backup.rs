use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::Store;
use crate::services::{BackupService, ExportOptions, ImportOptions};

fn backup_service(config: &Config, store: Store) -> BackupService {
    BackupService::new(store, &config.backup.directory, &config.general.media_path)
}

pub async fn cmd_backup_export(
    config: &Config,
    output: Option<PathBuf>,
    filename: Option<String>,
    keep: Option<usize>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let service = backup_service(config, store);

    println!("Exporting backup...");

    let options = ExportOptions {
        directory: output,
        filename,
        keep,
    };
    let report = service.export(&options).await?;

    println!("✓ Backup written: {}", report.path.display());
    println!("  Size: {}", format_size(report.size_bytes));
    if report.deleted > 0 {
        println!("  Rotated out {} old archive(s)", report.deleted);
    }

    Ok(())
}

pub async fn cmd_backup_import(
    config: &Config,
    file: &Path,
    flush: bool,
    no_media: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        println!("Backup file not found: {}", file.display());
        return Ok(());
    }

    if flush {
        println!("This will DELETE all existing catalog data before restoring.");
        println!("Enter 'y' to confirm, anything else to cancel:");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let store = Store::new(&config.general.database_path).await?;
    let service = backup_service(config, store);

    println!("Importing from {}...", file.display());

    let options = ImportOptions {
        flush,
        skip_media: no_media,
    };
    let report = service.import(file, options).await?;

    println!("✓ Restore complete");
    if let Some(created_at) = &report.created_at {
        println!("  Archive created: {created_at}");
    }
    println!("  Rows restored:   {}", report.restored_rows);
    if no_media {
        println!("  Media files:     skipped");
    } else {
        println!("  Media files:     {}", report.media_files);
    }

    Ok(())
}

pub async fn cmd_backup_list(config: &Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let service = backup_service(config, store);

    let files = service.list(output.as_deref()).await?;

    if files.is_empty() {
        println!("No backup archives found.");
        println!();
        println!("Create one with: datakult backup export");
        return Ok(());
    }

    println!("Backup Archives ({} total)", files.len());
    println!("{:-<70}", "");

    for file in &files {
        println!("• {}", file.name);
        println!("  {} | {}", format_size(file.size_bytes), file.modified_at);
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
