use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Utc;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, IntoActiveModel};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use tar::Archive;
use tokio::task;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db::migrator::Migrator;
use crate::db::Store;
use crate::entities::prelude::{
    Activities, Agents, Media, MediaContributors, MediaTags, SavedViews, Tags, Users,
};
use crate::entities::{
    activities, agents, media, media_contributors, media_tags, saved_views, tags, users,
};

const ARCHIVE_PREFIX: &str = "datakult_backup_";
const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Rows per INSERT, kept well under the SQLite bind-parameter ceiling.
const INSERT_CHUNK: usize = 500;

#[derive(Debug, Serialize, Deserialize)]
struct BackupMetadata {
    created_at: String,
    app: String,
    version: String,
    schema_version: usize,
    database: String,
}

impl BackupMetadata {
    fn current() -> Self {
        Self {
            created_at: Utc::now().to_rfc3339(),
            app: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: Migrator::migrations().len(),
            database: "sqlite".to_string(),
        }
    }
}

/// Full table dump carried as `database.json`. Session state is in-memory
/// only and never part of a backup.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseDump {
    users: Vec<users::Model>,
    agents: Vec<agents::Model>,
    tags: Vec<tags::Model>,
    media: Vec<media::Model>,
    media_contributors: Vec<media_contributors::Model>,
    media_tags: Vec<media_tags::Model>,
    saved_views: Vec<saved_views::Model>,
    activities: Vec<activities::Model>,
}

impl DatabaseDump {
    fn row_count(&self) -> u64 {
        (self.users.len()
            + self.agents.len()
            + self.tags.len()
            + self.media.len()
            + self.media_contributors.len()
            + self.media_tags.len()
            + self.saved_views.len()
            + self.activities.len()) as u64
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExportOptions {
    /// Overrides the configured backup directory.
    pub directory: Option<PathBuf>,
    pub filename: Option<String>,
    /// When set, delete all but the N newest archives after the export.
    pub keep: Option<usize>,
}

#[derive(Debug)]
pub struct BackupReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub deleted: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportOptions {
    /// Empty the dumped tables before loading rows.
    pub flush: bool,
    pub skip_media: bool,
}

#[derive(Debug)]
pub struct ImportReport {
    pub created_at: Option<String>,
    pub restored_rows: u64,
    pub media_files: u64,
}

#[derive(Debug, Serialize)]
pub struct BackupFile {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: String,
}

/// Exports and restores tar.gz archives holding the database dump plus the
/// media files.
pub struct BackupService {
    store: Store,
    backup_dir: PathBuf,
    media_dir: PathBuf,
}

impl BackupService {
    pub fn new(store: Store, backup_dir: impl Into<PathBuf>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
            media_dir: media_dir.into(),
        }
    }

    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub async fn export(&self, options: &ExportOptions) -> Result<BackupReport> {
        let dump = self.dump_database().await?;
        let database_json =
            serde_json::to_string_pretty(&dump).context("Failed to serialize database dump")?;
        let metadata_json = serde_json::to_string_pretty(&BackupMetadata::current())
            .context("Failed to serialize backup metadata")?;

        let target_dir = options
            .directory
            .clone()
            .unwrap_or_else(|| self.backup_dir.clone());
        let filename = options.filename.clone().unwrap_or_else(default_filename);
        let media_dir = self.media_dir.clone();

        let (path, size_bytes) = task::spawn_blocking(move || {
            fs::create_dir_all(&target_dir)
                .with_context(|| format!("Failed to create {}", target_dir.display()))?;
            let archive_path = target_dir.join(&filename);
            let size = write_archive(&archive_path, &metadata_json, &database_json, &media_dir)?;
            Ok::<_, anyhow::Error>((archive_path, size))
        })
        .await
        .context("Backup task failed")??;

        info!(path = %path.display(), size_bytes, "Backup created");

        let deleted = match options.keep {
            Some(keep) => {
                let dir = options
                    .directory
                    .clone()
                    .unwrap_or_else(|| self.backup_dir.clone());
                self.rotate(&dir, keep).await?
            }
            None => 0,
        };

        Ok(BackupReport {
            path,
            size_bytes,
            deleted,
        })
    }

    /// Deletes every `datakult_backup_*.tar.gz` in `dir` except the `keep`
    /// newest by modification time.
    pub async fn rotate(&self, dir: &Path, keep: usize) -> Result<usize> {
        let dir = dir.to_path_buf();
        task::spawn_blocking(move || rotate_blocking(&dir, keep))
            .await
            .context("Backup rotation task failed")?
    }

    pub async fn list(&self, dir: Option<&Path>) -> Result<Vec<BackupFile>> {
        let dir = dir.unwrap_or(&self.backup_dir).to_path_buf();
        task::spawn_blocking(move || list_blocking(&dir))
            .await
            .context("Backup listing task failed")?
    }

    pub async fn import(&self, archive_path: &Path, options: ImportOptions) -> Result<ImportReport> {
        if !archive_path.exists() {
            anyhow::bail!("Backup file not found: {}", archive_path.display());
        }

        let name = archive_path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        if !name.ends_with(ARCHIVE_SUFFIX) {
            anyhow::bail!("Invalid backup file format. Expected .tar.gz, got: {name}");
        }

        let archive = archive_path.to_path_buf();
        let temp = task::spawn_blocking(move || extract_archive(&archive))
            .await
            .context("Backup extraction task failed")??;

        let metadata = read_metadata(temp.path()).await;
        if let Some(metadata) = &metadata {
            info!(created_at = %metadata.created_at, "Importing backup");
        } else {
            warn!("Backup archive carries no readable metadata.json");
        }

        let dump_bytes = tokio::fs::read(temp.path().join("database.json"))
            .await
            .context("Backup archive has no database.json")?;
        let dump: DatabaseDump =
            serde_json::from_slice(&dump_bytes).context("Failed to parse database.json")?;

        if options.flush {
            self.flush_tables().await?;
        }

        let restored_rows = self.restore_dump(dump).await?;

        let media_files = if options.skip_media {
            0
        } else {
            let source = temp.path().join("media");
            let target = self.media_dir.clone();
            task::spawn_blocking(move || copy_media_tree(&source, &target))
                .await
                .context("Media restore task failed")??
        };

        info!(restored_rows, media_files, "Backup imported");

        Ok(ImportReport {
            created_at: metadata.map(|metadata| metadata.created_at),
            restored_rows,
            media_files,
        })
    }

    async fn dump_database(&self) -> Result<DatabaseDump> {
        let conn = &self.store.conn;
        Ok(DatabaseDump {
            users: Users::find().all(conn).await?,
            agents: Agents::find().all(conn).await?,
            tags: Tags::find().all(conn).await?,
            media: Media::find().all(conn).await?,
            media_contributors: MediaContributors::find().all(conn).await?,
            media_tags: MediaTags::find().all(conn).await?,
            saved_views: SavedViews::find().all(conn).await?,
            activities: Activities::find().all(conn).await?,
        })
    }

    /// Children before parents, so foreign keys never dangle mid-flush.
    async fn flush_tables(&self) -> Result<()> {
        let conn = &self.store.conn;
        Activities::delete_many().exec(conn).await?;
        MediaContributors::delete_many().exec(conn).await?;
        MediaTags::delete_many().exec(conn).await?;
        SavedViews::delete_many().exec(conn).await?;
        Media::delete_many().exec(conn).await?;
        Agents::delete_many().exec(conn).await?;
        Tags::delete_many().exec(conn).await?;
        Users::delete_many().exec(conn).await?;
        info!("Flushed existing rows before restore");
        Ok(())
    }

    /// Upserts dump rows by primary key; parents before children. Rows not
    /// present in the dump are left alone, which gives merge semantics when
    /// the tables were not flushed first.
    async fn restore_dump(&self, dump: DatabaseDump) -> Result<u64> {
        let conn = &self.store.conn;
        let total = dump.row_count();

        upsert_rows::<Users>(
            conn,
            dump.users,
            OnConflict::column(users::Column::Id)
                .update_columns([
                    users::Column::Username,
                    users::Column::PasswordHash,
                    users::Column::ApiKey,
                    users::Column::DisplayName,
                    users::Column::Email,
                    users::Column::MustChangePassword,
                    users::Column::CreatedAt,
                    users::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .await?;

        upsert_rows::<Agents>(
            conn,
            dump.agents,
            OnConflict::column(agents::Column::Id)
                .update_columns([agents::Column::Name, agents::Column::CreatedAt])
                .to_owned(),
        )
        .await?;

        upsert_rows::<Tags>(
            conn,
            dump.tags,
            OnConflict::column(tags::Column::Id)
                .update_columns([tags::Column::Name, tags::Column::CreatedAt])
                .to_owned(),
        )
        .await?;

        upsert_rows::<Media>(
            conn,
            dump.media,
            OnConflict::column(media::Column::Id)
                .update_columns([
                    media::Column::Title,
                    media::Column::MediaType,
                    media::Column::Status,
                    media::Column::PubYear,
                    media::Column::Score,
                    media::Column::Review,
                    media::Column::ReviewHtml,
                    media::Column::ReviewDate,
                    media::Column::Cover,
                    media::Column::CreatedAt,
                    media::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .await?;

        upsert_rows::<MediaContributors>(
            conn,
            dump.media_contributors,
            OnConflict::columns([
                media_contributors::Column::MediaId,
                media_contributors::Column::AgentId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .await?;

        upsert_rows::<MediaTags>(
            conn,
            dump.media_tags,
            OnConflict::columns([media_tags::Column::MediaId, media_tags::Column::TagId])
                .do_nothing()
                .to_owned(),
        )
        .await?;

        upsert_rows::<SavedViews>(
            conn,
            dump.saved_views,
            OnConflict::column(saved_views::Column::Id)
                .update_columns([
                    saved_views::Column::UserId,
                    saved_views::Column::Name,
                    saved_views::Column::QueryString,
                    saved_views::Column::ViewMode,
                    saved_views::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .await?;

        upsert_rows::<Activities>(
            conn,
            dump.activities,
            OnConflict::column(activities::Column::Id)
                .update_columns([
                    activities::Column::MediaId,
                    activities::Column::MediaKind,
                    activities::Column::Status,
                    activities::Column::Score,
                    activities::Column::RecordedAt,
                ])
                .to_owned(),
        )
        .await?;

        Ok(total)
    }
}

async fn upsert_rows<E>(
    conn: &DatabaseConnection,
    rows: Vec<E::Model>,
    on_conflict: OnConflict,
) -> Result<()>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: Send + Clone,
{
    for chunk in rows
        .into_iter()
        .map(IntoActiveModel::into_active_model)
        .collect::<Vec<_>>()
        .chunks(INSERT_CHUNK)
    {
        // exec_without_returning tolerates chunks where every row conflicts.
        E::insert_many(chunk.to_vec())
            .on_conflict(on_conflict.clone())
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

fn default_filename() -> String {
    format!(
        "{ARCHIVE_PREFIX}{}{ARCHIVE_SUFFIX}",
        Utc::now().format("%Y%m%d_%H%M%S")
    )
}

fn is_backup_archive(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_SUFFIX))
}

fn write_archive(
    archive_path: &Path,
    metadata_json: &str,
    database_json: &str,
    media_dir: &Path,
) -> Result<u64> {
    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create {}", archive_path.display()))?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    append_bytes(&mut tar, "metadata.json", metadata_json.as_bytes())?;
    append_bytes(&mut tar, "database.json", database_json.as_bytes())?;

    if media_dir.exists() {
        tar.append_dir_all("media", media_dir)
            .context("Failed to add media files to archive")?;
    }

    let encoder = tar.into_inner().context("Failed to finish archive")?;
    encoder.finish().context("Failed to finish compression")?;

    Ok(fs::metadata(archive_path)?.len())
}

fn append_bytes<W: std::io::Write>(
    tar: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs()),
    );
    header.set_cksum();
    tar.append_data(&mut header, name, bytes)
        .with_context(|| format!("Failed to append {name} to archive"))?;
    Ok(())
}

/// Scans every member name before unpacking; absolute paths and `..`
/// components never reach the filesystem.
fn extract_archive(archive_path: &Path) -> Result<tempfile::TempDir> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    for entry in archive.entries().context("Failed to read archive")? {
        let entry = entry.context("Failed to read archive entry")?;
        let path = entry.path().context("Archive entry has an unreadable path")?;
        ensure_safe_member(&path)?;
    }

    let file = File::open(archive_path)?;
    let temp = tempfile::tempdir().context("Failed to create extraction directory")?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive
        .unpack(temp.path())
        .context("Failed to extract archive")?;

    Ok(temp)
}

fn ensure_safe_member(path: &Path) -> Result<()> {
    if path.is_absolute()
        || path
            .components()
            .any(|part| matches!(part, Component::ParentDir))
    {
        anyhow::bail!("Unsafe path in archive: {}", path.display());
    }
    Ok(())
}

async fn read_metadata(extracted: &Path) -> Option<BackupMetadata> {
    let bytes = tokio::fs::read(extracted.join("metadata.json")).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn rotate_blocking(dir: &Path, keep: usize) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut backups: Vec<(PathBuf, SystemTime)> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| is_backup_archive(&entry.file_name()))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.path(), modified))
        })
        .collect();

    backups.sort_by(|a, b| b.1.cmp(&a.1));

    let mut deleted = 0;
    for (path, _) in backups.into_iter().skip(keep) {
        info!(path = %path.display(), "Deleting old backup");
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        deleted += 1;
    }

    if deleted > 0 {
        info!("Deleted {} old backup(s)", deleted);
    }

    Ok(deleted)
}

fn list_blocking(dir: &Path) -> Result<Vec<BackupFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups: Vec<(BackupFile, SystemTime)> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| is_backup_archive(&entry.file_name()))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            let modified = metadata.modified().ok()?;
            let file = BackupFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: metadata.len(),
                modified_at: chrono::DateTime::<Utc>::from(modified).to_rfc3339(),
            };
            Some((file, modified))
        })
        .collect();

    backups.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(backups.into_iter().map(|(file, _)| file).collect())
}

fn copy_media_tree(source: &Path, target: &Path) -> Result<u64> {
    if !source.exists() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(source)?;
        let destination = target.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &destination)
            .with_context(|| format!("Failed to restore {}", destination.display()))?;
        copied += 1;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filename_shape() {
        let name = default_filename();
        assert!(name.starts_with(ARCHIVE_PREFIX));
        assert!(name.ends_with(ARCHIVE_SUFFIX));
        assert!(is_backup_archive(OsStr::new(&name)));
    }

    #[test]
    fn test_is_backup_archive() {
        assert!(is_backup_archive(OsStr::new(
            "datakult_backup_20260101_120000.tar.gz"
        )));
        assert!(!is_backup_archive(OsStr::new("datakult_backup_notes.txt")));
        assert!(!is_backup_archive(OsStr::new("other_20260101.tar.gz")));
    }

    #[test]
    fn test_ensure_safe_member() {
        assert!(ensure_safe_member(Path::new("media/covers/1.jpg")).is_ok());
        assert!(ensure_safe_member(Path::new("metadata.json")).is_ok());
        assert!(ensure_safe_member(Path::new("/etc/passwd")).is_err());
        assert!(ensure_safe_member(Path::new("media/../../escape.txt")).is_err());
    }

    #[test]
    fn test_rotation_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();

        for (name, age_secs) in [
            ("datakult_backup_20260101_000000.tar.gz", 300),
            ("datakult_backup_20260102_000000.tar.gz", 200),
            ("datakult_backup_20260103_000000.tar.gz", 100),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, b"archive").unwrap();
            let mtime = SystemTime::now() - std::time::Duration::from_secs(age_secs);
            let file = File::options().write(true).open(&path).unwrap();
            file.set_modified(mtime).unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), b"keep me").unwrap();

        let deleted = rotate_blocking(dir.path(), 2).unwrap();
        assert_eq!(deleted, 1);
        assert!(!dir
            .path()
            .join("datakult_backup_20260101_000000.tar.gz")
            .exists());
        assert!(dir
            .path()
            .join("datakult_backup_20260103_000000.tar.gz")
            .exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_archive_roundtrip_on_disk() {
        let workspace = tempfile::tempdir().unwrap();
        let media_dir = workspace.path().join("media");
        fs::create_dir_all(media_dir.join("covers")).unwrap();
        fs::write(media_dir.join("covers/1.jpg"), b"not a real jpeg").unwrap();

        let archive_path = workspace.path().join("datakult_backup_test.tar.gz");
        let size = write_archive(&archive_path, "{\"created_at\":\"now\"}", "{}", &media_dir).unwrap();
        assert!(size > 0);

        let extracted = extract_archive(&archive_path).unwrap();
        assert!(extracted.path().join("metadata.json").exists());
        assert!(extracted.path().join("database.json").exists());
        assert!(extracted.path().join("media/covers/1.jpg").exists());
    }

    #[test]
    fn test_copy_media_tree_preserves_structure() {
        let workspace = tempfile::tempdir().unwrap();
        let source = workspace.path().join("source");
        let target = workspace.path().join("target");
        fs::create_dir_all(source.join("covers/sub")).unwrap();
        fs::write(source.join("covers/1.jpg"), b"a").unwrap();
        fs::write(source.join("covers/sub/2.jpg"), b"b").unwrap();

        let copied = copy_media_tree(&source, &target).unwrap();
        assert_eq!(copied, 2);
        assert!(target.join("covers/1.jpg").exists());
        assert!(target.join("covers/sub/2.jpg").exists());
    }
}
