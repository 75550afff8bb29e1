// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use bytes::Bytes;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::path::Path;
use tabled::{Table, Tabled};
use warden_core::{
    operations::{
        CopyOptions, DeleteOptions, InfoOptions, ListOptions, MkdirOptions, MoveOptions,
        ReadOptions, SearchOptions, WriteOptions,
    },
    EngineConfig, EntryKind, FsError, FsResult, OperationReport, Permissions,
};
use warden_engine::FileOperationService;

pub struct Context {
    pub workspace: Option<String>,
    pub config: Option<String>,
    pub json: bool,
}

impl Context {
    fn service(&self) -> FsResult<FileOperationService> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(Path::new(path))?,
            None => EngineConfig::new("."),
        };
        if let Some(workspace) = &self.workspace {
            config.workspace_root = workspace.into();
        }
        FileOperationService::new(config)
    }

    fn emit<T: Serialize>(&self, payload: &T) -> bool {
        if self.json {
            match serde_json::to_string_pretty(&OperationReport::ok(payload)) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("Error: failed to serialize result: {e}"),
            }
        }
        self.json
    }
}

fn format_time(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_kind(kind: EntryKind) -> String {
    match kind {
        EntryKind::Directory => style("d").cyan().to_string(),
        EntryKind::File => "-".to_string(),
        EntryKind::Symlink => style("l").magenta().to_string(),
        EntryKind::Other => "?".to_string(),
    }
}

fn format_permissions(perms: Option<&Permissions>) -> String {
    match perms {
        Some(p) => {
            let r = if p.readable { 'r' } else { '-' };
            let w = if p.writable { 'w' } else { '-' };
            let x = if p.executable { 'x' } else { '-' };
            format!("{r}{w}{x}")
        }
        None => "---".to_string(),
    }
}

#[derive(Tabled)]
struct LsEntry {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Perms")]
    perms: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Name")]
    name: String,
}

/// List directory contents
pub async fn ls(
    ctx: &Context,
    path: &str,
    long: bool,
    all: bool,
    filter: Option<String>,
) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = ListOptions {
        include_hidden: all,
        filter_pattern: filter,
        include_metadata: long,
    };
    let listing = svc.list(path, &options).await?;
    if ctx.emit(&listing) {
        return Ok(());
    }

    if listing.entries.is_empty() {
        println!("(empty directory)");
        return Ok(());
    }

    if long {
        let rows: Vec<LsEntry> = listing
            .entries
            .iter()
            .map(|e| LsEntry {
                kind: format_kind(e.kind),
                perms: format_permissions(e.permissions.as_ref()),
                size: e
                    .size_formatted
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
                modified: format_time(e.modified),
                name: e.name.clone(),
            })
            .collect();
        println!("{}", Table::new(rows));
    } else {
        for entry in &listing.entries {
            println!("{}", entry.name);
        }
    }
    Ok(())
}

/// Display file contents
pub async fn cat(ctx: &Context, path: &str) -> FsResult<()> {
    let svc = ctx.service()?;
    let read = svc.read(path, &ReadOptions::default()).await?;
    if ctx.emit(&read) {
        return Ok(());
    }

    match read.content {
        Some(content) => print!("{content}"),
        None => {
            let detected = read.detected_type.as_deref().unwrap_or("unknown type");
            eprintln!(
                "{}: binary file ({detected}, {})",
                read.path, read.size_formatted
            );
        }
    }
    Ok(())
}

/// Write stdin to a file
pub async fn write(ctx: &Context, path: &str, force: bool) -> FsResult<()> {
    use tokio::io::AsyncReadExt;

    let mut contents = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut contents)
        .await
        .map_err(FsError::Io)?;

    let svc = ctx.service()?;
    let options = WriteOptions {
        overwrite: force,
        create_parents: true,
    };
    let result = svc.write(path, Bytes::from(contents), &options).await?;
    if ctx.emit(&result) {
        return Ok(());
    }

    println!(
        "Wrote {} ({})",
        result.entry.path,
        result.entry.size_formatted.as_deref().unwrap_or("0 B")
    );
    if let Some(backup) = result.backup {
        println!("Previous content backed up as {}", backup.id);
    }
    Ok(())
}

/// Copy files or directories
pub async fn cp(ctx: &Context, source: &str, dest: &str, force: bool) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = CopyOptions {
        overwrite: force,
        preserve_metadata: true,
    };
    let result = svc.copy(source, dest, &options).await?;
    if ctx.emit(&result) {
        return Ok(());
    }

    println!("Copied {} -> {} (verified)", result.source, result.destination);
    if let Some(backup) = result.replaced_backup {
        println!("Replaced file backed up as {}", backup.id);
    }
    Ok(())
}

/// Move or rename files
pub async fn mv(ctx: &Context, source: &str, dest: &str, force: bool) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = MoveOptions { overwrite: force };
    let result = svc.move_entry(source, dest, &options).await?;
    if ctx.emit(&result) {
        return Ok(());
    }

    println!("Moved {} -> {}", result.source, result.destination);
    Ok(())
}

/// Remove files or directories
pub async fn rm(ctx: &Context, paths: &[String], recursive: bool, yes: bool) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = DeleteOptions {
        recursive,
        confirm: yes,
    };
    for path in paths {
        let result = svc.delete(path, &options).await?;
        if ctx.emit(&result) {
            continue;
        }
        match result.backup {
            Some(backup) => println!("Removed {} (backup: {})", result.path, backup.id),
            None => println!("Removed {}", result.path),
        }
    }
    Ok(())
}

/// Create directories
pub async fn mkdir(ctx: &Context, paths: &[String], parents: bool) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = MkdirOptions {
        create_parents: parents,
        mode: None,
    };
    for path in paths {
        let result = svc.create_dir(path, &options).await?;
        if ctx.emit(&result) {
            continue;
        }
        if result.created {
            println!("Created {}", result.entry.path);
        } else {
            println!("{} already exists", result.entry.path);
        }
    }
    Ok(())
}

/// Show file or directory information
pub async fn info(ctx: &Context, path: &str, checksums: bool) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = InfoOptions {
        include_permissions: true,
        include_checksums: checksums,
    };
    let entry = svc.get_info(path, &options).await?;
    if ctx.emit(&entry) {
        return Ok(());
    }

    println!("  Path: {}", entry.path);
    println!("  Type: {:?}", entry.kind);
    if let Some(size) = entry.size {
        println!("  Size: {} ({})", size, bytesize::ByteSize(size));
    }
    if let Some(perms) = &entry.permissions {
        println!("  Mode: {}", format_permissions(Some(perms)));
    }
    if let Some(modified) = entry.modified {
        println!("  Modified: {modified}");
    }
    if let Some(created) = entry.created {
        println!("  Created: {created}");
    }
    if let Some(sums) = &entry.checksums {
        for (algorithm, digest) in sums {
            println!("  {algorithm}: {digest}");
        }
    }
    Ok(())
}

/// Search by name and optionally content
#[allow(clippy::too_many_arguments)]
pub async fn find(
    ctx: &Context,
    pattern: &str,
    path: &str,
    content: bool,
    case_sensitive: bool,
    regex: bool,
    max_results: Option<usize>,
) -> FsResult<()> {
    let svc = ctx.service()?;
    let options = SearchOptions {
        pattern: pattern.to_string(),
        content_search: content,
        case_sensitive,
        regex,
        max_results,
        ..Default::default()
    };
    let outcome = svc.search(path, &options).await?;
    if ctx.emit(&outcome) {
        return Ok(());
    }

    for found in &outcome.matches {
        match (&found.line, found.line_number) {
            (Some(line), Some(number)) => {
                println!("{}:{}: {}", found.path, number, line.trim_end())
            }
            _ => println!("{}", found.path),
        }
    }
    let summary = format!(
        "{} match{} for '{}'",
        outcome.total_matches,
        if outcome.total_matches == 1 { "" } else { "es" },
        outcome.pattern,
    );
    if outcome.truncated {
        eprintln!("{} (truncated)", style(summary).dim());
    } else {
        eprintln!("{}", style(summary).dim());
    }
    Ok(())
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Original")]
    original: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Created")]
    created: String,
}

/// List stored backups
pub async fn backups_list(ctx: &Context) -> FsResult<()> {
    let svc = ctx.service()?;
    let records = svc.backups().list().await?;
    if ctx.emit(&records) {
        return Ok(());
    }

    if records.is_empty() {
        println!("(no backups)");
        return Ok(());
    }
    let rows: Vec<BackupRow> = records
        .iter()
        .map(|r| BackupRow {
            id: r.id.clone(),
            original: r.original_path.clone(),
            size: bytesize::ByteSize(r.size_bytes).to_string(),
            created: format_time(Some(r.created)),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

/// Restore one backup to its original path
pub async fn backups_restore(ctx: &Context, id: &str) -> FsResult<()> {
    let svc = ctx.service()?;
    let manager = svc.backups();
    let record = manager.find(id).await?;
    manager.restore(&record).await?;
    if ctx.emit(&record) {
        return Ok(());
    }
    println!("Restored {} -> {}", record.id, record.original_path);
    Ok(())
}

/// Apply the retention policy to the backup store
pub async fn backups_prune(ctx: &Context) -> FsResult<()> {
    let svc = ctx.service()?;
    let removed = svc.backups().prune().await?;
    if ctx.emit(&removed) {
        return Ok(());
    }
    if removed.is_empty() {
        println!("Nothing to prune");
    } else {
        for record in &removed {
            println!("Pruned {} ({})", record.id, record.original_path);
        }
    }
    Ok(())
}

/// Print the active configuration
pub async fn config_get(ctx: &Context) -> FsResult<()> {
    let svc = ctx.service()?;
    let config = svc.get_config();
    if ctx.emit(&config) {
        return Ok(());
    }
    let text =
        toml::to_string_pretty(&config).map_err(|e| FsError::InvalidConfig(e.to_string()))?;
    print!("{text}");
    Ok(())
}

/// Update one configuration key, persisting when a config file is in use
pub async fn config_set(ctx: &Context, key: &str, value: &str) -> FsResult<()> {
    let svc = ctx.service()?;
    let updated = svc.set_config(key, value)?;
    if let Some(path) = &ctx.config {
        updated.save(Path::new(path))?;
    }
    if ctx.emit(&updated) {
        return Ok(());
    }
    println!("Set {key} = {value}");
    Ok(())
}

/// Print change events until interrupted
pub async fn watch(ctx: &Context, path: &str) -> FsResult<()> {
    let svc = ctx.service()?;
    let mut stream = svc.watch(path)?;
    if !ctx.json {
        eprintln!("Watching {path} (ctrl-c to stop)");
    }
    while let Some(event) = stream.recv().await {
        if ctx.json {
            match serde_json::to_string(&event) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("Error: failed to serialize event: {e}"),
            }
        } else {
            let kind = match event.change_kind {
                warden_core::ChangeKind::Created => style("created ").green(),
                warden_core::ChangeKind::Modified => style("modified").yellow(),
                warden_core::ChangeKind::Deleted => style("deleted ").red(),
            };
            println!("{kind} {}", event.path);
        }
    }
    Ok(())
}
