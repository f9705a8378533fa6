use app::batch::{join_task, select_by_names, spawn_generate, spawn_listing, BatchGenerator, CancelFlag, ListingJob};
use app::qr::{ContentBuilder, QrMode, QrWriter};
use app::settings::Settings;
use std::path::{Path, PathBuf};
use storage::{BucketTarget, FileDescriptor, ListingReport};
use utils::app_config::AppConfig;
use utils::error::{Error, Result};

use crate::SettingsArgs;

/// 从设置和应用配置组装一次后台列举
fn listing_job(settings: &Settings, check_connection: bool) -> Result<ListingJob> {
    let config = AppConfig::fetch()?;
    let credentials = settings.credentials();
    credentials.validate()?;

    let target = BucketTarget::from_credentials(&credentials)
        .with_host(&config.storage.host, &config.storage.domain);

    Ok(ListingJob {
        credentials,
        target,
        page_size: config.storage.page_size,
        check_connection,
    })
}

async fn fetch_listing(settings: &Settings, check_connection: bool) -> Result<ListingReport> {
    let job = listing_job(settings, check_connection)?;
    println!("Fetching file list from {}...", job.target.bucket);
    join_task(spawn_listing(job)).await
}

fn print_table(files: &[FileDescriptor]) {
    let width = files
        .iter()
        .map(|f| f.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    println!("{:<width$}  {:>12}  {:<19}", "Name", "Size", "Modified", width = width);
    for file in files {
        println!(
            "{:<width$}  {:>12}  {:<19}",
            file.name,
            file.size_mb(),
            file.modified_short(),
            width = width
        );
    }
}

pub async fn connect_cmd(settings_path: &Path) -> Result<()> {
    let settings = Settings::load_or_default(settings_path);
    let report = fetch_listing(&settings, true).await?;

    println!("Connected to {} ({})", settings.bucket_name, settings.region);
    print_table(&report.descriptors);
    println!("Found {} audio files", report.descriptors.len());
    Ok(())
}

pub async fn list_cmd(settings_path: &Path, json: bool) -> Result<()> {
    let settings = Settings::load_or_default(settings_path);
    let report = fetch_listing(&settings, false).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.descriptors)?);
    } else {
        print_table(&report.descriptors);
        println!(
            "Found {} audio files ({} objects scanned)",
            report.descriptors.len(),
            report.scanned
        );
    }
    Ok(())
}

pub async fn generate_cmd(
    settings_path: &Path, names: Vec<String>, all: bool, mode: QrMode, output_dir: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let settings = Settings::load_or_default(settings_path);
    let config = AppConfig::fetch()?;
    let report = fetch_listing(&settings, false).await?;

    let selected = if all {
        if report.descriptors.is_empty() {
            return Err(Error::validation("no audio files found, nothing to generate"));
        }
        if report.descriptors.len() > 1 && !yes {
            return Err(Error::validation(format!(
                "about to generate {} QR codes, pass --yes to confirm",
                report.descriptors.len()
            )));
        }
        report.descriptors
    } else {
        let (selected, missing) = select_by_names(&report.descriptors, &names);
        for name in &missing {
            println!("Skipped: {} not found in bucket", name);
        }
        if selected.is_empty() {
            return Err(Error::validation("none of the requested files were found"));
        }
        selected
    };

    let output_dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
    let cancel = CancelFlag::new();
    let generator = BatchGenerator::new(
        ContentBuilder::from(&config.player),
        QrWriter::from_config(&config.qr)?,
    )
    .with_cancel(cancel.clone());

    // Ctrl-C 在当前条目完成后停止
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current item");
            cancel.cancel();
        }
    });

    let (handle, mut progress) = spawn_generate(generator, selected, mode, output_dir.clone());
    while let Some(p) = progress.recv().await {
        let status = if p.succeeded { "ok" } else { "failed" };
        println!("[{}/{}] {} {}", p.index, p.total, p.name, status);
    }
    let result = join_task(handle).await;
    signal.abort();
    let result = result?;

    for failure in &result.failed {
        println!("Failed: {}: {}", failure.descriptor.name, failure.error);
    }
    for item in &result.overwritten {
        println!("Overwritten: {} shares its file name with an earlier item", item.key);
    }
    println!(
        "Generated {} of {} QR codes in {}",
        result.succeeded,
        result.total,
        output_dir.display()
    );

    if result.cancelled {
        return Err(Error::new("generation cancelled"));
    }
    if !result.failed.is_empty() {
        return Err(Error::new(&format!(
            "{} QR code(s) could not be generated",
            result.failed.len()
        )));
    }
    Ok(())
}

pub async fn url_cmd(settings_path: &Path, name: String, mode: QrMode) -> Result<()> {
    let settings = Settings::load_or_default(settings_path);
    let config = AppConfig::fetch()?;
    let report = fetch_listing(&settings, false).await?;

    let (selected, _) = select_by_names(&report.descriptors, std::slice::from_ref(&name));
    let descriptor = selected
        .first()
        .ok_or_else(|| Error::validation(format!("{} not found in bucket", name)))?;

    println!("{}", ContentBuilder::from(&config.player).build(descriptor, mode));
    Ok(())
}

pub fn config_show_cmd(settings_path: &Path) -> Result<()> {
    let settings = Settings::load_or_default(settings_path);
    println!("{}", serde_json::to_string_pretty(&settings.masked())?);
    Ok(())
}

pub fn config_save_cmd(settings_path: &Path, args: SettingsArgs) -> Result<()> {
    let mut settings = Settings::load_or_default(settings_path);
    apply_settings_args(&mut settings, args);
    settings.save(settings_path)?;
    println!("Settings saved to {}", settings_path.display());
    Ok(())
}

fn apply_settings_args(settings: &mut Settings, args: SettingsArgs) {
    if let Some(v) = args.secret_id {
        settings.secret_id = v;
    }
    if let Some(v) = args.secret_key {
        settings.secret_key = v;
    }
    if let Some(v) = args.bucket_name {
        settings.bucket_name = v;
    }
    if let Some(v) = args.region {
        settings.region = v;
    }
    if let Some(v) = args.output_dir {
        settings.output_dir = v;
    }
}
