use alphasync_core::{Config, ContainerNode, ContentTree, Node, ServiceKind};
use alphasync_sync::{CameraSession, SyncCancel, SyncEngine};
use anyhow::{bail, Context, Result};
use std::future::Future;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Run SSDP (unless skipped) and resolve the camera services
async fn connect(config: Config, no_ssdp: bool) -> Result<CameraSession> {
    let wait_for = config.ssdp.wait_for();
    let send_every = config.ssdp.send_every();
    let mut session = CameraSession::new(config)?;

    if no_ssdp {
        info!(
            "Skipping SSDP, using {}",
            session.discovery().service_directory_url()
        );
    } else {
        let address = session
            .ssdp(wait_for, send_every)
            .await
            .context("SSDP search failed")?;
        info!("Camera found at {}", address);
    }

    session
        .discover_available_services()
        .await
        .context("Failed to discover camera services")?;
    Ok(session)
}

async fn connect_with_tree(config: Config, no_ssdp: bool) -> Result<CameraSession> {
    let mut session = connect(config, no_ssdp).await?;
    session
        .generate_tree()
        .await
        .context("Failed to build the Content Directory tree")?;
    Ok(session)
}

pub async fn discover(config: Config, no_ssdp: bool) -> Result<()> {
    let session = connect(config, no_ssdp).await?;
    let discovery = session.discovery();

    if let Some(address) = discovery.address() {
        println!("Address: {}", address);
    }
    let info = discovery.device_info();
    let fields = [
        ("Name", &info.friendly_name),
        ("Manufacturer", &info.manufacturer),
        ("Model", &info.model_name),
        ("UDN", &info.udn),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{}: {}", label, value);
        }
    }

    for kind in ServiceKind::ALL {
        match discovery.services().get(kind) {
            Some(service) => println!(
                "{}: {} (control {}, SCPD {})",
                kind, service.service_type, service.control_path, service.description_path
            ),
            None => println!("{}: not offered", kind),
        }
    }
    Ok(())
}

pub async fn tree(config: Config, no_ssdp: bool, json: bool) -> Result<()> {
    let session = connect_with_tree(config, no_ssdp).await?;
    let Some(tree) = session.tree() else {
        bail!("Content Directory tree was not built");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(tree)?);
    } else {
        print_tree(tree);
    }
    Ok(())
}

fn print_tree(tree: &ContentTree) {
    print_container(&tree.root, 0);
    println!();
    for (date, items) in tree.index.iter() {
        println!("{}: {} item(s)", date, items.len());
    }
}

fn print_container(container: &ContainerNode, depth: usize) {
    println!("{}{}/", "  ".repeat(depth), container.title);
    for child in &container.children {
        match child {
            Node::Container(sub) => print_container(sub, depth + 1),
            Node::Item(item) => println!("{}{}", "  ".repeat(depth + 1), item.title),
        }
    }
}

pub async fn sync(
    config: Config,
    no_ssdp: bool,
    dest: &Path,
    by_tree: bool,
    date: Option<&str>,
) -> Result<()> {
    let session = connect_with_tree(config, no_ssdp).await?;
    info!("Syncing into {}", dest.display());

    if by_tree {
        session.sync_tree(dest).await.context("Tree sync failed")?;
        return Ok(());
    }

    let cancel = SyncCancel::new();
    let handle = cancel.clone();
    let watcher = tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, handle).await {
            std::process::exit(130);
        }
    });

    let result = match date {
        Some(date) => session.sync_date(date, dest, &cancel).await,
        None => session.sync_by_date(dest, &cancel).await,
    };
    watcher.abort();

    if !result.context("Sync failed")? {
        bail!("Sync stopped early, run it again to resume");
    }
    Ok(())
}

/// The first interrupt asks the sync to stop after its current item.
/// Resolves to `true` when a second one arrives and the process should exit.
async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: SyncCancel) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    warn!("Interrupt received, stopping after the current item (press Ctrl-C again to exit)");
    cancel.cancel();

    if next_signal().await.is_err() {
        return false;
    }
    warn!("Second interrupt received, exiting");
    true
}

pub async fn shot(config: Config, no_ssdp: bool, path: &Path) -> Result<()> {
    let session = connect(config, no_ssdp).await?;
    let saved = session
        .get_single_image(path)
        .await
        .context("Failed to fetch the live-view image")?;
    println!("Saved {}", saved.display());
    Ok(())
}

pub async fn fetch(config: Config, url: &str, path: &Path) -> Result<()> {
    let engine = SyncEngine::new(&config)?;
    engine
        .download_single(url, path)
        .await
        .with_context(|| format!("Failed to download {}", url))?;
    println!("Saved {}", path.display());
    Ok(())
}
