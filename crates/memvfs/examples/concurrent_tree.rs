//! Concurrent tree example
//!
//! Fans out writers across sibling directories, then walks the result.
//!
//! Run with: RUST_LOG=memvfs=debug cargo run --example concurrent_tree

use anyhow::Result;
use memvfs::{FileSystem, FsLimits, InMemoryFs, WalkControl};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let fs = Arc::new(InMemoryFs::with_limits(
        FsLimits::new().max_file_count(10_000),
    ));

    let handles: Vec<_> = (0..8)
        .map(|task| {
            let fs = Arc::clone(&fs);
            tokio::spawn(async move {
                let dir = PathBuf::from(format!("/jobs/{task:02}"));
                fs.mkdir_all(&dir, 0o755).await?;
                for i in 0..25 {
                    let mut f = fs.create(&dir.join(format!("{i}.out"))).await?;
                    f.write_all(format!("task {task} item {i}\n").as_bytes())
                        .await?;
                    f.close().await?;
                }
                Ok::<_, memvfs::Error>(())
            })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let mut dirs = 0;
    let mut bytes = 0;
    fs.walk(Path::new("/jobs"), &mut |path, meta| {
        if meta.is_dir() {
            dirs += 1;
            println!("{}", path.display());
        } else {
            bytes += meta.size;
        }
        WalkControl::Continue
    })
    .await?;

    let usage = fs.usage();
    println!(
        "{dirs} directories, {} files, {bytes} bytes (accounted: {})",
        usage.file_count, usage.total_bytes
    );
    Ok(())
}
