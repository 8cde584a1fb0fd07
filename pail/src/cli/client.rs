use client::upload::{self, Observer, UploadStatus};
use client::{table, StoreClient};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub async fn upload_files(uri: &str, files: &[String]) {
    let Some(store) = connect(uri) else { return };
    let paths: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();

    // Print each file's progress in decile steps to keep output readable.
    let printed: Arc<Mutex<HashMap<String, u8>>> = Arc::default();
    let observer: Observer = Arc::new(move |tasks| {
        let mut printed = printed.lock().unwrap();
        for (name, task) in tasks {
            if task.status != UploadStatus::Uploading {
                continue;
            }
            let last = printed.get(name).copied().unwrap_or_default();
            if task.progress >= last.saturating_add(10) {
                println!("{name}: {}%", task.progress);
                printed.insert(name.clone(), task.progress);
            }
        }
    });

    let results = upload::upload_files(&store, &paths, observer).await;

    for path in &paths {
        let name = upload::task_name(path);
        if let Some(task) = results.get(&name) {
            match task.status {
                UploadStatus::Complete => println!("{name}: uploaded"),
                UploadStatus::Error => println!(
                    "{name}: failed: {}",
                    task.error.as_deref().unwrap_or("unknown error")
                ),
                UploadStatus::Uploading => {}
            }
        }
    }
}

pub async fn list_files(uri: &str, limit: Option<usize>) {
    let Some(store) = connect(uri) else { return };
    match store.list_files(limit).await {
        Ok(listing) => {
            println!("{}", table::render(&listing.files));
            println!("{} file(s)", listing.count);
            if listing.is_truncated {
                println!("more files exist beyond this page");
            }
        }
        Err(e) => eprintln!("list error: {e}"),
    }
}

pub async fn delete_file(uri: &str, key: &str) {
    let Some(store) = connect(uri) else { return };
    match store.delete_file(key).await {
        Ok(deleted) => println!("{} ({})", deleted.message, deleted.key),
        Err(e) => eprintln!("delete error: {e}"),
    }
}

pub async fn download_url(uri: &str, key: &str) {
    let Some(store) = connect(uri) else { return };
    match store.fetch_download_url(key).await {
        Ok(fresh) => println!("{}", fresh.download_url),
        Err(e) => eprintln!("download url error: {e}"),
    }
}

fn connect(uri: &str) -> Option<StoreClient> {
    match StoreClient::new(uri) {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("error: {e}");
            None
        }
    }
}
