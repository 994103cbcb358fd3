// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runs a three-peer cluster in one process, backed by a slow in-memory "database".
//!
//! Every peer can answer for every key. Each key is loaded from the database once,
//! by the peer that owns it, no matter which peer is asked or how many callers ask
//! at the same time.
//!
//! Set `RUST_LOG=peercache=debug` to watch requests hop between peers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use peercache::{GetterFn, Group, Registry};
use peercache_http::HttpPool;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const PEERS: usize = 3;

#[tokio::main]
async fn main() -> Result<(), peercache_http::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db: Arc<HashMap<&str, &str>> = Arc::new([("Tom", "630"), ("Jack", "589"), ("Sam", "567")].into());
    let db_queries = Arc::new(AtomicUsize::new(0));

    // Bind first so the peer list can use the real ports.
    let mut listeners = Vec::new();
    for _ in 0..PEERS {
        listeners.push(TcpListener::bind("127.0.0.1:0").await?);
    }
    let urls = listeners
        .iter()
        .map(|listener| Ok(format!("http://{}", listener.local_addr()?)))
        .collect::<Result<Vec<_>, std::io::Error>>()?;

    let mut groups: Vec<Arc<Group>> = Vec::new();
    for (listener, url) in listeners.into_iter().zip(&urls) {
        let db = Arc::clone(&db);
        let db_queries = Arc::clone(&db_queries);
        let registry = Arc::new(Registry::new());
        let scores = registry.new_group(
            "scores",
            2 << 10,
            GetterFn::new(move |key: String| {
                let db = Arc::clone(&db);
                let db_queries = Arc::clone(&db_queries);
                async move {
                    db_queries.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    db.get(key.as_str())
                        .map(|score| score.as_bytes().to_vec())
                        .ok_or_else(|| format!("{key} not exist"))
                }
            }),
        );

        let pool = Arc::new(HttpPool::new(url.clone(), registry));
        pool.set(urls.iter().cloned())?;
        scores.register_peers(Arc::<HttpPool>::clone(&pool));
        tokio::spawn(pool.serve(listener));
        groups.push(scores);
    }

    // Ask every peer for every name, all at once.
    let mut requests = Vec::new();
    for (peer, group) in groups.iter().enumerate() {
        for name in ["Tom", "Jack", "Sam", "Kate"] {
            let group = Arc::clone(group);
            requests.push(tokio::spawn(async move { (peer, name, group.get(name).await) }));
        }
    }

    for request in requests {
        let Ok((peer, name, result)) = request.await else {
            continue;
        };
        match result {
            Ok(score) => println!("peer {peer}: {name} = {score}"),
            Err(error) => println!("peer {peer}: {name} failed: {error}"),
        }
    }

    println!(
        "\n{} lookups, {} database queries",
        PEERS * 4,
        db_queries.load(Ordering::SeqCst)
    );
    Ok(())
}
