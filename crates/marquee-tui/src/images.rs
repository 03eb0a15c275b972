//! Artwork fetch queue.
//!
//! Every visible card asks for its thumbnail through [`ImageQueue::request`].
//! Fetches run on the tokio runtime but at most [`MAX_CONCURRENT`] at a time;
//! the semaphore is fair, so requests are served in the order they were made.
//! The returned [`ImageTicket`] aborts the task when dropped, which is how a
//! recycled cell cancels the load for the item it no longer shows.

use std::sync::Arc;

use marquee_proto::model::RatingKey;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, trace};

pub const MAX_CONCURRENT: usize = 3;

/// Which cell asked, and for which item.  A result is only applied when the
/// cell at `index` still binds `rating_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub index: usize,
    pub rating_key: RatingKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub bytes: usize,
    pub content_type: String,
}

#[derive(Debug)]
pub struct ImageLoaded {
    pub key: ImageKey,
    pub url: String,
    pub result: Result<Artwork, String>,
}

/// Handle to one queued fetch.
#[derive(Debug)]
pub struct ImageTicket {
    abort: AbortHandle,
}

impl ImageTicket {
    /// Same as dropping the ticket.
    pub fn cancel(self) {}
}

impl Drop for ImageTicket {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

#[derive(Clone)]
pub struct ImageQueue {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    paused: Arc<watch::Sender<bool>>,
    tx: mpsc::Sender<ImageLoaded>,
}

impl ImageQueue {
    pub fn new(client: reqwest::Client, tx: mpsc::Sender<ImageLoaded>) -> Self {
        Self::with_limit(client, tx, MAX_CONCURRENT)
    }

    pub fn with_limit(client: reqwest::Client, tx: mpsc::Sender<ImageLoaded>, limit: usize) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            client,
            permits: Arc::new(Semaphore::new(limit.max(1))),
            paused: Arc::new(paused),
            tx,
        }
    }

    /// Hold back queued fetches (in-flight ones finish).
    pub fn pause(&self) {
        debug!("images: paused");
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        debug!("images: resumed");
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn request(&self, key: ImageKey, url: String) -> ImageTicket {
        let client = self.client.clone();
        let permits = Arc::clone(&self.permits);
        let mut paused = self.paused.subscribe();
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            while *paused.borrow_and_update() {
                if paused.changed().await.is_err() {
                    return;
                }
            }
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            trace!("images: fetching {}", url);
            let result = fetch(&client, &url).await;
            let _ = tx.send(ImageLoaded { key, url, result }).await;
        });
        ImageTicket {
            abort: handle.abort_handle(),
        }
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Artwork, String> {
    let resp = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| e.to_string())?;
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = resp.bytes().await.map_err(|e| e.to_string())?;
    Ok(Artwork {
        bytes: body.len(),
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Gauge {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        served: Arc<AtomicUsize>,
    }

    async fn slow_image(State(g): State<Gauge>) -> ([(&'static str, &'static str); 1], Vec<u8>) {
        let now = g.current.fetch_add(1, Ordering::SeqCst) + 1;
        g.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        g.current.fetch_sub(1, Ordering::SeqCst);
        g.served.fetch_add(1, Ordering::SeqCst);
        ([("content-type", "image/jpeg")], vec![0u8; 128])
    }

    async fn serve(gauge: Gauge) -> String {
        let app = Router::new().route("/img", get(slow_image)).with_state(gauge);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/img", addr)
    }

    fn key(index: usize) -> ImageKey {
        ImageKey {
            index,
            rating_key: RatingKey(index as u64 + 100),
        }
    }

    #[tokio::test]
    async fn test_at_most_three_in_flight() {
        let gauge = Gauge::default();
        let url = serve(gauge.clone()).await;
        let (tx, mut rx) = mpsc::channel(32);
        let queue = ImageQueue::new(reqwest::Client::new(), tx);

        let tickets: Vec<_> = (0..9).map(|i| queue.request(key(i), url.clone())).collect();
        for _ in 0..9 {
            let loaded = rx.recv().await.unwrap();
            let art = loaded.result.unwrap();
            assert_eq!(art.bytes, 128);
            assert_eq!(art.content_type, "image/jpeg");
        }
        drop(tickets);
        assert!(gauge.peak.load(Ordering::SeqCst) <= MAX_CONCURRENT);
        assert_eq!(gauge.served.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_dropped_ticket_never_delivers() {
        let gauge = Gauge::default();
        let url = serve(gauge.clone()).await;
        let (tx, mut rx) = mpsc::channel(32);
        let queue = ImageQueue::with_limit(reqwest::Client::new(), tx, 1);

        let keep = queue.request(key(0), url.clone());
        let evicted = queue.request(key(1), url.clone());
        evicted.cancel();

        let loaded = rx.recv().await.unwrap();
        assert_eq!(loaded.key, key(0));
        drop(keep);
        let late = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(late.is_err(), "cancelled fetch must not post a result");
    }

    #[tokio::test]
    async fn test_paused_queue_holds_requests() {
        let gauge = Gauge::default();
        let url = serve(gauge.clone()).await;
        let (tx, mut rx) = mpsc::channel(32);
        let queue = ImageQueue::new(reqwest::Client::new(), tx);

        queue.pause();
        assert!(queue.is_paused());
        let _ticket = queue.request(key(3), url);
        let held = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(held.is_err());
        assert_eq!(gauge.served.load(Ordering::SeqCst), 0);

        queue.resume();
        let loaded = rx.recv().await.unwrap();
        assert_eq!(loaded.key, key(3));
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let (tx, mut rx) = mpsc::channel(4);
        let queue = ImageQueue::new(reqwest::Client::new(), tx);
        // port 9 is closed on loopback
        let _ticket = queue.request(key(0), "http://127.0.0.1:9/none".to_string());
        let loaded = rx.recv().await.unwrap();
        assert!(loaded.result.is_err());
    }
}
