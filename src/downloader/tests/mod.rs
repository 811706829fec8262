use super::test_helpers::{
    Script, ScriptedLauncher, create_test_downloader, create_test_downloader_with_config,
    test_config,
};
use super::*;
use crate::error::Error;
use crate::types::{FetchOptions, FetchRequest, JobState, Platform, ProgressEvent};
use futures::StreamExt;
use std::time::Duration;


const TIKTOK_URL: &str = "https://www.tiktok.com/@creator/video/7300000000000000000";
const INSTAGRAM_URL: &str = "https://www.instagram.com/reel/Cabc123_-x/";
const FACEBOOK_URL: &str = "https://www.facebook.com/watch/?v=1234567890";

/// Drain a job's stream with a safety timeout
async fn collect_events(handle: JobHandle) -> Vec<ProgressEvent> {
    tokio::time::timeout(Duration::from_secs(10), handle.events.collect::<Vec<_>>())
        .await
        .expect("job stream did not end")
}

/// Poll the registry until the job reaches a terminal state
async fn wait_terminal(downloader: &SocialDownloader, id: JobId) -> JobRecord {
    for _ in 0..200 {
        if let Some(record) = downloader.job(id).await {
            if record.state.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached a terminal state");
}
