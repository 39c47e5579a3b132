//! Scripted demo run that prints the rendered thread after each sync stage.

use crate::api::CommentsApi;
use crate::api::memory::ApiOperation;
use crate::domain::Identity;
use crate::fixtures::{self, DEMO_THREAD_ID};
use crate::render::thread::render_thread;
use crate::session::{perform_fetch, perform_mutation};
use crate::sync::{FetchRequest, Mutation, SyncSettings, ThreadSync};
use anyhow::{Context, anyhow};

/// Walks the demo thread through an optimistic post, a reply expansion, and a
/// failed reply, rendering the view after each stage.
pub async fn render_demo_dump() -> anyhow::Result<String> {
    let api = fixtures::demo_api();
    let identity = fixtures::demo_identity();
    let mut sync = ThreadSync::new(DEMO_THREAD_ID, SyncSettings::default());
    let mut out = String::new();

    let request = sync.fetch_page(1);
    fetch(&api, &mut sync, &request).await?;
    push_stage(&mut out, "INITIAL PAGE", &sync, &identity);

    let mutation = sync
        .submit_comment(Some(&identity), "gm")
        .context("demo post rejected")?;
    push_stage(&mut out, "OPTIMISTIC POST", &sync, &identity);

    settle(&api, &mut sync, mutation).await?;
    push_stage(&mut out, "POST CONFIRMED", &sync, &identity);

    let parent = sync
        .store()
        .confirmed()
        .iter()
        .find(|comment| comment.reply_count > 0)
        .map(|comment| comment.id.clone())
        .ok_or_else(|| anyhow!("demo page has no comment with replies"))?;
    if let Some(request) = sync.expand_replies(&parent)? {
        fetch(&api, &mut sync, &request).await?;
    }
    push_stage(&mut out, "REPLIES EXPANDED", &sync, &identity);

    api.fail_next(ApiOperation::ReplyToComment, "service unavailable");
    let mutation = sync
        .reply_to_comment(Some(&identity), &parent, "see you there")
        .context("demo reply rejected")?;
    push_stage(&mut out, "OPTIMISTIC REPLY", &sync, &identity);

    if let Err(err) = settle(&api, &mut sync, mutation).await {
        out.push_str(&format!("error: {err:#}\n\n"));
    }
    push_stage(&mut out, "REPLY ROLLED BACK", &sync, &identity);

    Ok(out)
}

async fn fetch(
    api: &dyn CommentsApi,
    sync: &mut ThreadSync,
    request: &FetchRequest,
) -> anyhow::Result<()> {
    let result = perform_fetch(api, request).await;
    sync.apply_fetch(request, result)
        .with_context(|| format!("failed to load {}", request.scope_label()))?;
    Ok(())
}

async fn settle(api: &dyn CommentsApi, sync: &mut ThreadSync, mutation: Mutation) -> anyhow::Result<()> {
    if let Some(prefetch) = &mutation.prefetch {
        fetch(api, sync, prefetch).await?;
    }
    let result = perform_mutation(api, &mutation.request).await;
    for request in sync.complete_mutation(mutation.id, result)? {
        fetch(api, sync, &request).await?;
    }
    Ok(())
}

fn push_stage(out: &mut String, title: &str, sync: &ThreadSync, identity: &Identity) {
    out.push_str(&format!("=== {title} ===\n"));
    for line in render_thread(&sync.view(), Some(identity)) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
}
