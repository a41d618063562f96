//! Forum commands.

use petverse_client::AppState;
use petverse_client::forum::{NewThread, Thread};
use petverse_core::ThreadId;

use super::load_profile;
use crate::ForumAction;

pub async fn run(state: &AppState, action: ForumAction) -> Result<(), Box<dyn std::error::Error>> {
    let forum = state.forum();
    match action {
        ForumAction::List => {
            let threads = forum.list_threads().await?;
            for thread in &threads {
                log_thread(thread);
            }
            tracing::info!(count = threads.len(), "Threads");
        }
        ForumAction::Show { id } => {
            let thread = forum.get_thread(&ThreadId::new(id)).await?;
            log_thread(&thread);
            log_comments(&thread);
        }
        ForumAction::Post {
            title,
            content,
            category,
        } => {
            load_profile(state).await;
            let result = forum
                .create_thread(&NewThread {
                    title,
                    content,
                    category,
                })
                .await?;
            tracing::info!(id = result.inserted_id.as_deref().unwrap_or("-"), "Thread posted");
        }
        ForumAction::Comment { id, text } => {
            load_profile(state).await;
            let thread = forum.add_comment(&ThreadId::new(id), &text).await?;
            log_comments(&thread);
        }
        ForumAction::Like { id } => {
            let mut thread = forum.get_thread(&ThreadId::new(id)).await?;
            let liked = forum.toggle_like(&mut thread).await?;
            tracing::info!(liked, likes = thread.like_count(), "{}", thread.title);
        }
    }
    Ok(())
}

fn log_thread(thread: &Thread) {
    tracing::info!(
        id = %thread.id,
        category = %thread.category,
        author = %thread.author_name,
        likes = thread.like_count(),
        comments = thread.comments.len(),
        "{}",
        thread.title
    );
}

fn log_comments(thread: &Thread) {
    if !thread.content.is_empty() {
        tracing::info!("{}", thread.content);
    }
    for comment in &thread.comments {
        tracing::info!(author = %comment.author_name, "{}", comment.text);
    }
}
